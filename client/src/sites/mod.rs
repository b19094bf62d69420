//! Measurement site directory
//!
//! The directory changes rarely, so lookups are memoized in a cache sized
//! and aged by the cache options.

use crate::config::CacheConfig;
use crate::error::SiteError;
use moka::future::Cache;
use protocol::{SITE_DIRECTORY_URL, Site};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct SiteDirectory {
    client: Client,
    url: String,
    cache: Cache<String, Arc<Vec<Site>>>,
}

impl SiteDirectory {
    pub fn new(cache: &CacheConfig, user_agent: &str) -> Result<Self, SiteError> {
        Self::with_url(SITE_DIRECTORY_URL, cache, user_agent)
    }

    pub fn with_url(url: &str, cache: &CacheConfig, user_agent: &str) -> Result<Self, SiteError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SiteError::HttpClient)?;

        let cache = Cache::builder()
            .max_capacity(cache.size)
            .time_to_live(cache.eviction)
            .build();

        Ok(Self {
            client,
            url: url.to_string(),
            cache,
        })
    }

    /// All known measurement sites
    pub async fn list(&self) -> Result<Arc<Vec<Site>>, SiteError> {
        self.cache
            .try_get_with(self.url.clone(), self.fetch())
            .await
            .map_err(|source| SiteError::Fetch {
                url: self.url.clone(),
                source,
            })
    }

    async fn fetch(&self) -> Result<Arc<Vec<Site>>, reqwest::Error> {
        debug!("Fetching site directory from {}", self.url);

        let sites: Vec<Site> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Site directory lists {} sites", sites.len());
        Ok(Arc::new(sites))
    }
}

/// Site code embedded in a measurement server name,
/// e.g. "mil04" for "ndt-mlab1-mil04.mlab-oti.measurement-lab.org"
pub fn site_code(fqdn: &str) -> Option<&str> {
    let host = fqdn.split('.').next()?;
    let code = host.rsplit('-').next()?;

    let valid = code.len() == 5
        && code.is_ascii()
        && code[..3].chars().all(|c| c.is_ascii_lowercase())
        && code[3..].chars().all(|c| c.is_ascii_digit());
    valid.then_some(code)
}
