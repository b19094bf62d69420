//! Configuration management
//!
//! Every option can be given as a command line flag or through an
//! environment variable. An explicit flag wins, then a non-empty
//! environment variable, then the built-in default.

use crate::error::ConfigError;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

const BIN_NAME: &str = "speedtest-influxdb";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CACHE_SIZE: u64 = 256;
const DEFAULT_CACHE_EVICTION: Duration = Duration::from_secs(8 * 3600);
const DEFAULT_NDT7_CLIENT: &str = "ndt7-client";

#[derive(Parser, Debug)]
#[command(name = BIN_NAME)]
#[command(version)]
#[command(about = "Run a network speed test and store the results in InfluxDB", long_about = None)]
pub struct Args {
    /// Speed test client name [env: CLIENT_NAME]
    #[arg(long)]
    pub client_name: Option<String>,

    /// Speed test client version [env: CLIENT_VERSION]
    #[arg(long)]
    pub client_version: Option<String>,

    /// Default timeout for speed test, e.g. 1m [env: DEFAULT_TIMEOUT]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub default_timeout: Option<Duration>,

    /// LRU cache size for site directory lookups [env: CACHE_SIZE]
    #[arg(long)]
    pub cache_size: Option<u64>,

    /// LRU cache entry lifetime, e.g. 8h [env: CACHE_EVICTION]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub cache_eviction: Option<Duration>,

    /// InfluxDB server url [env: INFLUXDB_URL]
    #[arg(long)]
    pub influxdb_url: Option<String>,

    /// InfluxDB api token [env: INFLUXDB_TOKEN]
    #[arg(long)]
    pub influxdb_token: Option<String>,

    /// InfluxDB organization [env: INFLUXDB_ORG]
    #[arg(long = "influxdb-organization")]
    pub influxdb_org: Option<String>,

    /// InfluxDB bucket [env: INFLUXDB_BUCKET]
    #[arg(long)]
    pub influxdb_bucket: Option<String>,

    /// Accept invalid TLS certificates from InfluxDB [env: INFLUXDB_SKIP_VERIFY]
    #[arg(long)]
    pub influxdb_skip_verify: bool,

    /// Path of the ndt7 measurement tool [env: NDT7_CLIENT]
    #[arg(long)]
    pub ndt7_client: Option<PathBuf>,

    /// Print the measurement site directory and exit
    #[arg(long)]
    pub list_sites: bool,

    /// Print zsh autocomplete
    #[arg(long)]
    pub zsh_autocomplete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestConfig {
    pub client_name: String,
    pub client_version: String,
    pub default_timeout: Duration,
    pub ndt7_client: PathBuf,
}

impl SpeedTestConfig {
    /// Identity sent along with HTTP requests
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.client_name, self.client_version)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub size: u64,
    pub eviction: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfluxDbConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub skip_verify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub speedtest: SpeedTestConfig,
    pub cache: CacheConfig,
    pub influxdb: InfluxDbConfig,
}

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Print this completion script and exit
    Completion(String),
    /// Print the site directory and exit
    ListSites(CacheConfig),
    /// Run a speed test
    Run(Config),
}

impl Config {
    /// Load configuration from the process arguments and environment.
    pub fn from_env() -> Result<Loaded, ConfigError> {
        let env: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::load(std::env::args_os(), &env)
    }

    /// Build the configuration from an argument list and an environment
    /// snapshot. The first element of `args` is the binary name.
    pub fn load<I, T>(args: I, env: &HashMap<String, String>) -> Result<Loaded, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = Args::try_parse_from(args)?;

        if args.zsh_autocomplete {
            return Ok(Loaded::Completion(completion_script(Shell::Zsh)));
        }

        let cache = CacheConfig {
            size: parsed_option(args.cache_size, env, "CACHE_SIZE", "cache size", |v| {
                v.parse::<u64>().map_err(|e| e.to_string())
            })?
            .unwrap_or(DEFAULT_CACHE_SIZE),
            eviction: parsed_option(
                args.cache_eviction,
                env,
                "CACHE_EVICTION",
                "cache eviction",
                parse_duration,
            )?
            .unwrap_or(DEFAULT_CACHE_EVICTION),
        };

        if args.list_sites {
            return Ok(Loaded::ListSites(cache));
        }

        let default_timeout = parsed_option(
            args.default_timeout,
            env,
            "DEFAULT_TIMEOUT",
            "default timeout",
            parse_duration,
        )?
        .unwrap_or(DEFAULT_TIMEOUT);

        let skip_verify = if args.influxdb_skip_verify {
            true
        } else {
            parsed_option(
                None,
                env,
                "INFLUXDB_SKIP_VERIFY",
                "InfluxDB skip verify",
                parse_bool,
            )?
            .unwrap_or(false)
        };

        let ndt7_client = args
            .ndt7_client
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| env_value(env, "NDT7_CLIENT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_NDT7_CLIENT));

        let client_name = string_option(args.client_name, env, "CLIENT_NAME");
        let client_version = string_option(args.client_version, env, "CLIENT_VERSION");
        let url = string_option(args.influxdb_url, env, "INFLUXDB_URL");
        let token = string_option(args.influxdb_token, env, "INFLUXDB_TOKEN");
        let org = string_option(args.influxdb_org, env, "INFLUXDB_ORG");
        let bucket = string_option(args.influxdb_bucket, env, "INFLUXDB_BUCKET");

        Ok(Loaded::Run(Config {
            speedtest: SpeedTestConfig {
                client_name: required(client_name, "client name")?,
                client_version: required(client_version, "client version")?,
                default_timeout,
                ndt7_client,
            },
            cache,
            influxdb: InfluxDbConfig {
                url: required(url, "InfluxDB url")?,
                token: required(token, "InfluxDB token")?,
                org: required(org, "InfluxDB organization")?,
                bucket: required(bucket, "InfluxDB bucket")?,
                skip_verify,
            },
        }))
    }
}

fn completion_script(shell: Shell) -> String {
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut Args::command(), BIN_NAME, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn env_value<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn string_option(flag: Option<String>, env: &HashMap<String, String>, key: &str) -> Option<String> {
    flag.filter(|v| !v.is_empty())
        .or_else(|| env_value(env, key).map(str::to_string))
}

fn parsed_option<T, F>(
    flag: Option<T>,
    env: &HashMap<String, String>,
    key: &str,
    field: &'static str,
    parse: F,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Result<T, String>,
{
    if flag.is_some() {
        return Ok(flag);
    }

    match env_value(env, key) {
        Some(raw) => parse(raw).map(Some).map_err(|reason| ConfigError::Invalid {
            field,
            value: raw.to_string(),
            reason,
        }),
        None => Ok(None),
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value.ok_or(ConfigError::Missing(field))
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [(&str, &str, &str); 6] = [
        ("--client-name", "CLIENT_NAME", "client name"),
        ("--client-version", "CLIENT_VERSION", "client version"),
        ("--influxdb-url", "INFLUXDB_URL", "InfluxDB url"),
        ("--influxdb-token", "INFLUXDB_TOKEN", "InfluxDB token"),
        ("--influxdb-organization", "INFLUXDB_ORG", "InfluxDB organization"),
        ("--influxdb-bucket", "INFLUXDB_BUCKET", "InfluxDB bucket"),
    ];

    fn flags_without(skip: Option<usize>) -> Vec<String> {
        let mut args = vec![BIN_NAME.to_string()];
        for (i, (flag, _, _)) in REQUIRED.iter().enumerate() {
            if Some(i) != skip {
                args.push(flag.to_string());
                args.push(format!("value-{}", i));
            }
        }
        args
    }

    fn run_config(loaded: Loaded) -> Config {
        match loaded {
            Loaded::Run(config) => config,
            other => panic!("expected run configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_all_flags_and_defaults() {
        let config = run_config(Config::load(flags_without(None), &HashMap::new()).unwrap());

        assert_eq!(config.speedtest.client_name, "value-0");
        assert_eq!(config.speedtest.client_version, "value-1");
        assert_eq!(config.speedtest.default_timeout, Duration::from_secs(60));
        assert_eq!(config.speedtest.ndt7_client, PathBuf::from("ndt7-client"));
        assert_eq!(config.cache.size, 256);
        assert_eq!(config.cache.eviction, Duration::from_secs(8 * 3600));
        assert_eq!(config.influxdb.url, "value-2");
        assert_eq!(config.influxdb.token, "value-3");
        assert_eq!(config.influxdb.org, "value-4");
        assert_eq!(config.influxdb.bucket, "value-5");
        assert!(!config.influxdb.skip_verify);
    }

    #[test]
    fn test_missing_field_is_named() {
        for (i, (_, _, field)) in REQUIRED.iter().enumerate() {
            let err = Config::load(flags_without(Some(i)), &HashMap::new()).unwrap_err();
            match err {
                ConfigError::Missing(missing) => assert_eq!(missing, *field),
                other => panic!("unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn test_first_missing_field_wins() {
        let args = vec![BIN_NAME, "--influxdb-url", "http://localhost:8086"];
        let err = Config::load(args, &HashMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "client name is required");

        let args = vec![BIN_NAME, "--client-name", "home-office", "--client-version", "1"];
        let err = Config::load(args, &HashMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "InfluxDB url is required");
    }

    #[test]
    fn test_environment_fallback() {
        let env: HashMap<String, String> = REQUIRED
            .iter()
            .map(|(_, key, _)| (key.to_string(), format!("env-{}", key)))
            .chain([
                ("DEFAULT_TIMEOUT".to_string(), "90s".to_string()),
                ("CACHE_SIZE".to_string(), "16".to_string()),
                ("CACHE_EVICTION".to_string(), "2h".to_string()),
                ("NDT7_CLIENT".to_string(), "/opt/bin/ndt7-client".to_string()),
                ("INFLUXDB_SKIP_VERIFY".to_string(), "true".to_string()),
            ])
            .collect();

        let config = run_config(Config::load([BIN_NAME], &env).unwrap());

        assert_eq!(config.speedtest.client_name, "env-CLIENT_NAME");
        assert_eq!(config.speedtest.client_version, "env-CLIENT_VERSION");
        assert_eq!(config.speedtest.default_timeout, Duration::from_secs(90));
        assert_eq!(config.speedtest.ndt7_client, PathBuf::from("/opt/bin/ndt7-client"));
        assert_eq!(config.cache.size, 16);
        assert_eq!(config.cache.eviction, Duration::from_secs(2 * 3600));
        assert_eq!(config.influxdb.url, "env-INFLUXDB_URL");
        assert_eq!(config.influxdb.token, "env-INFLUXDB_TOKEN");
        assert_eq!(config.influxdb.org, "env-INFLUXDB_ORG");
        assert_eq!(config.influxdb.bucket, "env-INFLUXDB_BUCKET");
        assert!(config.influxdb.skip_verify);
    }

    #[test]
    fn test_flag_overrides_environment() {
        let mut args = flags_without(None);
        args.extend(["--default-timeout".to_string(), "5s".to_string()]);

        let env = HashMap::from([
            ("CLIENT_NAME".to_string(), "from-env".to_string()),
            ("DEFAULT_TIMEOUT".to_string(), "10m".to_string()),
        ]);

        let config = run_config(Config::load(args, &env).unwrap());
        assert_eq!(config.speedtest.client_name, "value-0");
        assert_eq!(config.speedtest.default_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_env_does_not_touch_client_version() {
        let env = HashMap::from([("DEFAULT_TIMEOUT".to_string(), "30s".to_string())]);

        let config = run_config(Config::load(flags_without(None), &env).unwrap());
        assert_eq!(config.speedtest.client_version, "value-1");
        assert_eq!(config.speedtest.default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_environment_value_is_unset() {
        let env = HashMap::from([("CLIENT_NAME".to_string(), String::new())]);
        let err = Config::load(flags_without(Some(0)), &env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("client name")));
    }

    #[test]
    fn test_invalid_environment_value() {
        let env = HashMap::from([("CACHE_SIZE".to_string(), "lots".to_string())]);

        let err = Config::load(flags_without(None), &env).unwrap_err();
        match err {
            ConfigError::Invalid { field, value, .. } => {
                assert_eq!(field, "cache size");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_flag_is_an_argument_error() {
        let args = vec![BIN_NAME, "--default-timeout", "soon"];
        let err = Config::load(args, &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Arguments(_)));
    }

    #[test]
    fn test_zsh_autocomplete_short_circuits_validation() {
        let loaded = Config::load([BIN_NAME, "--zsh-autocomplete"], &HashMap::new()).unwrap();

        match loaded {
            Loaded::Completion(script) => {
                assert!(script.starts_with("#compdef"));
                assert!(script.contains("--influxdb-url"));
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_list_sites_short_circuits_validation() {
        let loaded = Config::load([BIN_NAME, "--list-sites", "--cache-size", "4"], &HashMap::new()).unwrap();

        assert_eq!(
            loaded,
            Loaded::ListSites(CacheConfig {
                size: 4,
                eviction: DEFAULT_CACHE_EVICTION,
            })
        );
    }
}
