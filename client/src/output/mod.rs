//! Console output

use crate::sites::site_code;
use crate::testing::{Summary, ValueUnitPair};
use protocol::Site;

/// Print the speed test results for the user
pub fn print_summary(summary: &Summary) {
    print!("{}", format_summary(summary, chrono::Local::now()));
}

/// Print one line per measurement site
pub fn print_sites(sites: &[Site]) {
    for site in sites {
        println!("{}", format_site(site));
    }
}

fn format_summary<Tz: chrono::TimeZone>(summary: &Summary, now: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let server = match site_code(&summary.server_fqdn) {
        Some(code) => format!("{} (site {})", summary.server_fqdn, code),
        None => summary.server_fqdn.clone(),
    };

    format!(
        "[{}] Server: {}\n\
         \x20          Download: {}\n\
         \x20          Upload: {}\n\
         \x20          Retransmission: {}\n\
         \x20          Min RTT: {}\n",
        now.format("%H:%M:%S"),
        server,
        format_pair(&summary.download),
        format_pair(&summary.upload),
        format_pair(&summary.download_retrans),
        format_pair(&summary.min_rtt),
    )
}

fn format_pair(pair: &ValueUnitPair) -> String {
    if pair.unit.is_empty() {
        "n/a".to_string()
    } else {
        format!("{:.2} {}", pair.value, pair.unit)
    }
}

fn format_site(site: &Site) -> String {
    format!(
        "{:<6} {:<2} {:<24} {:>9.4} {:>9.4} {:>5}{}",
        site.site,
        site.country,
        site.city,
        site.lat,
        site.lon,
        site.uplink_speed,
        if site.roundrobin { " roundrobin" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_summary() {
        let summary = Summary {
            server_fqdn: "ndt-mlab1-mil04.mlab-oti.measurement-lab.org".to_string(),
            download: ValueUnitPair { value: 93.456, unit: "Mbit/s".to_string() },
            upload: ValueUnitPair { value: 10.0, unit: "Mbit/s".to_string() },
            download_retrans: ValueUnitPair::default(),
            min_rtt: ValueUnitPair { value: 25.0, unit: "ms".to_string() },
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();

        let text = format_summary(&summary, now);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "[12:30:05] Server: ndt-mlab1-mil04.mlab-oti.measurement-lab.org (site mil04)"
        );
        assert_eq!(lines[1].trim(), "Download: 93.46 Mbit/s");
        assert_eq!(lines[2].trim(), "Upload: 10.00 Mbit/s");
        assert_eq!(lines[3].trim(), "Retransmission: n/a");
        assert_eq!(lines[4].trim(), "Min RTT: 25.00 ms");
    }

    #[test]
    fn test_format_site() {
        let site = Site {
            country: "IT".to_string(),
            city: "Milan".to_string(),
            lat: 45.4642,
            lon: 9.19,
            roundrobin: true,
            site: "mil04".to_string(),
            uplink_speed: "10g".to_string(),
        };

        let line = format_site(&site);
        assert!(line.starts_with("mil04  IT Milan"));
        assert!(line.contains("45.4642"));
        assert!(line.ends_with("10g roundrobin"));
    }
}
