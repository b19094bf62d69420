//! Time-series points and their line protocol encoding

use chrono::{DateTime, Utc};

/// A single timestamped, tagged observation
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, f64)>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_field(mut self, key: &str, value: f64) -> Self {
        self.fields.push((key.to_string(), value));
        self
    }

    /// Encode as one line of InfluxDB line protocol with a nanosecond
    /// timestamp.
    ///
    /// Tags with an empty value and non-finite fields cannot be expressed
    /// and are left out. Returns `None` when no field remains.
    pub fn to_line_protocol(&self) -> Option<String> {
        let fields: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| format!("{}={}", escape_key(k), v))
            .collect();

        if fields.is_empty() {
            return None;
        }

        let mut tags: Vec<&(String, String)> =
            self.tags.iter().filter(|(_, v)| !v.is_empty()).collect();
        tags.sort_by(|a, b| a.0.cmp(&b.0));

        let mut line = escape_measurement(&self.measurement);
        for (k, v) in tags {
            line.push(',');
            line.push_str(&escape_key(k));
            line.push('=');
            line.push_str(&escape_key(v));
        }

        line.push(' ');
        line.push_str(&fields.join(","));
        line.push(' ');
        line.push_str(&self.timestamp.timestamp_nanos_opt().unwrap_or_default().to_string());

        Some(line)
    }
}

#[cfg(test)]
impl Point {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }
}

fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
