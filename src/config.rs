//! Runtime settings read from the environment.

use serde::Serialize;

use crate::chart::MAX_DECADES;

/// Runtime settings read from the environment.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Accepted birth-year range, inclusive.
    pub min_year: i32,
    pub max_year: i32,
    /// Listen address for the HTTP server. `PORT` overrides the port part.
    pub bind: String,
    /// Default directory for exported series.
    pub out_dir: String,
    /// Decades listed in a chart report.
    pub report_decades: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_year: 1900,
            max_year: 2100,
            bind: "127.0.0.1:8080".to_string(),
            out_dir: "out/fortune".to_string(),
            report_decades: MAX_DECADES,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let mut bind = std::env::var("FORTUNE_BIND").unwrap_or(defaults.bind);
        if let Some(port) = std::env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()) {
            bind = with_port(&bind, port);
        }
        Self {
            min_year: std::env::var("FORTUNE_MIN_YEAR").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.min_year),
            max_year: std::env::var("FORTUNE_MAX_YEAR").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.max_year),
            bind,
            out_dir: std::env::var("FORTUNE_OUT_DIR").unwrap_or(defaults.out_dir),
            report_decades: std::env::var("FORTUNE_REPORT_DECADES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .map(|n| n.clamp(1, MAX_DECADES))
                .unwrap_or(defaults.report_decades),
        }
    }

    pub fn year_in_range(&self, year: i32) -> bool {
        (self.min_year..=self.max_year).contains(&year)
    }
}

fn with_port(bind: &str, port: u16) -> String {
    let host = bind.rsplit_once(':').map(|(h, _)| h).unwrap_or(bind);
    format!("{}:{}", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert!(cfg.year_in_range(1900));
        assert!(cfg.year_in_range(2100));
        assert!(!cfg.year_in_range(1899));
        assert!(!cfg.year_in_range(2101));
        assert_eq!(cfg.report_decades, 12);
    }

    #[test]
    fn test_port_override() {
        assert_eq!(with_port("127.0.0.1:8080", 9000), "127.0.0.1:9000");
        assert_eq!(with_port("0.0.0.0", 9000), "0.0.0.0:9000");
    }
}
