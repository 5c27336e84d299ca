//! Environment-variable configuration loading.
//!
//! Style follows the teacher's macro-driven env parsing (see skytable's
//! `config/cfgenv.rs`): absent variables fall back to a default,
//! present-but-unparsable ones are a startup-fatal [`ConfigError`].

use crate::error::ConfigError;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub events_file: String,
    pub block_size: usize,
    pub worker_pool_size: usize,
    pub min_report_interval: Duration,
    pub http_addr: SocketAddr,
    pub rate_limit_rps: f64,
    pub rate_limit_burst: u32,
}

macro_rules! getenv {
    ($var:expr) => {{
        match env::var($var) {
            Ok(v) => Some(v),
            Err(env::VarError::NotPresent) => None,
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::BadValue {
                    var: $var,
                    reason: "value is not valid unicode".into(),
                })
            }
        }
    }};
    ($var:expr, $ty:ty) => {{
        match getenv!($var) {
            Some(v) => match v.parse::<$ty>() {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    return Err(ConfigError::BadValue {
                        var: $var,
                        reason: e.to_string(),
                    })
                }
            },
            None => None,
        }
    }};
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let events_file = getenv!("EVENTS_FILE").unwrap_or_else(|| "events".to_string());
        let block_size = getenv!("BLOCK_SIZE", usize).unwrap_or(10_000);
        let worker_pool_size = getenv!("WORKER_POOL_SIZE", usize).unwrap_or_else(num_cpus::get);
        let min_report_interval_secs = getenv!("MIN_REPORT_INTERVAL", u64).unwrap_or(5);
        let http_addr = getenv!("HTTP_ADDR", SocketAddr)
            .unwrap_or_else(|| "0.0.0.0:8080".parse().unwrap());
        let rate_limit_rps = getenv!("RATE_LIMIT_RPS", f64).unwrap_or(50.0);
        let rate_limit_burst = getenv!("RATE_LIMIT_BURST", u32).unwrap_or(100);

        if block_size == 0 {
            return Err(ConfigError::BadValue {
                var: "BLOCK_SIZE",
                reason: "must be greater than 0".into(),
            });
        }
        if worker_pool_size == 0 {
            return Err(ConfigError::BadValue {
                var: "WORKER_POOL_SIZE",
                reason: "must be greater than 0".into(),
            });
        }

        Ok(Config {
            events_file,
            block_size,
            worker_pool_size,
            min_report_interval: Duration::from_secs(min_report_interval_secs),
            http_addr,
            rate_limit_rps,
            rate_limit_burst,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases live in one test: env::set_var mutates shared process
    // state, and cargo runs tests on multiple threads by default.
    #[test]
    fn rejects_bad_block_size() {
        env::set_var("BLOCK_SIZE", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { var: "BLOCK_SIZE", .. }));

        env::set_var("BLOCK_SIZE", "not-a-number");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { var: "BLOCK_SIZE", .. }));

        env::remove_var("BLOCK_SIZE");
    }
}
