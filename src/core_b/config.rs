//! Core B tunables.

use std::time::Duration;

/// Default listen address for Core B.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:5201";
pub const DEFAULT_BACKEND: &str = "127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub backend: String,
    /// Optional pacing delay applied before each send; zero disables it.
    pub send_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            backend: DEFAULT_BACKEND.to_string(),
            send_delay: Duration::from_millis(50),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen: std::env::var("WSJF_LISTEN").unwrap_or(defaults.listen),
            backend: std::env::var("WSJF_BACKEND").unwrap_or(defaults.backend),
            send_delay: Duration::from_millis(crate::env::var_or_logged(
                "WSJF_SEND_DELAY_MS",
                defaults.send_delay.as_millis() as u64,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.listen, "0.0.0.0:5201");
        assert_eq!(cfg.send_delay, Duration::from_millis(50));
    }
}
