use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the digest backend (e.g. "http://localhost:8080/api").
    pub api_base: String,

    /// Upper bound on a single per-company derivation request.
    pub derive_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            api_base: required_env("DIGEST_API_BASE"),
            derive_timeout: Duration::from_secs(
                env::var("DIGEST_DERIVE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("DIGEST_DERIVE_TIMEOUT_SECS must be a number"),
            ),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
