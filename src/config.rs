//! Service configuration
//!
//! Read from environment variables (a `.env` file is honoured):
//!
//! | Variable | Default |
//! |---|---|
//! | `VOCAB_BIND_ADDR` | `0.0.0.0:8000` |
//! | `VOCAB_DATABASE_URL` | unset → in-memory vocabulary |
//! | `VOCAB_SEED_PATH` | unset → start empty |
//! | `VOCAB_MIN_FREQUENCY` | `2` |
//! | `VOCAB_FETCH_TIMEOUT_SECS` | `10` |
//! | `VOCAB_USER_AGENT` | `Mozilla/5.0` |
//! | `VOCAB_MAX_CONCURRENT_JOBS` | `4` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::extractor::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::training::{DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_MIN_FREQUENCY};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    /// Vocabulary export bulk-loaded at startup.
    pub seed_path: Option<PathBuf>,
    pub min_frequency: usize,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub max_concurrent_jobs: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            seed_path: None,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            fetch_timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

impl ServiceConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            bind_addr: get("VOCAB_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: get("VOCAB_DATABASE_URL"),
            seed_path: get("VOCAB_SEED_PATH").map(PathBuf::from),
            min_frequency: parse_or(
                "VOCAB_MIN_FREQUENCY",
                get("VOCAB_MIN_FREQUENCY"),
                defaults.min_frequency,
            ),
            fetch_timeout: Duration::from_secs(parse_or(
                "VOCAB_FETCH_TIMEOUT_SECS",
                get("VOCAB_FETCH_TIMEOUT_SECS"),
                defaults.fetch_timeout.as_secs(),
            )),
            user_agent: get("VOCAB_USER_AGENT").unwrap_or(defaults.user_agent),
            max_concurrent_jobs: parse_or(
                "VOCAB_MAX_CONCURRENT_JOBS",
                get("VOCAB_MAX_CONCURRENT_JOBS"),
                defaults.max_concurrent_jobs,
            ),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}={:?}, using default {}", key, value, default);
            default
        }),
    }
}
