//! Runtime configuration, read from environment variables.
//!
//! Defaults keep the unbounded fan-out and no-timeout behavior; the bound and
//! the timeout are opt-in for callers that cannot cap request sizes themselves.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_TEMP_DIR: &str = "VIDTHUMB_TEMP_DIR";
pub const ENV_MAX_PARALLEL: &str = "VIDTHUMB_MAX_PARALLEL";
pub const ENV_EXTRACT_TIMEOUT_SECS: &str = "VIDTHUMB_EXTRACT_TIMEOUT_SECS";
pub const ENV_STALE_MAX_AGE_HOURS: &str = "VIDTHUMB_STALE_MAX_AGE_HOURS";

const DEFAULT_STALE_MAX_AGE_HOURS: u64 = 24;

/// Largest extraction bound a limiter can hold.
pub const MAX_PARALLEL_LIMIT: usize = tokio::sync::Semaphore::MAX_PERMITS;

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailerConfig {
    /// Directory for transient artifacts. Must be writable.
    pub temp_dir: PathBuf,
    /// Upper bound on concurrently running frame extractions. `None` = one per valid timestamp.
    pub max_parallel_extractions: Option<usize>,
    /// Per-extraction wall-clock limit. `None` = wait indefinitely.
    pub extract_timeout: Option<Duration>,
    /// Age after which leftover artifacts from earlier processes are swept at startup.
    pub stale_artifact_max_age: Duration,
}

impl Default for ThumbnailerConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            max_parallel_extractions: None,
            extract_timeout: None,
            stale_artifact_max_age: Duration::from_secs(DEFAULT_STALE_MAX_AGE_HOURS * 3600),
        }
    }
}

impl ThumbnailerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparseable or zero values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_TEMP_DIR).filter(|v| !v.trim().is_empty()) {
            config.temp_dir = PathBuf::from(dir.trim());
        }
        if let Some(n) = parse_positive(&lookup, ENV_MAX_PARALLEL) {
            match usize::try_from(n).ok().filter(|n| *n <= MAX_PARALLEL_LIMIT) {
                Some(n) => config.max_parallel_extractions = Some(n),
                None => log::warn!(
                    target: "vidthumb::config",
                    "Ignoring {}={}: above the limit of {}",
                    ENV_MAX_PARALLEL,
                    n,
                    MAX_PARALLEL_LIMIT
                ),
            }
        }
        if let Some(secs) = parse_positive(&lookup, ENV_EXTRACT_TIMEOUT_SECS) {
            config.extract_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(hours) = parse_positive(&lookup, ENV_STALE_MAX_AGE_HOURS) {
            config.stale_artifact_max_age = Duration::from_secs(hours * 3600);
        }

        log::debug!(
            target: "vidthumb::config",
            "Config: temp_dir={}, max_parallel={:?}, extract_timeout={:?}",
            config.temp_dir.display(),
            config.max_parallel_extractions,
            config.extract_timeout
        );
        config
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            log::warn!(
                target: "vidthumb::config",
                "Ignoring {}={:?}: expected a positive integer",
                key,
                raw
            );
            None
        }
    }
}
