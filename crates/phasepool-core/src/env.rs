//! Environment variable utilities
//!
//! All pool variables share the `PHASEPOOL_` prefix. Unset or unparsable
//! values fall back to the supplied default.
//!
//! ```ignore
//! use phasepool_core::env::{env_get, env_get_millis, env_key};
//!
//! let workers: usize = env_get(&env_key("NUM_WORKERS"), 4);
//! let poll = env_get_millis(&env_key("POLL_INTERVAL_MS"), Duration::from_millis(50));
//! ```

use std::str::FromStr;
use std::time::Duration;

use crate::constants::ENV_PREFIX;

/// Full variable name for a pool setting (`NUM_WORKERS` -> `PHASEPOOL_NUM_WORKERS`)
pub fn env_key(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}

/// Variable parsed as `T`, or `default`
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Variable parsed as `T`; `None` if unset or unparsable
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Variable in milliseconds
#[inline]
pub fn env_get_millis(key: &str, default: Duration) -> Duration {
    env_get_opt::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Optional timeout in milliseconds
///
/// `0`, `none` and `off` mean "no timeout" (`None`). Unset or unparsable
/// values return `default`.
pub fn env_get_timeout(key: &str, default: Option<Duration>) -> Option<Duration> {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().to_lowercase().as_str() {
        "0" | "none" | "off" => None,
        other => match other.parse::<u64>() {
            Ok(ms) => Some(Duration::from_millis(ms)),
            Err(_) => default,
        },
    }
}
