//! Tiny environment-variable parsing helper shared by both cores' `Config`.
//!
//! Tunables are read once at startup straight from the process environment,
//! falling back to the struct's `Default` value when unset or unparsable.

use std::{env, fmt::Display, str::FromStr};

/// Reads `key` from the environment and parses it as `T`, falling back to
/// `default` when the variable is absent or fails to parse.
pub(crate) fn var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value, "could not parse environment variable, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Same as [`var_or`], but logs the resolved value at `debug` for operators
/// diffing a deployment against the compiled-in defaults.
pub(crate) fn var_or_logged<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    let value = var_or(key, default);
    tracing::debug!(key, %value, "resolved tunable");
    value
}
