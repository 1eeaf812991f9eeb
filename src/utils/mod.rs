//! Small shared helpers: environment overrides and serde adapters.

use std::env;
use std::str::FromStr;

/// Parse an environment variable, ignoring it when missing or malformed.
pub(crate) fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

/// Serialize a [`std::time::Duration`] as whole milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
