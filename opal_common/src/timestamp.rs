//! Wall-clock instants recorded on task and node lifecycle events.

use ::core::fmt::Display;
use ::std::time::Duration;

use ::serde::{Deserialize, Serialize};
use ::time::OffsetDateTime;

/// A UTC instant, serialized in rfc3339.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Time elapsed since this instant. Saturates to zero if the clock
    /// stepped backwards.
    pub fn elapsed(&self) -> Duration {
        let delta = OffsetDateTime::now_utc() - self.0;
        delta.try_into().unwrap_or(Duration::ZERO)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
