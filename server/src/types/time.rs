//! Audit timestamps.
//!
//! Timestamps are stored as milliseconds since the Unix epoch so every dialect
//! can hold them in a plain 64-bit integer column.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// A clock reading before 1970 maps to the epoch.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Milliseconds won't overflow i64 for millions of years
    pub fn from_system_time(time: SystemTime) -> Self {
        Self(
            time.duration_since(UNIX_EPOCH)
                .map_or(0, |duration| duration.as_millis() as i64),
        )
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }
}
