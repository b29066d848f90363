use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// One recorded work interval. Timestamps are persisted as integer epoch
/// milliseconds, matching the wire shape of the state file and keeping
/// reports reconstructable to the millisecond. Invariant: `end > start`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct SessionEntity {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
}

impl SessionEntity {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }
}
