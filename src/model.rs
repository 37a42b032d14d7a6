use crate::aggregate::{Breakdown, DayActivity};
use serde::{Deserialize, Serialize};

/// A normalized activity event. Never changes after it is stored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub id: String,
    pub entity: String,
    pub project: String,
    pub language: String,
    pub branch: String,
    pub os: String,
    pub editor: String,
    /// Milliseconds since the Unix epoch.
    pub time: i64,
    pub machine_name: Option<String>,
}

/// A heartbeat as submitted, before defaults and canonical names are applied.
#[derive(Debug, Clone, Default)]
pub struct RawHeartbeat {
    pub entity: Option<String>,
    pub project: Option<String>,
    pub language: Option<String>,
    pub branch: Option<String>,
    pub user_agent: Option<String>,
    pub time: Option<i64>,
    pub machine_name: Option<String>,
}

/// Time spent over an inclusive range of days.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_msec: i64,
    pub msec_per_day: Vec<i64>,
    #[serde(flatten)]
    pub breakdown: Breakdown,
}

impl Summary {
    /// Appends the next day of the range.
    pub fn push_day(&mut self, day: DayActivity) {
        self.msec_per_day.push(day.total_msec);
        self.total_msec += day.total_msec;
        self.breakdown.merge(day.breakdown);
    }
}
