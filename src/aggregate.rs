//! Session-windowed aggregation of one day's heartbeats.
//!
//! Consecutive heartbeats closer together than the timeout are treated as
//! continuous work. The gap between them is credited to the earlier
//! heartbeat's editor, language, OS and project. Longer gaps are idle time
//! and are dropped.

use crate::model::Heartbeat;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counted milliseconds per canonical value, one map per dimension.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Breakdown {
    pub editors: BTreeMap<String, i64>,
    pub languages: BTreeMap<String, i64>,
    pub oss: BTreeMap<String, i64>,
    pub projects: BTreeMap<String, i64>,
}

impl Breakdown {
    fn credit(&mut self, heartbeat: &Heartbeat, msec: i64) {
        add(&mut self.editors, &heartbeat.editor, msec);
        add(&mut self.languages, &heartbeat.language, msec);
        add(&mut self.oss, &heartbeat.os, msec);
        add(&mut self.projects, &heartbeat.project, msec);
    }

    /// Folds `other` into `self`, summing durations of shared keys.
    pub fn merge(&mut self, other: Breakdown) {
        merge_into(&mut self.editors, other.editors);
        merge_into(&mut self.languages, other.languages);
        merge_into(&mut self.oss, other.oss);
        merge_into(&mut self.projects, other.projects);
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
            && self.languages.is_empty()
            && self.oss.is_empty()
            && self.projects.is_empty()
    }
}

fn add(map: &mut BTreeMap<String, i64>, key: &str, msec: i64) {
    match map.get_mut(key) {
        Some(v) => *v += msec,
        None => {
            map.insert(key.to_owned(), msec);
        }
    }
}

fn merge_into(dst: &mut BTreeMap<String, i64>, src: BTreeMap<String, i64>) {
    for (key, msec) in src {
        *dst.entry(key).or_insert(0) += msec;
    }
}

/// One day's active duration and where it went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayActivity {
    pub total_msec: i64,
    pub breakdown: Breakdown,
}

/// Aggregates a day of heartbeats sorted ascending by `time`.
///
/// A gap of exactly `timeout_secs` seconds still counts. Fewer than two
/// heartbeats yield an empty result.
pub fn aggregate(heartbeats: &[Heartbeat], timeout_secs: u32) -> DayActivity {
    let limit = i64::from(timeout_secs) * 1000;
    let mut day = DayActivity::default();

    for pair in heartbeats.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        let gap = later.time - earlier.time;
        if gap > limit {
            continue;
        }

        day.breakdown.credit(earlier, gap);
        day.total_msec += gap;
    }

    day
}
