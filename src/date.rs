use chrono::{Duration, Local, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// The civil calendar heartbeats are partitioned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Whatever the host is configured with.
    Local,
    Named(Tz),
}

impl Default for Zone {
    fn default() -> Self {
        Zone::Local
    }
}

impl Zone {
    /// Calendar date of an epoch-millisecond instant.
    pub fn date_of(self, time: i64) -> Option<NaiveDate> {
        match self {
            Zone::Local => date_in(&Local, time),
            Zone::Named(tz) => date_in(&tz, time),
        }
    }

    /// Epoch milliseconds of the first instant of `date`.
    pub fn start_of(self, date: NaiveDate) -> Option<i64> {
        match self {
            Zone::Local => start_in(&Local, date),
            Zone::Named(tz) => start_in(&tz, date),
        }
    }

    /// Half-open `[start, end)` millisecond bounds of `date`.
    pub fn day_bounds(self, date: NaiveDate) -> Option<(i64, i64)> {
        Some((self.start_of(date)?, self.start_of(date.succ_opt()?)?))
    }

    pub fn today(self) -> NaiveDate {
        match self {
            Zone::Local => Local::now().date_naive(),
            Zone::Named(tz) => Utc::now().with_timezone(&tz).date_naive(),
        }
    }
}

fn date_in<T: TimeZone>(tz: &T, time: i64) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(time).single().map(|t| t.date_naive())
}

fn start_in<T: TimeZone>(tz: &T, date: NaiveDate) -> Option<i64> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    // DST may skip midnight; the day then starts at the first local time that exists.
    (0..=180)
        .step_by(15)
        .find_map(|m| tz.from_local_datetime(&(midnight + Duration::minutes(m))).earliest())
        .map(|t| t.timestamp_millis())
}

/// Every date from `start` to `end`, both included. Empty when `start > end`.
pub fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Number of dates `days(start, end)` yields.
pub fn day_count(start: NaiveDate, end: NaiveDate) -> usize {
    if start > end {
        return 0;
    }
    (end - start).num_days() as usize + 1
}

/// Renders a duration with `%HH`/`%H` for hours and `%MM`/`%M` for minutes.
pub fn format_time(format: &str, msec: i64) -> String {
    let minutes = msec.max(0) / 60_000;
    let (hour, min) = (minutes / 60, minutes % 60);

    format
        .replace("%HH", &format!("{:02}", hour))
        .replace("%H", &hour.to_string())
        .replace("%MM", &format!("{:02}", min))
        .replace("%M", &min.to_string())
}
