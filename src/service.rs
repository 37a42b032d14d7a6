use crate::aggregate::{aggregate, DayActivity};
use crate::config::Settings;
use crate::date;
use crate::db::HeartbeatRepository;
use crate::error::{Error, Result};
use crate::model::{Heartbeat, RawHeartbeat, Summary};
use crate::normalize::{normalize, IdGenerator, UuidV4};
use chrono::NaiveDate;
use std::sync::Arc;

pub struct HeartbeatService<R> {
    repo: R,
    settings: Arc<Settings>,
    ids: Box<dyn IdGenerator>,
}

impl<R: HeartbeatRepository> HeartbeatService<R> {
    pub fn new(repo: R, settings: Arc<Settings>) -> Self {
        Self {
            repo,
            settings,
            ids: Box::new(UuidV4),
        }
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn prepare(&self, raw: RawHeartbeat) -> Result<Heartbeat> {
        let heartbeat = normalize(raw, self.ids.as_ref())?;
        if self.settings.zone().date_of(heartbeat.time).is_none() {
            return Err(Error::invalid(format!(
                "time {} is out of range",
                heartbeat.time
            )));
        }
        Ok(heartbeat)
    }

    /// Normalizes and stores one heartbeat, returning its id.
    pub async fn save(&self, raw: RawHeartbeat) -> Result<String> {
        let heartbeat = self.prepare(raw)?;
        let id = heartbeat.id.clone();
        self.repo.insert(heartbeat).await?;
        Ok(id)
    }

    /// Stores a batch. Nothing is written if any heartbeat is invalid.
    pub async fn save_all(&self, raws: Vec<RawHeartbeat>) -> Result<Vec<String>> {
        let heartbeats = raws
            .into_iter()
            .map(|raw| self.prepare(raw))
            .collect::<Result<Vec<_>>>()?;
        let ids = heartbeats.iter().map(|h| h.id.clone()).collect();
        self.repo.insert_many(heartbeats).await?;
        Ok(ids)
    }

    async fn day(&self, date: NaiveDate, timeout: u32) -> Result<DayActivity> {
        let heartbeats = self.repo.list_by_date(date).await?;
        Ok(aggregate(&heartbeats, timeout))
    }

    /// Active milliseconds on `date`.
    pub async fn total_on(&self, date: NaiveDate) -> Result<i64> {
        let timeout = self.settings.timeout();
        Ok(self.day(date, timeout).await?.total_msec)
    }

    /// Active milliseconds so far today.
    pub async fn today(&self) -> Result<i64> {
        self.total_on(self.settings.zone().today()).await
    }

    /// Folds every day from `start` to `end` inclusive into one summary.
    ///
    /// Fails as a whole if any single day can't be read.
    pub async fn summarize(&self, start: NaiveDate, end: NaiveDate) -> Result<Summary> {
        if start > end {
            return Err(Error::invalid(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        let days = date::day_count(start, end);
        let max = self.settings.max_range_days();
        if days > max as usize {
            return Err(Error::invalid(format!(
                "range of {} days exceeds the limit of {}",
                days, max
            )));
        }
        tracing::debug!("summarize, start={}, end={}", start, end);

        let timeout = self.settings.timeout();
        let mut summary = Summary {
            msec_per_day: Vec::with_capacity(days),
            ..Summary::default()
        };
        for date in date::days(start, end) {
            summary.push_day(self.day(date, timeout).await?);
        }

        Ok(summary)
    }
}
