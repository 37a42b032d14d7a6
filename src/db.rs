use crate::model::Heartbeat;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Heartbeat storage, partitioned by calendar date.
#[async_trait]
pub trait HeartbeatRepository: Send + Sync {
    async fn insert(&self, heartbeat: Heartbeat) -> Result<()>;

    async fn insert_many(&self, heartbeats: Vec<Heartbeat>) -> Result<()> {
        for heartbeat in heartbeats {
            self.insert(heartbeat).await?;
        }
        Ok(())
    }

    /// All heartbeats of `date`, ascending by `time`.
    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Heartbeat>>;
}

pub mod mongo {
    use super::*;
    use crate::date::Zone;
    use anyhow::{Context as _, Result};
    use bson::doc;
    use futures::TryStreamExt as _;
    use mongodb::options::{ClientOptions, FindOptions};
    use mongodb::{Client, Collection, IndexModel};

    #[derive(Clone)]
    pub struct MongoDb {
        inner: Collection<MongoHeartbeat>,
        zone: Zone,
    }

    impl MongoDb {
        const DATABASE_NAME: &'static str = "waka";
        const COLLECTION_NAME: &'static str = "heartbeat";

        pub async fn new(url: &str, zone: Zone) -> Result<Self> {
            let opt = ClientOptions::parse(url)
                .await
                .context("failed to parse mongodb url")?;

            let collection = Client::with_options(opt)
                .context("failed to create mongodb client")?
                .database(Self::DATABASE_NAME)
                .collection(Self::COLLECTION_NAME);

            let index = IndexModel::builder().keys(doc! { "time": 1 }).build();
            collection
                .create_index(index, None)
                .await
                .context("failed to create index on heartbeat time")?;

            Ok(Self {
                inner: collection,
                zone,
            })
        }
    }

    #[async_trait]
    impl HeartbeatRepository for MongoDb {
        async fn insert(&self, heartbeat: Heartbeat) -> Result<()> {
            self.inner
                .insert_one(MongoHeartbeat::from(heartbeat), None)
                .await
                .context("failed to put heartbeat to mongodb")?;

            Ok(())
        }

        async fn insert_many(&self, heartbeats: Vec<Heartbeat>) -> Result<()> {
            if heartbeats.is_empty() {
                return Ok(());
            }

            let heartbeats = heartbeats.into_iter().map(MongoHeartbeat::from);

            self.inner
                .insert_many(heartbeats, None)
                .await
                .context("failed to put heartbeats to mongodb")?;

            Ok(())
        }

        async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Heartbeat>> {
            let (start, end) = self
                .zone
                .day_bounds(date)
                .with_context(|| format!("{} is out of range", date))?;

            let filter = doc! { "time": { "$gte": start, "$lt": end } };
            let options = FindOptions::builder().sort(doc! { "time": 1 }).build();

            let heartbeats: Vec<MongoHeartbeat> = self
                .inner
                .find(filter, options)
                .await
                .context("failed to query heartbeats from mongodb")?
                .try_collect()
                .await
                .context("failed to read heartbeats from mongodb")?;

            Ok(heartbeats.into_iter().map(Heartbeat::from).collect())
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub(crate) struct MongoHeartbeat {
        #[serde(rename = "_id")]
        pub(crate) id: String,
        pub(crate) entity: String,
        pub(crate) project: String,
        pub(crate) language: String,
        pub(crate) branch: String,
        pub(crate) os: String,
        pub(crate) editor: String,
        pub(crate) time: i64,
        pub(crate) machine_name: Option<String>,
    }

    impl From<Heartbeat> for MongoHeartbeat {
        fn from(h: Heartbeat) -> Self {
            MongoHeartbeat {
                id: h.id,
                entity: h.entity,
                project: h.project,
                language: h.language,
                branch: h.branch,
                os: h.os,
                editor: h.editor,
                time: h.time,
                machine_name: h.machine_name,
            }
        }
    }

    impl From<MongoHeartbeat> for Heartbeat {
        fn from(h: MongoHeartbeat) -> Self {
            Heartbeat {
                id: h.id,
                entity: h.entity,
                project: h.project,
                language: h.language,
                branch: h.branch,
                os: h.os,
                editor: h.editor,
                time: h.time,
                machine_name: h.machine_name,
            }
        }
    }
}

pub mod memory {
    use super::*;
    use crate::date::Zone;
    use anyhow::Context as _;
    use std::collections::BTreeMap;
    use tokio::sync::RwLock;

    /// Keeps everything in process memory. Heartbeats with equal `time` stay in insertion order.
    #[derive(Debug, Default)]
    pub struct MemoryDb {
        days: RwLock<BTreeMap<NaiveDate, Vec<Heartbeat>>>,
        zone: Zone,
    }

    impl MemoryDb {
        pub fn new(zone: Zone) -> Self {
            Self {
                days: RwLock::new(BTreeMap::new()),
                zone,
            }
        }

        pub async fn len(&self) -> usize {
            self.days.read().await.values().map(Vec::len).sum()
        }
    }

    #[async_trait]
    impl HeartbeatRepository for MemoryDb {
        async fn insert(&self, heartbeat: Heartbeat) -> Result<()> {
            let date = self
                .zone
                .date_of(heartbeat.time)
                .with_context(|| format!("time {} is out of range", heartbeat.time))?;

            let mut days = self.days.write().await;
            let day = days.entry(date).or_default();
            let at = day.partition_point(|h| h.time <= heartbeat.time);
            day.insert(at, heartbeat);

            Ok(())
        }

        async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Heartbeat>> {
            Ok(self
                .days
                .read()
                .await
                .get(&date)
                .cloned()
                .unwrap_or_default())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::aggregate::tests::heartbeat;

        fn utc() -> Zone {
            Zone::Named(chrono_tz::UTC)
        }

        #[tokio::test]
        async fn partitions_by_date_in_time_order() {
            let db = MemoryDb::new(utc());
            // 2022-08-08T00:00:00Z
            let day = 1_659_916_800_000;

            db.insert(heartbeat(day + 5000, "b")).await.unwrap();
            db.insert(heartbeat(day - 1, "z")).await.unwrap();
            db.insert(heartbeat(day, "a")).await.unwrap();

            let date = NaiveDate::from_ymd_opt(2022, 8, 8).unwrap();
            let times: Vec<_> = db
                .list_by_date(date)
                .await
                .unwrap()
                .iter()
                .map(|h| h.time)
                .collect();
            assert_eq!(times, vec![day, day + 5000]);

            let before = db.list_by_date(date.pred_opt().unwrap()).await.unwrap();
            assert_eq!(before.len(), 1);
            assert_eq!(db.len().await, 3);
        }

        #[tokio::test]
        async fn equal_times_keep_insertion_order() {
            let db = MemoryDb::new(utc());
            db.insert_many(vec![
                heartbeat(10, "a"),
                heartbeat(10, "b"),
                heartbeat(5, "c"),
            ])
            .await
            .unwrap();

            let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
            let projects: Vec<_> = db
                .list_by_date(date)
                .await
                .unwrap()
                .into_iter()
                .map(|h| h.project)
                .collect();
            assert_eq!(projects, vec!["project-c", "project-a", "project-b"]);
        }

        #[tokio::test]
        async fn empty_day_is_empty() {
            let db = MemoryDb::new(utc());
            let date = NaiveDate::from_ymd_opt(2022, 8, 8).unwrap();
            assert!(db.list_by_date(date).await.unwrap().is_empty());
        }
    }
}
