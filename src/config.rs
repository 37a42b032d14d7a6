use crate::date::Zone;
use anyhow::{anyhow, bail, Context as _, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

pub const DEFAULT_TIMEOUT: u32 = 900;
pub const DEFAULT_TIME_FORMAT: &str = "%Hh %MMm";
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 366;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Aggregation settings shared by the service and the API.
///
/// The timeout may change while the server runs; readers always see the latest value.
#[derive(Debug)]
pub struct Settings {
    timeout: AtomicU32,
    time_format: String,
    zone: Zone,
    max_range_days: u32,
}

impl Settings {
    pub fn new(timeout: u32, time_format: impl Into<String>, zone: Zone) -> Self {
        Self {
            timeout: AtomicU32::new(timeout),
            time_format: time_format.into(),
            zone,
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }

    pub fn with_max_range_days(mut self, days: u32) -> Self {
        self.max_range_days = days;
        self
    }

    /// Longest gap between heartbeats, in seconds, still counted as work.
    pub fn timeout(&self) -> u32 {
        self.timeout.load(Ordering::Relaxed)
    }

    pub fn set_timeout(&self, secs: u32) {
        self.timeout.store(secs, Ordering::Relaxed);
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Most days a single summary may span.
    pub fn max_range_days(&self) -> u32 {
        self.max_range_days
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_TIME_FORMAT, Zone::Local)
    }
}

#[derive(Debug)]
pub struct Config {
    pub key: String,
    pub mongodb_uri: String,
    pub bind_addr: SocketAddr,
    pub settings: Settings,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Reads the process environment. Call `dotenv` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_opt)
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let key = get("KEY").context("failed to get \"KEY\" environment variable")?;
        let mongodb_uri =
            get("MONGODB_URI").context("failed to get \"MONGODB_URI\" environment variable")?;

        let bind_addr: SocketAddr = get("BIND_ADDR")
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let timeout: u32 = match get("WAKA_TIMEOUT") {
            Some(v) => v.parse().context("failed to parse WAKA_TIMEOUT")?,
            None => DEFAULT_TIMEOUT,
        };
        if timeout == 0 {
            bail!("WAKA_TIMEOUT must be positive");
        }

        let zone = match get("WAKA_TIMEZONE") {
            Some(v) => Zone::Named(
                v.parse::<chrono_tz::Tz>()
                    .map_err(|e| anyhow!("invalid WAKA_TIMEZONE \"{}\": {}", v, e))?,
            ),
            None => Zone::Local,
        };

        let time_format = get("WAKA_TIME_FORMAT").unwrap_or_else(|| DEFAULT_TIME_FORMAT.to_owned());

        let max_range_days: u32 = match get("WAKA_MAX_RANGE_DAYS") {
            Some(v) => v.parse().context("failed to parse WAKA_MAX_RANGE_DAYS")?,
            None => DEFAULT_MAX_RANGE_DAYS,
        };
        if max_range_days == 0 {
            bail!("WAKA_MAX_RANGE_DAYS must be positive");
        }

        Ok(Self {
            key,
            mongodb_uri,
            bind_addr,
            settings: Settings::new(timeout, time_format, zone).with_max_range_days(max_range_days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn uses_defaults() {
        let config =
            Config::from_lookup(lookup(&[("KEY", "secret"), ("MONGODB_URI", "mongodb://db")]))
                .unwrap();

        assert_eq!(config.key, "secret");
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.settings.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.settings.time_format(), DEFAULT_TIME_FORMAT);
        assert_eq!(config.settings.zone(), Zone::Local);
        assert_eq!(config.settings.max_range_days(), DEFAULT_MAX_RANGE_DAYS);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("KEY", "secret"),
            ("MONGODB_URI", "mongodb://db"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("WAKA_TIMEOUT", "120"),
            ("WAKA_TIMEZONE", "Asia/Shanghai"),
            ("WAKA_TIME_FORMAT", "%HH:%MM"),
            ("WAKA_MAX_RANGE_DAYS", "31"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.settings.timeout(), 120);
        assert_eq!(config.settings.time_format(), "%HH:%MM");
        assert_eq!(config.settings.max_range_days(), 31);
        assert_eq!(
            config.settings.zone(),
            Zone::Named(chrono_tz::Asia::Shanghai)
        );
    }

    #[test]
    fn rejects_bad_values() {
        let base = [("KEY", "secret"), ("MONGODB_URI", "mongodb://db")];

        assert!(Config::from_lookup(lookup(&base[..1])).is_err());
        for bad in [
            ("WAKA_TIMEOUT", "0"),
            ("WAKA_TIMEOUT", "ten"),
            ("WAKA_TIMEZONE", "Mars/Olympus"),
            ("WAKA_MAX_RANGE_DAYS", "0"),
            ("BIND_ADDR", "nowhere"),
        ] {
            let mut pairs = base.to_vec();
            pairs.push(bad);
            assert!(Config::from_lookup(lookup(&pairs)).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn timeout_can_change() {
        let settings = Settings::default();
        settings.set_timeout(30);
        assert_eq!(settings.timeout(), 30);
    }
}
