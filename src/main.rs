use anyhow::Context as _;
use std::sync::Arc;

use waka::config::Config;
use waka::db::mongo::MongoDb;
use waka::{api, HeartbeatService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let use_ansi = std::env::var("NO_COLOR").is_err();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(use_ansi)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let key = format!("Basic {}", base64::encode(config.key.as_bytes()));
    let key: &'static str = Box::leak(key.into_boxed_str());

    let settings = Arc::new(config.settings);
    let db = MongoDb::new(&config.mongodb_uri, settings.zone())
        .await
        .context("failed to get mongodb instance")?;

    let service = Arc::new(HeartbeatService::new(db, settings.clone()));
    let route = api::routes(service, key);

    tracing::info!(
        "listening on {}, timeout {}s, zone {:?}",
        config.bind_addr,
        settings.timeout(),
        settings.zone()
    );
    warp::serve(route).bind(config.bind_addr).await;

    Ok(())
}
