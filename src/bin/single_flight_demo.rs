//! Fires concurrent refreshes of one refresh token and shows that they all
//! receive the same rotation.
//!
//! Run with the in-memory backends of `settings/dev.toml`:
//! `cargo run --bin single_flight_demo -- --settings settings/dev.toml`

use clap::Parser;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokenwarden::application_port::TokenLifecycle;
use tokenwarden::bootstrap::Services;
use tokenwarden::domain_model::Credentials;
use tokenwarden::logger::*;
use tokenwarden::settings::parse_settings;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    settings: Option<String>,
    #[arg(long, default_value_t = 16)]
    callers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let logger = Logger::new_bootstrap();
    let settings = parse_settings(args.settings.as_deref())?;
    logger.reload_from_config(&LogConfig::from(&settings.log))?;

    let seed = settings
        .seed_users
        .first()
        .ok_or_else(|| anyhow::anyhow!("the demo needs at least one [[seed_users]] entry"))?;
    let services = Services::try_new(&settings).await?;
    let guard = services.guard.clone();

    let issued = guard
        .issue_with_credentials(&Credentials::new(&seed.username, &seed.password))
        .await?
        .ok_or_else(|| anyhow::anyhow!("seed user was rejected"))?;
    let old = issued.refresh_token.token;
    info!(callers = args.callers, "refreshing one token concurrently");

    let tasks = (0..args.callers).map(|_| {
        let guard = Arc::clone(&guard);
        let old = old.clone();
        tokio::spawn(async move { guard.refresh(&old).await })
    });
    let mut rotated = HashSet::new();
    for joined in join_all(tasks).await {
        rotated.insert(joined??.refresh_token.token);
    }
    info!(distinct = rotated.len(), "refresh results");

    let still_there = services.store.find(&old).await?.is_some();
    info!(still_there, "old token right after rotation");

    let leeway = Duration::from_secs(settings.refresh.deletion_leeway_secs);
    tokio::time::sleep(leeway + Duration::from_millis(200)).await;
    let still_there = services.store.find(&old).await?.is_some();
    info!(still_there, "old token after the deletion leeway");

    services.shutdown().await;
    Ok(())
}
