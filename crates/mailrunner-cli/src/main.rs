mod cli;
mod mailer;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use mailrunner_core::app::{ReaperLoop, WorkerPool};
use mailrunner_core::domain::{Email, WorkerEvent};
use mailrunner_core::impls::{ChannelEventSink, InMemoryEmailStore};
use mailrunner_core::ports::{EmailStore, SystemClock, SystemIdGenerator};

use crate::cli::Cli;
use crate::mailer::LogMailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.pool_config();
    config.validate()?;
    tracing::info!(store = %config.store.target(), database = %config.store.database, "running worker");

    // (A) store を用意（永続化エンジンは外部。ここでは in-memory）
    let store = Arc::new(InMemoryEmailStore::new(&config.store));
    seed(&store, &cli).await?;

    // (B) orphaned lease を拾う購読者
    let events = ChannelEventSink::new(256);
    let reconciliation = tokio::spawn(report_orphaned_leases(events.subscribe()));

    // (C) pool と lease sweep を起動
    let ids = SystemIdGenerator::new(SystemClock);
    let mut pool = WorkerPool::start(
        &config,
        store.clone(),
        Arc::new(LogMailer),
        Arc::new(events),
        &ids,
    )?;
    let reaper = tokio::spawn(
        ReaperLoop::from_config(store.clone(), &config)
            .run(pool.shutdown_signal())
            .instrument(tracing::info_span!("reaper")),
    );

    // (D) signal を待って drain
    wait_for_termination().await?;
    pool.stop().await;
    reaper.await.context("lease sweep task failed")?;
    // worker が全員抜けると sink の sender が消えて購読側も終わる
    reconciliation
        .await
        .context("reconciliation task failed")?;

    let counts = store.counts().await?;
    tracing::info!(
        pending = counts.pending,
        leased = counts.leased,
        delivered = counts.delivered,
        failed = counts.failed,
        "done"
    );
    Ok(())
}

async fn seed(store: &InMemoryEmailStore, cli: &Cli) -> anyhow::Result<()> {
    if let Some(path) = &cli.seed_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let emails: Vec<Email> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        for email in emails {
            store.insert(email).await?;
        }
    }
    for n in 0..cli.seed {
        let email = Email::new("demo@mailrunner.dev", format!("demo #{n}"), "hello from mailrunner")
            .to(format!("user{n}@example.com"));
        store.insert(email).await?;
    }

    let pending = store.counts().await?.pending;
    if pending > 0 {
        tracing::info!(pending, namespace = store.namespace(), "seeded store");
    }
    Ok(())
}

async fn report_orphaned_leases(mut rx: broadcast::Receiver<WorkerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) if event.requires_reconciliation() => {
                let payload = serde_json::to_string(&event).unwrap_or_else(|_| format!("{event:?}"));
                tracing::error!(event = %payload, "reconciliation required");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("event subscriber lagged, skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn wait_for_termination() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("installing Ctrl-C handler")?;
        tracing::info!("Received Ctrl-C, initiating graceful shutdown");
    }
    Ok(())
}
