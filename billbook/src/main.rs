// Billbook - headless invoicing engine
// Entry point: loads the data directory, runs maintenance and keeps sync alive

use anyhow::Context;
use billbook::config::MAINTENANCE_CRON;
use billbook::engine::format_currency;
use billbook::services::SchedulerService;
use billbook::{AppContext, EngineOptions};
use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billbook=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Billbook {}", env!("CARGO_PKG_VERSION"));

    let options = EngineOptions::from_env();
    let ctx = AppContext::setup(options)
        .await
        .context("failed to initialize engine")?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("export") => {
            let today = Local::now().date_naive();
            let (name, json) = ctx.export(today)?;
            let target = args.next().unwrap_or(name);
            tokio::fs::write(&target, json)
                .await
                .with_context(|| format!("failed to write {}", target))?;
            tracing::info!("Exported to {}", target);
        }
        Some("import") => {
            let source = args.next().context("usage: billbook import <file>")?;
            let json = tokio::fs::read_to_string(&source)
                .await
                .with_context(|| format!("failed to read {}", source))?;
            ctx.import(&json)?;
            tracing::info!("Imported {}", source);
        }
        Some("connect") => {
            let token = args.next().context("usage: billbook connect <token> <container>")?;
            let container = args.next().context("usage: billbook connect <token> <container>")?;
            ctx.sync().connect(&token, &container).await?;
        }
        Some("disconnect") => ctx.sync().disconnect().await?,
        Some(other) if other != "run" => anyhow::bail!("unknown command: {}", other),
        _ => run(&ctx).await?,
    }

    ctx.sync().flush().await;
    Ok(())
}

/// Stay up, running daily maintenance until interrupted
async fn run(ctx: &AppContext) -> anyhow::Result<()> {
    let stats = ctx.refresh_dashboard(Local::now().date_naive())?;
    let currency = ctx.settings.get_settings().currency;
    tracing::info!(
        "{} open, {} overdue, outstanding {}",
        stats.sent_invoices + stats.overdue_invoices,
        stats.overdue_invoices,
        format_currency(stats.outstanding, &currency)
    );

    let scheduler = SchedulerService::new(ctx.maintenance()).await?;
    scheduler.schedule_maintenance(MAINTENANCE_CRON).await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    scheduler.shutdown().await?;
    Ok(())
}
