//! Run command - scan, filter, fetch, and publish loop

use anyhow::{Context, Result, bail};
use feed_relay_adapters::{
    ledger::SqliteLedger,
    media::HttpMediaFetcher,
    notify::WebhookNotifier,
    outbox::{OutboxPublisher, OutboxWriter},
    page::{JsonPageSource, StubPageSource},
    publish::{HttpPublisher, StubPublisher},
};
use feed_relay_domain::{
    CycleReport, Credentials, PageSource, ProcessResult, Publisher, SystemClock,
    usecases::RunLoop,
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::args::RunArgs;
use crate::config::AppConfig;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let dry_run = args.dry_run || config.general.dry_run;

    tracing::info!(
        dry_run = dry_run,
        once = args.once,
        source = %config.source.location,
        publisher = %config.publish.kind,
        mode = ?config.publish.mode,
        "Starting feed-relay run"
    );

    // Build dependencies
    let ledger = Arc::new(
        SqliteLedger::new(&config.general.state_db_path)
            .await
            .context("Failed to open ledger")?,
    );
    let page_source = build_page_source(&config)?;
    let publisher = build_publisher(&config).await?;
    let media_fetcher = Arc::new(HttpMediaFetcher::new(
        config.general.scratch_dir.clone(),
        config.timing.step_timeout(),
    ));
    tracing::debug!(scratch_dir = %media_fetcher.scratch_dir().display(), "Media scratch directory");
    let notifier = Arc::new(build_notifier(&config)?);

    let mut loop_config = config.run_loop_config(dry_run)?;
    if !dry_run {
        loop_config.credentials = load_credentials(&config)?;
    }

    let run_loop = RunLoop::new(
        page_source,
        media_fetcher,
        publisher,
        ledger,
        notifier,
        Arc::new(SystemClock),
        loop_config,
    );

    if args.once {
        run_loop.init().await?;
        let report = run_loop.poll_once().await?;
        print_report(&report);
    } else {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received, stopping after this cycle");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
            }
        });

        run_loop.run(shutdown_rx).await?;
    }

    tracing::info!("feed-relay run completed");
    Ok(())
}

fn build_page_source(config: &AppConfig) -> Result<Arc<dyn PageSource>> {
    match config.source.kind.trim() {
        "json" => {
            if config.source.location.trim().is_empty() {
                bail!("source.location is not configured");
            }
            Ok(Arc::new(JsonPageSource::new(config.timing.step_timeout())))
        }
        "stub" => Ok(Arc::new(StubPageSource::empty())),
        other => bail!("Invalid source kind: {}", other),
    }
}

async fn build_publisher(config: &AppConfig) -> Result<Arc<dyn Publisher>> {
    match config.publish.kind.trim() {
        "http" => {
            if config.publish.base_url.trim().is_empty() {
                bail!("publish.base_url is not configured");
            }
            Ok(Arc::new(HttpPublisher::new(
                config.publish.base_url.clone(),
                config.publish.target.clone(),
                config.timing.step_timeout(),
            )))
        }
        "outbox" => {
            let writer = OutboxWriter::new(config.publish.outbox_path.clone())
                .await
                .context("Failed to initialize outbox writer")?;
            tracing::info!(
                outbox = %writer.path().display(),
                media_dir = %writer.media_dir().display(),
                "Writing submissions to outbox"
            );
            Ok(Arc::new(OutboxPublisher::new(writer)))
        }
        "stub" => Ok(Arc::new(StubPublisher::new(true))),
        other => bail!("Invalid publish kind: {}", other),
    }
}

fn build_notifier(config: &AppConfig) -> Result<WebhookNotifier> {
    if !config.notify.enabled {
        return Ok(WebhookNotifier::disabled());
    }

    let url = load_secret(&config.notify.webhook_url_env, "notify")?;
    Ok(WebhookNotifier::new(url, config.timing.step_timeout()))
}

fn load_credentials(config: &AppConfig) -> Result<Option<Credentials>> {
    if config.publish.kind.trim() != "http" {
        return Ok(None);
    }

    if config.publish.username.trim().is_empty() {
        bail!("publish.username is not configured");
    }

    Ok(Some(Credentials {
        username: config.publish.username.clone(),
        password: load_secret(&config.publish.password_env, "publish")?,
    }))
}

fn load_secret(env_var: &str, section: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No secret env var configured for {}", section);
    }

    let value = std::env::var(env_var)
        .with_context(|| format!("Missing env var {} for {}", env_var, section))?;

    if value.trim().is_empty() {
        bail!("Env var {} is empty for {}", env_var, section);
    }

    Ok(SecretString::new(value.into()))
}

fn print_report(report: &CycleReport) {
    println!(
        "Listed {}, new {}: {} published, {} skipped, {} deferred{}",
        report.listed,
        report.discovered,
        report.published_count(),
        report.skipped_count(),
        report.deferred_count(),
        if report.halted { " (halted)" } else { "" }
    );

    for (uri, result) in &report.outcomes {
        match result {
            ProcessResult::Published {
                title, publish_id, ..
            } => match publish_id {
                Some(id) => println!("  published  {} -> {} \"{}\"", uri, id, title),
                None => println!("  would publish  {} \"{}\"", uri, title),
            },
            ProcessResult::Skipped { reason } => println!("  skipped    {} ({})", uri, reason),
            ProcessResult::Deferred { reason } => println!("  deferred   {} ({})", uri, reason),
            ProcessResult::Failed { error } => println!("  failed     {} ({})", uri, error),
        }
    }
}
