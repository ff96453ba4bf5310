//! Ledger command - inspect and edit relayed items

use anyhow::{Context, Result};
use feed_relay_adapters::ledger::SqliteLedger;
use feed_relay_domain::Ledger;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::args::{LedgerArgs, LedgerCommands};
use crate::config::AppConfig;

pub async fn execute(args: LedgerArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let ledger = SqliteLedger::new(&config.general.state_db_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open ledger: {}",
                config.general.state_db_path.display()
            )
        })?;

    match args.command {
        LedgerCommands::List { unposted, json } => list(&ledger, unposted, json).await,
        LedgerCommands::Mark { uri } => mark(&ledger, &uri).await,
    }
}

async fn list(ledger: &SqliteLedger, unposted: bool, json: bool) -> Result<()> {
    let uris = if unposted {
        ledger.list_unposted().await?
    } else {
        ledger.list_posted().await?
    };

    let mut records = Vec::with_capacity(uris.len());
    for uri in &uris {
        if let Some(record) = ledger.get(uri).await? {
            records.push(record);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No {} entries", if unposted { "unposted" } else { "posted" });
        return Ok(());
    }

    for record in &records {
        let when = record.posted_at.unwrap_or(record.first_seen_at);
        println!("{}  {}", when.format(&Rfc3339)?, record.source_uri);
    }
    println!();
    println!("{} entries", records.len());

    Ok(())
}

async fn mark(ledger: &SqliteLedger, uri: &str) -> Result<()> {
    let uri = uri.trim();
    if uri.is_empty() {
        anyhow::bail!("URI must not be empty");
    }

    let already = ledger.is_posted(uri).await?;
    ledger
        .upsert_posted(uri, OffsetDateTime::now_utc())
        .await
        .context("Failed to mark entry")?;

    tracing::info!(source_uri = %uri, already_posted = already, "Marked posted");
    if already {
        println!("Already posted: {}", uri);
    } else {
        println!("Marked posted: {}", uri);
    }

    Ok(())
}
