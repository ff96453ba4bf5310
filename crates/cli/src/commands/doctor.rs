//! Doctor command - validate configuration and show status

use anyhow::Result;
use feed_relay_adapters::ledger::SqliteLedger;
use feed_relay_domain::Ledger;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    policy: CheckResult,
    ledger: CheckResult,
    scratch: CheckResult,
    source: CheckResult,
    publisher: CheckResult,
    notify: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        policy: CheckResult::error("Not checked"),
        ledger: CheckResult::error("Not checked"),
        scratch: CheckResult::error("Not checked"),
        source: CheckResult::error("Not checked"),
        publisher: CheckResult::error("Not checked"),
        notify: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.policy = check_policy(config);
        report.ledger = check_ledger(&config.general.state_db_path).await;
        report.scratch = check_scratch(&config.general.scratch_dir);
        report.source = check_source(config);
        report.publisher = check_publisher(config);
        report.notify = check_notify(config);
    }

    // Determine overall status
    let checks = [
        &report.config,
        &report.policy,
        &report.ledger,
        &report.scratch,
        &report.source,
        &report.publisher,
        &report.notify,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_policy(config: &AppConfig) -> CheckResult {
    match config.policy.to_policy() {
        Ok(policy) => CheckResult::ok(format!(
            "Max age {}s, active {:02}:00-{:02}:00 ({}), skip 1/{}{}",
            policy.max_age_secs,
            policy.active_hours.lower,
            policy.active_hours.upper,
            policy.utc_offset,
            policy.random_skip_denominator,
            if policy.debug_override {
                ", debug override ON"
            } else {
                ""
            }
        )),
        Err(e) => CheckResult::error(format!("{:#}", e)),
    }
}

async fn check_ledger(path: &Path) -> CheckResult {
    let ledger = match SqliteLedger::new(path).await {
        Ok(l) => l,
        Err(e) => return CheckResult::error(format!("Failed to open {}: {}", path.display(), e)),
    };

    match (ledger.list_posted().await, ledger.list_unposted().await) {
        (Ok(posted), Ok(unposted)) => CheckResult::ok(format!(
            "{} ({} posted, {} unposted)",
            path.display(),
            posted.len(),
            unposted.len()
        ))
        .with_details(serde_json::json!({
            "posted": posted.len(),
            "unposted": unposted.len(),
        })),
        (Err(e), _) | (_, Err(e)) => CheckResult::error(format!("Ledger query failed: {}", e)),
    }
}

fn check_scratch(dir: &Path) -> CheckResult {
    match std::fs::create_dir_all(dir) {
        Ok(()) => CheckResult::ok(format!("Scratch directory: {}", dir.display())),
        Err(e) => CheckResult::error(format!("Cannot create {}: {}", dir.display(), e)),
    }
}

fn check_source(config: &AppConfig) -> CheckResult {
    match config.source.kind.as_str() {
        "stub" => CheckResult::warn("Stub source (lists nothing)"),
        "json" => {
            let location = config.source.location.trim();
            if location.is_empty() {
                return CheckResult::error("source.location is not configured");
            }
            if !(location.starts_with("http://") || location.starts_with("https://")) {
                return CheckResult::error(format!(
                    "source.location must be an http(s) URL: {}",
                    location
                ));
            }
            CheckResult::ok(format!(
                "JSON feed: {} ({:?})",
                location, config.source.listing_order
            ))
        }
        other => CheckResult::error(format!("Unknown source kind: {}", other)),
    }
}

fn check_publisher(config: &AppConfig) -> CheckResult {
    let publish = &config.publish;
    match publish.kind.as_str() {
        "stub" => CheckResult::warn("Stub publisher (nothing leaves the process)"),
        "outbox" => CheckResult::ok(format!(
            "Outbox: {}, Mode: {:?}",
            publish.outbox_path.display(),
            publish.mode
        )),
        "http" => {
            if publish.base_url.trim().is_empty() {
                return CheckResult::error("publish.base_url is not configured");
            }
            if publish.username.trim().is_empty() {
                return CheckResult::error("publish.username is not configured");
            }
            if publish.password_env.trim().is_empty() {
                return CheckResult::error("No password env var configured");
            }

            let summary = format!(
                "{} -> {}, user {}, Mode: {:?}",
                publish.base_url, publish.target, publish.username, publish.mode
            );
            match std::env::var(&publish.password_env) {
                Ok(val) if !val.is_empty() => CheckResult::ok(format!(
                    "{}, password: {} (set)",
                    summary, publish.password_env
                )),
                _ => CheckResult::warn(format!(
                    "{}, password: {} (not set)",
                    summary, publish.password_env
                )),
            }
        }
        other => CheckResult::error(format!("Unknown publish kind: {}", other)),
    }
}

fn check_notify(config: &AppConfig) -> CheckResult {
    if !config.notify.enabled {
        return CheckResult::ok("Notifications disabled");
    }

    let env_var = &config.notify.webhook_url_env;
    if env_var.is_empty() {
        return CheckResult::error("No webhook URL env var configured");
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!("Webhook URL: {} (set)", env_var)),
        _ => CheckResult::warn(format!("Webhook URL: {} (not set)", env_var)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("feed-relay Doctor Report");
    println!("========================");
    println!();

    print_check("Config", &report.config);
    print_check("Policy", &report.policy);
    print_check("Ledger", &report.ledger);
    print_check("Scratch", &report.scratch);
    print_check("Source", &report.source);
    print_check("Publisher", &report.publisher);
    print_check("Notify", &report.notify);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: feed-relay run --dry-run --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
