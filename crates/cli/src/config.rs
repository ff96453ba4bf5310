//! Configuration loading and management

use anyhow::{Context, Result, bail};
use feed_relay_domain::normalize::NormalizeOptions;
use feed_relay_domain::policy::{ActiveHours, EligibilityPolicy};
use feed_relay_domain::usecases::RunLoopConfig;
use feed_relay_domain::{ListingOrder, PublishMode, TitleOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::UtcOffset;
use time::macros::format_description;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub title: TitleConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// json or stub
    #[serde(default = "default_source_kind")]
    pub kind: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub listing_order: ListingOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// First active hour (inclusive)
    #[serde(default)]
    pub active_hours_start: u8,

    /// Last active hour (exclusive); equal to start means always active
    #[serde(default)]
    pub active_hours_end: u8,

    /// Fixed offset for active hours, e.g. "-03:00"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    #[serde(default = "default_random_skip_denominator")]
    pub random_skip_denominator: u32,

    #[serde(default)]
    pub debug_override: bool,

    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConfig {
    #[serde(default = "default_true")]
    pub strip_prefix: bool,

    #[serde(default = "default_true")]
    pub cap_length: bool,

    #[serde(default)]
    pub fallback_titles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// http, outbox or stub
    #[serde(default = "default_publish_kind")]
    pub kind: String,

    #[serde(default)]
    pub mode: PublishMode,

    #[serde(default)]
    pub base_url: String,

    /// Destination submission target (community, board, channel)
    #[serde(default)]
    pub target: String,

    #[serde(default)]
    pub username: String,

    #[serde(default = "default_password_env")]
    pub password_env: String,

    #[serde(default = "default_outbox_path")]
    pub outbox_path: PathBuf,

    #[serde(default)]
    pub comment_back_link: bool,

    #[serde(default)]
    pub back_link_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_backoff_secs")]
    pub poll_backoff_secs: u64,

    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    #[serde(default = "default_video_settle_secs")]
    pub video_settle_secs: u64,

    #[serde(default = "default_post_publish_delay_secs")]
    pub post_publish_delay_secs: u64,

    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_webhook_url_env")]
    pub webhook_url_env: String,
}

// Default value functions
fn default_state_db_path() -> PathBuf {
    PathBuf::from("./relay.sqlite")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./scratch")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_source_kind() -> String {
    "json".to_string()
}

fn default_max_age_secs() -> u64 {
    180
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_random_skip_denominator() -> u32 {
    3
}

fn default_publish_kind() -> String {
    "http".to_string()
}

fn default_password_env() -> String {
    "RELAY_PASSWORD".to_string()
}

fn default_outbox_path() -> PathBuf {
    PathBuf::from("./outbox.jsonl")
}

fn default_poll_backoff_secs() -> u64 {
    15
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_video_settle_secs() -> u64 {
    30
}

fn default_post_publish_delay_secs() -> u64 {
    15
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_webhook_url_env() -> String {
    "RELAY_WEBHOOK_URL".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            scratch_dir: default_scratch_dir(),
            log_level: default_log_level(),
            dry_run: default_true(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            location: String::new(),
            listing_order: ListingOrder::default(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            active_hours_start: 0,
            active_hours_end: 0,
            utc_offset: default_utc_offset(),
            random_skip_denominator: default_random_skip_denominator(),
            debug_override: false,
            random_seed: None,
        }
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            strip_prefix: true,
            cap_length: true,
            fallback_titles: vec![],
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            kind: default_publish_kind(),
            mode: PublishMode::default(),
            base_url: String::new(),
            target: String::new(),
            username: String::new(),
            password_env: default_password_env(),
            outbox_path: default_outbox_path(),
            comment_back_link: false,
            back_link_phrases: vec![],
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_backoff_secs: default_poll_backoff_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            video_settle_secs: default_video_settle_secs(),
            post_publish_delay_secs: default_post_publish_delay_secs(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url_env: default_webhook_url_env(),
        }
    }
}

/// Parse "+HH:MM" / "-HH:MM" (or "Z"/"UTC")
pub fn parse_utc_offset(value: &str) -> Result<UtcOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }

    UtcOffset::parse(
        value,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("Invalid UTC offset: {}", value))
}

impl PolicyConfig {
    pub fn to_policy(&self) -> Result<EligibilityPolicy> {
        if self.active_hours_start > 23 || self.active_hours_end > 23 {
            bail!(
                "Active hours must be within 0..=23 (got {}..{})",
                self.active_hours_start,
                self.active_hours_end
            );
        }

        Ok(EligibilityPolicy {
            max_age_secs: self.max_age_secs,
            active_hours: ActiveHours {
                lower: self.active_hours_start,
                upper: self.active_hours_end,
            },
            utc_offset: parse_utc_offset(&self.utc_offset)?,
            random_skip_denominator: self.random_skip_denominator,
            debug_override: self.debug_override,
        })
    }
}

impl TitleConfig {
    pub fn to_options(&self) -> TitleOptions {
        TitleOptions {
            normalize: NormalizeOptions {
                strip_prefix: self.strip_prefix,
                cap_length: self.cap_length,
            },
            fallback_titles: self.fallback_titles.clone(),
        }
    }
}

impl TimingConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("FEED_RELAY")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Orchestrator settings derived from this configuration (credentials excluded)
    pub fn run_loop_config(&self, dry_run: bool) -> Result<RunLoopConfig> {
        Ok(RunLoopConfig {
            source_location: self.source.location.clone(),
            listing_order: self.source.listing_order,
            policy: self.policy.to_policy()?,
            title: self.title.to_options(),
            publish_mode: self.publish.mode,
            credentials: None,
            comment_back_link: self.publish.comment_back_link,
            back_link_phrases: self.publish.back_link_phrases.clone(),
            dry_run,
            poll_backoff: Duration::from_secs(self.timing.poll_backoff_secs),
            error_backoff: Duration::from_secs(self.timing.error_backoff_secs),
            video_settle_delay: Duration::from_secs(self.timing.video_settle_secs),
            post_publish_delay: Duration::from_secs(self.timing.post_publish_delay_secs),
            step_timeout: self.timing.step_timeout(),
            random_seed: self.policy.random_seed,
        })
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# feed-relay configuration

[general]
state_db_path = "./relay.sqlite"
scratch_dir = "./scratch"
log_level = "info"
dry_run = true

[source]
kind = "json"  # json, stub
location = "https://feed.example.com/feeds/alice"
listing_order = "newest_first"  # newest_first, oldest_first

[policy]
max_age_secs = 180
# Active window [start, end) in utc_offset; start == end means always active
active_hours_start = 0
active_hours_end = 0
utc_offset = "+00:00"
# Roughly one in N image posts is skipped; 0 disables
random_skip_denominator = 3
debug_override = false
# random_seed = 42

[title]
strip_prefix = true
cap_length = true
# fallback_titles = ["Check this out", "New post"]
fallback_titles = []

[publish]
kind = "http"  # http, outbox, stub
mode = "single"  # single, batch
base_url = "https://dest.example.com"
target = "pics"
username = "relay_bot"
password_env = "RELAY_PASSWORD"
outbox_path = "./outbox.jsonl"
comment_back_link = true
# Use {link} where the source URI goes
back_link_phrases = []

[timing]
poll_backoff_secs = 15
error_backoff_secs = 60
video_settle_secs = 30
post_publish_delay_secs = 15
step_timeout_secs = 60

[notify]
enabled = false
webhook_url_env = "RELAY_WEBHOOK_URL"
"#
        .to_string()
    }
}
