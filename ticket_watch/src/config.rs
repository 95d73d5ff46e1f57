//! Watcher configuration: parsing, defaults, and validation.
//!
//! The TOML file has five optional tables; anything omitted takes its default:
//!
//! ```toml
//! [preferences]
//! master_enabled = true
//! new_ticket_enabled = true
//! assignment_enabled = true
//! reply_enabled = true
//! realtime_mode_enabled = false
//!
//! [messages]
//! summary_title = "{count} new ticket updates"
//!
//! [store]
//! database_url = "ticket_watch.db"
//!
//! [schedule]
//! interval_secs = 60
//! deadline_secs = 25
//!
//! [source]
//! query = 'state.name:(new OR open OR "pending reminder")'
//! ```
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_config_str`]
//! - Parse + validate from a file path: [`load_config_path`]
//!
//! Unknown keys are rejected so a typo in a toggle name cannot silently leave
//! a category enabled.

use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// Ticket search used when the config does not override it: every non-closed state.
pub const DEFAULT_QUERY: &str = r#"state.name:(new OR open OR "pending reminder")"#;

/// The scheduler never polls more often than this.
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Longest accepted poll interval (one week).
pub const MAX_INTERVAL_SECS: u64 = 604_800;

/// Longest accepted cycle deadline (one day).
pub const MAX_DEADLINE_SECS: u64 = 86_400;

/// User toggles for the polling notifier. Read-only to the diff engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct NotificationPreferences {
    /// Off behaves like all three categories off; the snapshot still advances.
    pub master_enabled: bool,
    /// Notify about tickets not seen in the previous snapshot.
    pub new_ticket_enabled: bool,
    /// Notify when a ticket becomes owned by the current agent.
    pub assignment_enabled: bool,
    /// Notify when an owned ticket's `updated_at` advances.
    pub reply_enabled: bool,
    /// A push channel is active; polling must not run at all.
    pub realtime_mode_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            master_enabled: true,
            new_ticket_enabled: true,
            assignment_enabled: true,
            reply_enabled: true,
            realtime_mode_enabled: false,
        }
    }
}

impl NotificationPreferences {
    pub fn new_tickets(&self) -> bool {
        self.master_enabled && self.new_ticket_enabled
    }

    pub fn assignments(&self) -> bool {
        self.master_enabled && self.assignment_enabled
    }

    pub fn replies(&self) -> bool {
        self.master_enabled && self.reply_enabled
    }
}

/// Notification text templates.
///
/// Placeholders: `{number}` and `{title}` for per-ticket templates, `{count}`
/// for the summary title.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Messages {
    pub new_ticket_title: String,
    pub new_ticket_body: String,
    pub assignment_title: String,
    pub assignment_body: String,
    pub reply_title: String,
    pub reply_body: String,
    /// Title of the collapsed notification when a cycle yields several events.
    pub summary_title: String,
    /// One line of the collapsed notification body, per event.
    pub summary_line: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            new_ticket_title: "New ticket".into(),
            new_ticket_body: "Ticket #{number} was created: {title}".into(),
            assignment_title: "Ticket assigned to you".into(),
            assignment_body: "Ticket #{number} is now assigned to you: {title}".into(),
            reply_title: "New reply".into(),
            reply_body: "Ticket #{number} has a new reply: {title}".into(),
            summary_title: "{count} new ticket updates".into(),
            summary_line: "#{number} {title}".into(),
        }
    }
}

impl Messages {
    fn templates(&self) -> [(&'static str, &str); 8] {
        [
            ("new_ticket_title", self.new_ticket_title.as_str()),
            ("new_ticket_body", self.new_ticket_body.as_str()),
            ("assignment_title", self.assignment_title.as_str()),
            ("assignment_body", self.assignment_body.as_str()),
            ("reply_title", self.reply_title.as_str()),
            ("reply_body", self.reply_body.as_str()),
            ("summary_title", self.summary_title.as_str()),
            ("summary_line", self.summary_line.as_str()),
        ]
    }
}

/// Substitute `{number}`, `{title}` and `{count}` in a template.
pub fn fill(template: &str, number: &str, title: &str, count: usize) -> String {
    template
        .replace("{number}", number)
        .replace("{title}", title)
        .replace("{count}", &count.to_string())
}

/// Where the snapshot set lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreCfg {
    /// SQLite path or `sqlite:` URL.
    pub database_url: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            database_url: "ticket_watch.db".into(),
        }
    }
}

/// Polling cadence and per-cycle execution budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScheduleCfg {
    /// Seconds between cycle starts.
    pub interval_secs: u64,
    /// Wall-clock budget for one cycle; overrunning aborts it without saving.
    pub deadline_secs: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            interval_secs: MIN_INTERVAL_SECS,
            deadline_secs: 25,
        }
    }
}

impl ScheduleCfg {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// What to ask the ticket source for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SourceCfg {
    pub query: String,
}

impl Default for SourceCfg {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.into(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct WatchConfig {
    pub preferences: NotificationPreferences,
    pub messages: Messages,
    pub store: StoreCfg,
    pub schedule: ScheduleCfg,
    pub source: SourceCfg,
}

/// Check cross-field constraints serde cannot express.
///
/// Errors:
/// - any message template blank after trimming
/// - `interval_secs` below [`MIN_INTERVAL_SECS`] or above [`MAX_INTERVAL_SECS`]
/// - `deadline_secs` zero, above [`MAX_DEADLINE_SECS`], or not shorter than the interval
/// - blank `source.query` or `store.database_url`
pub fn validate_config(cfg: &WatchConfig) -> anyhow::Result<()> {
    for (name, tpl) in cfg.messages.templates() {
        if tpl.trim().is_empty() {
            bail!("messages.{name} cannot be empty");
        }
    }
    let s = cfg.schedule;
    if s.interval_secs < MIN_INTERVAL_SECS {
        bail!(
            "schedule.interval_secs must be at least {MIN_INTERVAL_SECS}, got {}",
            s.interval_secs
        );
    }
    if s.interval_secs > MAX_INTERVAL_SECS {
        bail!(
            "schedule.interval_secs must be at most {MAX_INTERVAL_SECS}, got {}",
            s.interval_secs
        );
    }
    if s.deadline_secs == 0 {
        bail!("schedule.deadline_secs must be greater than zero");
    }
    if s.deadline_secs > MAX_DEADLINE_SECS {
        bail!(
            "schedule.deadline_secs must be at most {MAX_DEADLINE_SECS}, got {}",
            s.deadline_secs
        );
    }
    if s.deadline_secs >= s.interval_secs {
        bail!(
            "schedule.deadline_secs ({}) must be shorter than schedule.interval_secs ({})",
            s.deadline_secs,
            s.interval_secs
        );
    }
    if cfg.source.query.trim().is_empty() {
        bail!("source.query cannot be empty");
    }
    if cfg.store.database_url.trim().is_empty() {
        bail!("store.database_url cannot be empty");
    }
    Ok(())
}

/// Parse and validate a config from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<WatchConfig> {
    let cfg: WatchConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
    validate_config(&cfg).context("invalid config")?;
    Ok(cfg)
}

/// Read a config TOML file from disk, parse, and validate it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<WatchConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}
