//! Configuration parsing for the signal relay.
//!
//! All services read their settings from a single JSON config file. The
//! top-level structure contains logging metadata, the intake mode, webhook /
//! control / mailbox listeners, and an `exchanges` array where each entry
//! describes one exchange account.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "level": "info", "dir": "/var/log/tradex", "module_name": "tradex" },
//!   "mode": "both",
//!   "webhook": { "host": "0.0.0.0", "port": 5005, "pin": "4821" },
//!   "control": { "enabled": true, "host": "127.0.0.1", "port": 5000 },
//!   "mailbox": {
//!     "host": "imap.example.com", "port": 993,
//!     "username": "alerts@example.com", "password": "app-password",
//!     "security": "tls", "poll_interval_secs": 15
//!   },
//!   "exchanges": [
//!     { "exchange": "binance", "api_key": "...", "api_secret": "...", "demo": true },
//!     { "exchange": "bybit", "api_key": "...", "api_secret": "..." }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ConfigurationError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Which intake channels to run.
    #[serde(default)]
    pub mode: IntakeMode,

    /// Webhook listener and PIN.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// JSON monitoring/control API listener.
    #[serde(default)]
    pub control: ControlConfig,

    /// IMAP mailbox settings (required for `email` / `both` modes).
    #[serde(default)]
    pub mailbox: Option<MailboxConfig>,

    /// Exchange accounts, one entry per exchange.
    #[serde(default)]
    pub exchanges: Vec<ConnectionConfig>,
}

impl AppConfig {
    /// Reject configurations that cannot possibly run.
    ///
    /// Missing exchange credentials are *not* an error here: such exchanges
    /// are skipped by the registry and the rest keep working.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.mode.runs_mailbox() {
            let Some(mailbox) = &self.mailbox else {
                return Err(ConfigurationError::Invalid(format!(
                    "mode '{}' requires a mailbox section",
                    self.mode
                )));
            };
            if mailbox.poll_interval_secs == 0 {
                return Err(ConfigurationError::Invalid(
                    "mailbox.poll_interval_secs must be > 0".into(),
                ));
            }
            if mailbox.host.trim().is_empty() {
                return Err(ConfigurationError::Invalid("mailbox.host is empty".into()));
            }
        }

        let mut seen = HashSet::new();
        for conn in &self.exchanges {
            let name = conn.name();
            if name.is_empty() {
                return Err(ConfigurationError::Invalid("exchange name is empty".into()));
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigurationError::Invalid(format!(
                    "exchange '{name}' configured more than once"
                )));
            }
        }
        Ok(())
    }

    /// The configured PIN, if any. An empty string means "no PIN".
    pub fn pin(&self) -> Option<&str> {
        self.webhook.pin.as_deref().filter(|p| !p.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging block.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default level if `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotating log files (console only if absent).
    #[serde(default)]
    pub dir: Option<String>,

    /// Log file prefix.
    #[serde(default = "default_module_name")]
    pub module_name: String,

    /// Write log files as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            module_name: default_module_name(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Intake mode
// ---------------------------------------------------------------------------

/// Which signal intake channels are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeMode {
    Webhook,
    Email,
    #[default]
    Both,
}

impl IntakeMode {
    pub fn runs_webhook(self) -> bool {
        matches!(self, Self::Webhook | Self::Both)
    }

    pub fn runs_mailbox(self) -> bool {
        matches!(self, Self::Email | Self::Both)
    }
}

impl std::fmt::Display for IntakeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook => write!(f, "webhook"),
            Self::Email => write!(f, "email"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for IntakeMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "webhook" => Ok(Self::Webhook),
            "email" => Ok(Self::Email),
            "both" => Ok(Self::Both),
            other => Err(ConfigurationError::Invalid(format!(
                "invalid mode '{other}': expected 'webhook', 'email' or 'both'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Webhook listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_bind_host")]
    pub host: String,

    #[serde(default = "default_webhook_port")]
    pub port: u16,

    /// Shared secret expected in the `PIN` field of every signal (webhook
    /// and mailbox). Empty or absent disables the check.
    #[serde(default)]
    pub pin: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_webhook_port(),
            pin: None,
        }
    }
}

/// Monitoring/control API listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_control_host")]
    pub host: String,

    #[serde(default = "default_control_port")]
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_control_host(),
            port: default_control_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

/// How the IMAP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailSecurity {
    /// Implicit TLS (usually port 993).
    #[default]
    Tls,
    /// Plain connect followed by `STARTTLS` (usually port 143).
    StartTls,
}

/// IMAP mailbox polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    pub host: String,

    #[serde(default = "default_imap_port")]
    pub port: u16,

    pub username: String,

    pub password: String,

    #[serde(default)]
    pub security: MailSecurity,

    /// Folder to scan for unread messages.
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Seconds between polling cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Literal prefix that marks a signal-bearing subject.
    #[serde(default = "default_marker")]
    pub marker: String,
}

// ---------------------------------------------------------------------------
// Exchange connections
// ---------------------------------------------------------------------------

/// A single exchange account entry.
///
/// Exchange modules turn this generic entry into their own typed config
/// (e.g. `BinanceConfig::from_connection`).
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Exchange identifier: `"binance"` or `"bybit"`.
    pub exchange: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    /// Binance: demo futures endpoint. Bybit: testnet.
    #[serde(default)]
    pub demo: bool,

    /// Override the REST base URL (takes precedence over `demo`).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Optional PEM-encoded Ed25519 private key path (Binance only).
    #[serde(default)]
    pub ed25519_key_path: Option<String>,

    /// `recvWindow` for signed requests (milliseconds).
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,

    /// Whole-request timeout for REST calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Client-side request spacing, honored by the exchange client.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Exchange symbol → slash form, for pairs the quote-suffix rule splits wrongly.
    #[serde(default)]
    pub symbol_aliases: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Lower-cased, trimmed exchange name used as the registry key.
    pub fn name(&self) -> String {
        self.exchange.trim().to_lowercase()
    }

    /// Returns `true` if both API key and secret are non-empty.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

/// Rate limiting pass-through settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum spacing between requests; the exchange default if absent.
    #[serde(default)]
    pub min_interval_ms: Option<u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_ms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    "info".into()
}

fn default_module_name() -> String {
    "tradex".into()
}

fn default_bind_host() -> String {
    "0.0.0.0".into()
}

fn default_control_host() -> String {
    "127.0.0.1".into()
}

fn default_webhook_port() -> u16 {
    5005
}

fn default_control_port() -> u16 {
    5000
}

fn default_imap_port() -> u16 {
    993
}

fn default_folder() -> String {
    "INBOX".into()
}

fn default_poll_interval() -> u64 {
    15
}

fn default_marker() -> String {
    "Alert:".into()
}

fn default_recv_window() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
