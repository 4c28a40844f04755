use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Data directory holding the task store - computed from home, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,

    /// Legacy flat forwarding settings. When present and no task file exists,
    /// a single default task is synthesized from this section at startup.
    #[serde(default)]
    pub forwarding: Option<LegacyForwardingConfig>,
}

// ── Telegram transport ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Overridable via `TELEGRAM_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: String,
    /// Long-poll timeout for getUpdates, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    30
}

// ── Task store ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the persisted task list. Defaults to
    /// `<data_dir>/steering_tasks.json`.
    #[serde(default)]
    pub tasks_file: Option<PathBuf>,
}

// ── Delivery pacing ──────────────────────────────────────────────

/// Pacing knobs for the delivery executor. The text/media multipliers scale
/// the per-task `forward_delay` after a successful send; the flood-wait cap
/// bounds how long a server-instructed wait may sleep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_text_multiplier")]
    pub text_multiplier: f64,
    #[serde(default = "default_media_multiplier")]
    pub media_multiplier: f64,
    /// Floor on the scaled text delay, in seconds.
    #[serde(default = "default_min_text_delay")]
    pub min_text_delay_secs: f64,
    #[serde(default = "default_flood_wait_cap")]
    pub flood_wait_cap_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            text_multiplier: default_text_multiplier(),
            media_multiplier: default_media_multiplier(),
            min_text_delay_secs: default_min_text_delay(),
            flood_wait_cap_secs: default_flood_wait_cap(),
        }
    }
}

fn default_text_multiplier() -> f64 {
    0.3
}

fn default_media_multiplier() -> f64 {
    1.5
}

fn default_min_text_delay() -> f64 {
    0.1
}

fn default_flood_wait_cap() -> u64 {
    60
}

// ── Reliability ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Bound on chat-access validation during task start, in seconds.
    #[serde(default = "default_validation_timeout")]
    pub validation_timeout_secs: u64,
    /// Settle delay between stop and start during restart, in milliseconds.
    #[serde(default = "default_restart_settle")]
    pub restart_settle_ms: u64,
    /// Minimum interval between sends for one task, in milliseconds.
    #[serde(default = "default_send_interval")]
    pub min_send_interval_ms: u64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            validation_timeout_secs: default_validation_timeout(),
            restart_settle_ms: default_restart_settle(),
            min_send_interval_ms: default_send_interval(),
        }
    }
}

fn default_validation_timeout() -> u64 {
    20
}

fn default_restart_settle() -> u64 {
    500
}

fn default_send_interval() -> u64 {
    1000
}

// ── Legacy flat forwarding section ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyForwardingConfig {
    #[serde(default)]
    pub source_chat: String,
    #[serde(default)]
    pub target_chat: String,
    #[serde(default = "default_forward_delay")]
    pub forward_delay: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_forward_mode")]
    pub forward_mode: String,
}

fn default_forward_delay() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_forward_mode() -> String {
    "copy".to_string()
}

// ── Loading / saving ─────────────────────────────────────────────

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let data_dir = home.join(".steerbot");
        let config_path = data_dir.join("config.toml");

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).context("Failed to create .steerbot directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            let toml_str =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            fs::write(&config_path, toml_str).context("Failed to write config file")?;
            config
        };

        // Set computed paths that are skipped during serialization
        config.config_path = config_path;
        config.data_dir = data_dir;

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN")
            && !token.trim().is_empty()
        {
            config.telegram.bot_token = token.trim().to_string();
        }

        Ok(config)
    }

    /// Resolved path of the persisted task list.
    pub fn tasks_file(&self) -> PathBuf {
        self.store
            .tasks_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("steering_tasks.json"))
    }
}
