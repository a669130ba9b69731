//! Server configuration.
//!
//! DESIGN
//! ======
//! The config is a JSON file deserialized straight into a struct; serde
//! supplies defaults for optional keys and `deny_unknown_fields` rejects
//! anything unrecognized, so a typoed key fails loudly at startup instead
//! of silently falling back to a default. A `validate()` pass checks the
//! constraints serde cannot express.
//!
//! Config load failure is the only fatal error in the process.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Log verbosity. `fatal` clamps to `error`; tracing has no fatal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error | Self::Fatal => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Log verbosity for the whole process.
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// TCP port the HTTP/WS listener binds to.
    pub port: u16,

    /// Minimum spacing between two successful paints per uid, in ms.
    pub paint_delay: u64,

    /// Whether board and token state is persisted to SQLite.
    #[serde(default, rename = "useDB")]
    pub use_db: bool,

    /// Board width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Board height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Skip loading the stored board and start gray.
    #[serde(default)]
    pub clear_board: bool,

    /// Exact paste content a user must publish to prove uid ownership.
    #[serde(default = "default_validation_paste")]
    pub validation_paste: String,

    /// TLS private key path. Termination is expected at a fronting proxy;
    /// both paths are validated as a pair for config compatibility.
    #[serde(default)]
    pub key: Option<String>,

    /// TLS certificate path.
    #[serde(default)]
    pub cert: Option<String>,

    /// Max simultaneous WebSocket connections per IP. 0 = unlimited.
    #[serde(default, rename = "maxWebSocketPerIP")]
    pub max_web_socket_per_ip: u32,

    /// Duration of a policy IP ban, in ms.
    #[serde(default = "default_ban_duration")]
    pub ban_duration: u64,

    /// Broadcast tick frequency in Hz.
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u32,

    /// Max inbound packets per connection per one-second window.
    #[serde(default = "default_max_packet_per_second")]
    pub max_packet_per_second: u32,

    /// Track distinct tokens seen per connection (diagnostic).
    #[serde(default)]
    pub enable_token_counting: bool,

    /// Reject token issuance for uids above this value.
    #[serde(default, rename = "maxAllowedUID")]
    pub max_allowed_uid: Option<u32>,

    /// Shared secret for the /api/root endpoints. Unset disables them.
    #[serde(default)]
    pub ban_token: Option<String>,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_width() -> u32 {
    1000
}

fn default_height() -> u32 {
    600
}

fn default_validation_paste() -> String {
    "IkaPaintBoard".to_string()
}

fn default_ban_duration() -> u64 {
    60_000
}

fn default_ticks_per_second() -> u32 {
    128
}

fn default_max_packet_per_second() -> u32 {
    128
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Parse configuration from a JSON string.
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(contents).context("failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.width >= 1, "width must be >= 1");
        anyhow::ensure!(self.height >= 1, "height must be >= 1");
        anyhow::ensure!(self.ticks_per_second >= 1, "ticksPerSecond must be >= 1");
        anyhow::ensure!(self.max_packet_per_second >= 1, "maxPacketPerSecond must be >= 1");
        anyhow::ensure!(
            self.key.is_some() == self.cert.is_some(),
            "key and cert must be set together"
        );
        Ok(())
    }

    /// Duration of one broadcast tick in milliseconds.
    #[must_use]
    pub fn tick_ms(&self) -> u64 {
        1000 / u64::from(self.ticks_per_second)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
