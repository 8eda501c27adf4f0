use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::error::MarqueeError;
use super::label::DEFAULT_TEMPLATE;
use super::platform::{self, DEFAULT_MPD_HOST, DEFAULT_MPD_PORT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mpd: MpdConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub icons: IconConfig,
}

/// Where MPD lives.  Unset fields fall back to `MPD_HOST` / `MPD_PORT`,
/// then to `localhost:6600`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpdConfig {
    /// Hostname, `password@host`, or an absolute unix socket path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Upper bound for one request/response round trip.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Time between ticks, including the time spent polling.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Window width in code points.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Code points the window moves per tick.
    #[serde(default = "default_step")]
    pub step: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_seek_seconds")]
    pub seek_seconds: u32,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconConfig {
    #[serde(default = "default_play_icon")]
    pub play: String,
    #[serde(default = "default_pause_icon")]
    pub pause: String,
    #[serde(default = "default_stop_icon")]
    pub stop: String,
    #[serde(default = "default_repeat_icon")]
    pub repeat: String,
    #[serde(default = "default_random_icon")]
    pub random: String,
}

/// Shape of each line written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    /// One JSON object per line (`text`, `tooltip`, `class`).
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(OutputFormat::Plain),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}' (plain, json)", other)),
        }
    }
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            password: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            width: default_width(),
            step: default_step(),
            separator: default_separator(),
            template: default_template(),
            seek_seconds: default_seek_seconds(),
            format: OutputFormat::default(),
        }
    }
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            play: default_play_icon(),
            pause: default_pause_icon(),
            stop: default_stop_icon(),
            repeat: default_repeat_icon(),
            random: default_random_icon(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_interval_ms() -> u64 {
    950
}

fn default_width() -> usize {
    30
}

fn default_step() -> usize {
    1
}

fn default_separator() -> String {
    " | ".to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_seek_seconds() -> u32 {
    3
}

fn default_play_icon() -> String {
    "▶".to_string()
}

fn default_pause_icon() -> String {
    "⏸".to_string()
}

fn default_stop_icon() -> String {
    "■".to_string()
}

fn default_repeat_icon() -> String {
    " ↻".to_string()
}

fn default_random_icon() -> String {
    " ⤮".to_string()
}

impl MpdConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the address and password, consulting `MPD_HOST` and
    /// `MPD_PORT` for anything not set explicitly.
    pub fn endpoint(&self) -> MpdEndpoint {
        self.resolve_endpoint(std::env::var("MPD_HOST").ok(), std::env::var("MPD_PORT").ok())
    }

    fn resolve_endpoint(&self, env_host: Option<String>, env_port: Option<String>) -> MpdEndpoint {
        let raw_host = self.host.clone().or(env_host).filter(|h| !h.is_empty());
        let (host_password, host) = match raw_host {
            Some(raw) => match raw.split_once('@') {
                Some((pw, host)) if !pw.is_empty() && !host.is_empty() => {
                    (Some(pw.to_string()), host.to_string())
                }
                _ => (None, raw),
            },
            None => (None, DEFAULT_MPD_HOST.to_string()),
        };

        let address = if host.starts_with('/') {
            MpdAddress::Unix(PathBuf::from(host))
        } else {
            let port = self
                .port
                .or_else(|| env_port.and_then(|p| p.trim().parse().ok()))
                .unwrap_or(DEFAULT_MPD_PORT);
            MpdAddress::Tcp { host, port }
        };

        MpdEndpoint {
            address,
            password: self.password.clone().or(host_password),
        }
    }
}

impl DisplayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpdAddress {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl fmt::Display for MpdAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpdAddress::Tcp { host, port } => write!(f, "{}:{}", host, port),
            MpdAddress::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpdEndpoint {
    pub address: MpdAddress,
    pub password: Option<String>,
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load an explicitly named file.  A missing file is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Reject settings the ticker cannot run with.
    pub fn validate(&self) -> Result<(), MarqueeError> {
        if self.display.width == 0 {
            return Err(MarqueeError::InvalidConfiguration(
                "display width must be at least one code point".into(),
            ));
        }
        if self.display.interval_ms == 0 {
            return Err(MarqueeError::InvalidConfiguration(
                "update interval must be positive".into(),
            ));
        }
        if self.mpd.timeout_ms == 0 {
            return Err(MarqueeError::InvalidConfiguration(
                "mpd timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.interval_ms, 950);
        assert_eq!(config.display.width, 30);
        assert_eq!(config.display.step, 1);
        assert_eq!(config.display.separator, " | ");
        assert_eq!(config.display.template, "{title} - {artist}");
        assert_eq!(config.display.format, OutputFormat::Plain);
        assert_eq!(config.mpd.timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
        assert!(Config::config_path().ends_with("mpd-marquee/config.toml"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [display]
            width = 12
            template = "{artist}: {title}"
            format = "json"

            [mpd]
            host = "music.lan"
            "#,
        )
        .unwrap();
        assert_eq!(config.display.width, 12);
        assert_eq!(config.display.step, 1);
        assert_eq!(config.display.template, "{artist}: {title}");
        assert_eq!(config.display.format, OutputFormat::Json);
        assert_eq!(config.mpd.host.as_deref(), Some("music.lan"));
        assert_eq!(config.icons.play, "▶");
    }

    #[test]
    fn test_negative_step_is_rejected_by_parser() {
        assert!(Config::from_toml_str("[display]\nstep = -1\n").is_err());
    }

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.display.separator, " | ");
        assert!(back.mpd.host.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_width_and_interval() {
        let mut config = Config::default();
        config.display.width = 0;
        assert!(matches!(
            config.validate(),
            Err(MarqueeError::InvalidConfiguration(_))
        ));

        let mut config = Config::default();
        config.display.interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(MarqueeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_endpoint_defaults() {
        let endpoint = MpdConfig::default().resolve_endpoint(None, None);
        assert_eq!(
            endpoint.address,
            MpdAddress::Tcp {
                host: "localhost".into(),
                port: 6600
            }
        );
        assert_eq!(endpoint.password, None);
    }

    #[test]
    fn test_endpoint_from_environment() {
        let endpoint = MpdConfig::default()
            .resolve_endpoint(Some("hunter2@media.lan".into()), Some("6601".into()));
        assert_eq!(endpoint.address.to_string(), "media.lan:6601");
        assert_eq!(endpoint.password.as_deref(), Some("hunter2"));

        let endpoint = MpdConfig::default()
            .resolve_endpoint(Some("/run/mpd/socket".into()), Some("6601".into()));
        assert_eq!(endpoint.address, MpdAddress::Unix("/run/mpd/socket".into()));
    }

    #[test]
    fn test_explicit_values_beat_environment() {
        let cfg = MpdConfig {
            host: Some("box".into()),
            port: Some(7000),
            password: Some("secret".into()),
            ..MpdConfig::default()
        };
        let endpoint = cfg.resolve_endpoint(Some("pw@elsewhere".into()), Some("1".into()));
        assert_eq!(endpoint.address.to_string(), "box:7000");
        assert_eq!(endpoint.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
