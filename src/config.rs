use std::str::FromStr;
use std::time::Duration;

use crate::audio::{AudioFormat, MAX_OUTBOUND_CAPACITY};
use crate::error::ConfigError;
use crate::transport::EmptyReadPolicy;

/// Runtime configuration.
///
/// Defaults are baked in at compile time from `config.toml` (see `build.rs`);
/// deployment-specific values are then overridden from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    // 网络配置
    pub ws_url: String,
    pub api_key: String,
    pub realtime_beta: String,

    // 音频配置
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_frames: usize,
    pub capture_device: String,
    pub playback_device: String,

    // 回声门限
    pub reengage_delay_ms: u64,
    pub reengage_min_percent: u8,

    // 会话
    pub outbound_capacity: usize,
    pub empty_read_policy: EmptyReadPolicy,
    pub instructions: Option<String>,
}

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

impl Config {
    /// Build the configuration from the values compiled in by `build.rs`.
    ///
    /// The API key is left empty; it never comes from `config.toml`.
    pub fn new() -> Result<Self, ConfigError> {
        let config = Self {
            ws_url: env!("WS_URL").to_string(),
            api_key: String::new(),
            realtime_beta: env!("REALTIME_BETA").to_string(),

            sample_rate: parse("SAMPLE_RATE", env!("SAMPLE_RATE"))?,
            channels: parse("CHANNELS", env!("CHANNELS"))?,
            chunk_frames: parse("CHUNK_FRAMES", env!("CHUNK_FRAMES"))?,
            capture_device: env!("CAPTURE_DEVICE").to_string(),
            playback_device: env!("PLAYBACK_DEVICE").to_string(),

            reengage_delay_ms: parse("REENGAGE_DELAY_MS", env!("REENGAGE_DELAY_MS"))?,
            reengage_min_percent: parse("REENGAGE_MIN_PERCENT", env!("REENGAGE_MIN_PERCENT"))?,

            outbound_capacity: parse("OUTBOUND_CAPACITY", env!("OUTBOUND_CAPACITY"))?,
            empty_read_policy: parse("EMPTY_READ_POLICY", env!("EMPTY_READ_POLICY"))?,
            instructions: non_empty(env!("INSTRUCTIONS")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Compiled-in defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, then re-validate.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_VAR) {
            self.api_key = key.trim().to_string();
        }
        if let Some(url) = lookup("DUPLEX_WS_URL") {
            self.ws_url = url;
        }
        if let Some(device) = lookup("DUPLEX_CAPTURE_DEVICE") {
            self.capture_device = device;
        }
        if let Some(device) = lookup("DUPLEX_PLAYBACK_DEVICE") {
            self.playback_device = device;
        }
        if let Some(delay) = lookup("DUPLEX_REENGAGE_DELAY_MS") {
            self.reengage_delay_ms = parse("DUPLEX_REENGAGE_DELAY_MS", &delay)?;
        }
        if let Some(text) = lookup("DUPLEX_INSTRUCTIONS") {
            self.instructions = non_empty(&text);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", self.sample_rate));
        }
        // 只支持单声道 16 位 PCM
        if self.channels != 1 {
            return Err(invalid("channels", self.channels));
        }
        if self.chunk_frames == 0 {
            return Err(invalid("chunk_frames", self.chunk_frames));
        }
        if self.reengage_min_percent > 100 {
            return Err(invalid("reengage_min_percent", self.reengage_min_percent));
        }
        if self.outbound_capacity == 0 || self.outbound_capacity > MAX_OUTBOUND_CAPACITY {
            return Err(invalid("outbound_capacity", self.outbound_capacity));
        }
        url::Url::parse(&self.ws_url).map_err(|_| invalid("ws_url", &self.ws_url))?;
        Ok(())
    }

    /// The binary cannot connect without a key; the library does not care.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        if self.api_key.is_empty() {
            Err(ConfigError::Missing(API_KEY_VAR))
        } else {
            Ok(&self.api_key)
        }
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            chunk_frames: self.chunk_frames,
        }
    }

    pub fn reengage_delay(&self) -> Duration {
        Duration::from_millis(self.reengage_delay_ms)
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
