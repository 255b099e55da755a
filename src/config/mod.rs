//! Configuration management for Voice Bridge
//!
//! Layers, lowest to highest: built-in defaults, the TOML config file, then
//! environment variables. Command-line flags are applied by the binary.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::capability::PlatformSignature;
use crate::conversation::{ConversationSettings, DEFAULT_WS_URL};
use crate::speech::PlaybackSettings;
use crate::{Error, Result};

use self::file::ConfigFile;

/// Default OpenAI-compatible API base for the native speech adapters
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Voice Bridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportConfig,
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
    pub platform: PlatformSignature,
}

/// Agent connection
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ws_url: String,
}

/// Conversation speech behaviour
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub language: String,
    pub voice_enabled: bool,
    pub playback: PlaybackSettings,
}

/// Speech service used by the native microphone and speaker adapters
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub stt_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f64,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if `VOICE_BRIDGE_CONFIG` names a file that cannot be
    /// loaded, or a value fails validation
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("VOICE_BRIDGE_CONFIG").ok().map(PathBuf::from);
        let fc = file::load_config_file(explicit.as_deref())?;
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value fails validation
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let transport = TransportConfig {
            ws_url: env("VOICE_BRIDGE_WS_URL")
                .or(fc.transport.ws_url)
                .unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
        };

        let defaults = PlaybackSettings::default();
        let language = env("VOICE_BRIDGE_LANGUAGE")
            .or(fc.speech.language)
            .unwrap_or_else(|| defaults.language.clone());
        let voice_enabled = env("VOICE_BRIDGE_VOICE_ENABLED")
            .map(|v| v == "true" || v == "1")
            .or(fc.speech.voice_enabled)
            .unwrap_or(true);

        let speech = SpeechConfig {
            playback: PlaybackSettings {
                language: language.clone(),
                debounce: fc
                    .speech
                    .debounce_ms
                    .map_or(defaults.debounce, Duration::from_millis),
                stall_interval: fc
                    .speech
                    .resume_interval_ms
                    .map_or(defaults.stall_interval, Duration::from_millis),
                rate: fc.speech.rate.unwrap_or(defaults.rate),
                pitch: fc.speech.pitch.unwrap_or(defaults.pitch),
                preferred_voices: fc
                    .speech
                    .preferred_voices
                    .unwrap_or(defaults.preferred_voices),
            },
            language,
            voice_enabled,
        };

        let audio = AudioConfig {
            api_base: env("VOICE_BRIDGE_API_BASE")
                .or(fc.audio.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: env("OPENAI_API_KEY").or(fc.audio.api_key),
            stt_model: env("VOICE_BRIDGE_STT_MODEL")
                .or(fc.audio.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("VOICE_BRIDGE_TTS_MODEL")
                .or(fc.audio.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env("VOICE_BRIDGE_TTS_VOICE")
                .or(fc.audio.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.audio.tts_speed.unwrap_or(1.0),
        };

        let platform = PlatformSignature {
            user_agent: env("VOICE_BRIDGE_USER_AGENT")
                .or(fc.platform.user_agent)
                .unwrap_or_default(),
            platform: fc
                .platform
                .platform
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            max_touch_points: fc.platform.max_touch_points.unwrap_or(0),
        };

        let config = Self {
            transport,
            speech,
            audio,
            platform,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.transport.ws_url)
            .map_err(|e| Error::Config(format!("invalid ws_url {}: {e}", self.transport.ws_url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "ws_url must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }

        if self.speech.language.trim().is_empty() {
            return Err(Error::Config("language must not be empty".to_string()));
        }

        let playback = &self.speech.playback;
        if !(0.1..=10.0).contains(&playback.rate) || !(0.0..=2.0).contains(&playback.pitch) {
            return Err(Error::Config(format!(
                "rate must be within 0.1..=10 and pitch within 0..=2 (got {} / {})",
                playback.rate, playback.pitch
            )));
        }
        if playback.stall_interval.is_zero() {
            return Err(Error::Config(
                "resume_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings for the conversation coordinator
    #[must_use]
    pub fn conversation_settings(&self) -> ConversationSettings {
        ConversationSettings {
            ws_url: self.transport.ws_url.clone(),
            language: self.speech.language.clone(),
            voice_enabled: self.speech.voice_enabled,
            playback: self.speech.playback.clone(),
        }
    }

    /// API key for the native speech adapters, if one is configured
    #[must_use]
    pub fn speech_api_key(&self) -> Option<&str> {
        self.audio
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
