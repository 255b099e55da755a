//! TOML configuration file loading
//!
//! Reads `~/.config/voice-bridge/config.toml` (or the path in
//! `VOICE_BRIDGE_CONFIG`). Every field is optional; the file is a partial
//! overlay on top of the defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level config file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub transport: TransportFileConfig,

    #[serde(default)]
    pub speech: SpeechFileConfig,

    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub platform: PlatformFileConfig,
}

/// Agent connection
#[derive(Debug, Default, Deserialize)]
pub struct TransportFileConfig {
    /// WebSocket endpoint (e.g. "wss://api.gentic.pro/ws")
    pub ws_url: Option<String>,
}

/// Conversation speech behaviour
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// BCP-47 language tag (e.g. "en-US")
    pub language: Option<String>,

    /// Voice responses automatically
    pub voice_enabled: Option<bool>,

    /// Delay between cancel and speak, in milliseconds
    pub debounce_ms: Option<u64>,

    /// Stall-recovery poll interval, in milliseconds
    pub resume_interval_ms: Option<u64>,

    pub rate: Option<f32>,
    pub pitch: Option<f32>,

    /// Voice names tried first, in order
    pub preferred_voices: Option<Vec<String>>,
}

/// Speech service backing the native adapters
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// OpenAI-compatible API base URL
    pub api_base: Option<String>,

    pub api_key: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,
}

/// Host platform signature used for gesture detection
#[derive(Debug, Default, Deserialize)]
pub struct PlatformFileConfig {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub max_touch_points: Option<u32>,
}

/// Default config file location
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-bridge").join("config.toml"))
}

/// Parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the config file, falling back to defaults
///
/// An explicit `path` that cannot be loaded is an error. A missing or broken
/// file at the default location only logs a warning.
///
/// # Errors
///
/// Returns error if an explicitly requested file cannot be loaded
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = path {
        return read_config_file(path);
    }

    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    match read_config_file(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            Ok(ConfigFile::default())
        }
    }
}
