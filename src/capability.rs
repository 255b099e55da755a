//! Platform capability detection
//!
//! Runs once at startup and produces an immutable [`Capabilities`]
//! descriptor that is handed to the coordinator.

/// Identifying details of the platform hosting the speech capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSignature {
    /// User agent string (empty for native hosts)
    pub user_agent: String,

    /// Platform identifier (e.g. "MacIntel", "Linux x86_64")
    pub platform: String,

    /// Maximum simultaneous touch points reported by the device
    pub max_touch_points: u32,
}

impl PlatformSignature {
    /// Whether speech synthesis must first be triggered from a user gesture
    ///
    /// True for iOS and iPadOS. iPadOS reports a desktop `MacIntel` platform,
    /// so it is recognised by its touch support instead.
    #[must_use]
    pub fn requires_gesture(&self) -> bool {
        let ios_agent = ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|device| self.user_agent.contains(device));
        ios_agent || (self.platform == "MacIntel" && self.max_touch_points > 1)
    }
}

/// What the host platform can do, detected once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    stt: bool,
    tts: bool,
    requires_gesture: bool,
}

impl Capabilities {
    /// Create a descriptor from explicit flags
    #[must_use]
    pub const fn new(stt: bool, tts: bool, requires_gesture: bool) -> Self {
        Self {
            stt,
            tts,
            requires_gesture,
        }
    }

    /// Detect capabilities from the platform signature and detected support
    #[must_use]
    pub fn detect(signature: &PlatformSignature, stt: bool, tts: bool) -> Self {
        let capabilities = Self::new(stt, tts, tts && signature.requires_gesture());

        tracing::debug!(
            stt = capabilities.stt,
            tts = capabilities.tts,
            requires_gesture = capabilities.requires_gesture,
            "platform capabilities detected"
        );

        capabilities
    }

    /// Speech recognition is available
    #[must_use]
    pub const fn stt(&self) -> bool {
        self.stt
    }

    /// Speech synthesis is available
    #[must_use]
    pub const fn tts(&self) -> bool {
        self.tts
    }

    /// First playback must happen inside a user gesture
    #[must_use]
    pub const fn requires_gesture(&self) -> bool {
        self.requires_gesture
    }

    /// Either speech direction is available
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.stt || self.tts
    }
}
