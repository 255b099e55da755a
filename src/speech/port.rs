//! Capability interfaces for platform speech recognition and synthesis
//!
//! Implementations report asynchronous callbacks by posting
//! [`CaptureEvent`] and [`PlaybackEvent`] values to the coordinator's event
//! channel, tagged with the pass or utterance they belong to.

use std::fmt;

use crate::Result;

/// Identifies one recognition pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassId(pub u64);

/// Identifies one synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass-{}", self.0)
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance-{}", self.0)
    }
}

/// A synthesis voice offered by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Display name (e.g. "Samantha", "Microsoft Aria Online (Natural)")
    pub name: String,

    /// BCP 47 language tag (e.g. "en-US")
    pub lang: String,

    /// Synthesized on-device rather than by a remote service
    pub local_service: bool,
}

impl Voice {
    /// Create a voice description
    pub fn new(name: impl Into<String>, lang: impl Into<String>, local_service: bool) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            local_service,
        }
    }
}

/// One request handed to the synthesis capability
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    /// Token echoed back in every callback for this request
    pub id: UtteranceId,

    /// Text to voice
    pub text: String,

    /// Selected voice, `None` for the platform default
    pub voice: Option<Voice>,

    /// Language tag
    pub lang: String,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Pitch multiplier
    pub pitch: f32,

    /// Volume from 0.0 to 1.0
    pub volume: f32,
}

/// One recognized segment within a result callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSegment {
    /// Best transcription for the segment
    pub text: String,

    /// Whether the platform marked the segment complete
    pub is_final: bool,
}

impl RecognitionSegment {
    /// A completed segment
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    /// A partial segment
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// Speech recognition callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Recognition results for the whole pass so far
    Result {
        pass: PassId,
        segments: Vec<RecognitionSegment>,
    },
    /// Recognition failed
    Error { pass: PassId, reason: String },
    /// Recognition ended (end of speech or after stop)
    End { pass: PassId },
}

/// Why the platform aborted an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// Interrupted by a later request
    Interrupted,
    /// Removed from the queue by a cancel
    Canceled,
    /// Any other failure
    Other(String),
}

impl SynthesisError {
    /// Self-inflicted by cancel-before-speak, not worth surfacing
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Canceled)
    }
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => f.write_str("interrupted"),
            Self::Canceled => f.write_str("canceled"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// Speech synthesis callback or playback timer firing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Platform began voicing the utterance
    Started(UtteranceId),
    /// Platform finished voicing the utterance
    Ended(UtteranceId),
    /// Platform aborted the utterance
    Failed {
        id: UtteranceId,
        error: SynthesisError,
    },
    /// The platform voice list changed
    VoicesChanged(Vec<Voice>),
    /// Debounce window after cancel elapsed
    DebounceElapsed(UtteranceId),
    /// Stall recovery poll
    StallCheck(UtteranceId),
}

/// Platform speech recognition capability
pub trait SpeechCapturePort {
    /// Begin a recognition pass
    ///
    /// # Errors
    ///
    /// Returns error if the platform refuses to start
    fn start(&mut self, pass: PassId, language: &str) -> Result<()>;

    /// End the active pass
    fn stop(&mut self);
}

/// Platform speech synthesis capability
pub trait SpeechPlaybackPort {
    /// Currently known voices (may be empty until loaded)
    fn voices(&self) -> Vec<Voice>;

    /// Enqueue an utterance
    ///
    /// # Errors
    ///
    /// Returns error if the platform rejects the request
    fn speak(&mut self, request: UtteranceRequest) -> Result<()>;

    /// Drop the active and queued utterances
    fn cancel(&mut self);

    /// Platform is voicing something
    fn is_speaking(&self) -> bool;

    /// Platform holds an utterance that has not started yet
    fn is_pending(&self) -> bool;

    /// Platform paused mid-utterance
    fn is_paused(&self) -> bool;

    /// Resume a paused utterance
    fn resume(&mut self);
}

impl<T: SpeechCapturePort + ?Sized> SpeechCapturePort for Box<T> {
    fn start(&mut self, pass: PassId, language: &str) -> Result<()> {
        (**self).start(pass, language)
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

impl<T: SpeechPlaybackPort + ?Sized> SpeechPlaybackPort for Box<T> {
    fn voices(&self) -> Vec<Voice> {
        (**self).voices()
    }

    fn speak(&mut self, request: UtteranceRequest) -> Result<()> {
        (**self).speak(request)
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }

    fn is_speaking(&self) -> bool {
        (**self).is_speaking()
    }

    fn is_pending(&self) -> bool {
        (**self).is_pending()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn resume(&mut self) {
        (**self).resume();
    }
}

/// Stand-in for a capability the platform lacks
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl SpeechCapturePort for Unavailable {
    fn start(&mut self, _pass: PassId, _language: &str) -> Result<()> {
        Err(crate::Error::Stt("speech recognition unavailable".to_string()))
    }

    fn stop(&mut self) {}
}

impl SpeechPlaybackPort for Unavailable {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&mut self, _request: UtteranceRequest) -> Result<()> {
        Err(crate::Error::Tts("speech synthesis unavailable".to_string()))
    }

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }

    fn is_pending(&self) -> bool {
        false
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn resume(&mut self) {}
}
