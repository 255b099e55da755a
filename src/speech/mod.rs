//! Speech capture and playback engines
//!
//! The engines own the platform speech handles through the port traits in
//! [`port`] and turn raw platform callbacks into coordinator-level signals.

mod capture;
mod playback;
pub mod port;
mod voices;

pub use capture::{CaptureEngine, CaptureExit, CaptureSignal};
pub use playback::{
    PlaybackEngine, PlaybackSettings, PlaybackSignal, SpeakOrigin, SpeakOutcome, Utterance,
    UtteranceStatus,
};
pub use port::{
    CaptureEvent, PassId, PlaybackEvent, RecognitionSegment, SpeechCapturePort,
    SpeechPlaybackPort, SynthesisError, Unavailable, UtteranceId, UtteranceRequest, Voice,
};
pub use voices::{VoiceCache, language_matches, select_voice};
