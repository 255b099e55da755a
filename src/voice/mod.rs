//! Native speech adapters
//!
//! Implement the speech ports on a desktop host: the default microphone plus
//! a transcription API for recognition, a speech API plus the default
//! speaker for synthesis.

mod capture;
mod playback;
mod recognizer;
mod segmenter;
mod speaker;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, has_input_device, samples_to_wav};
pub use playback::{DecodedAudio, PlaybackEnd, decode_mp3, has_output_device, play_blocking};
pub use recognizer::MicrophoneRecognizer;
pub use segmenter::{SegmentState, SpeechSegmenter};
pub use speaker::SpeakerSynthesizer;
pub use stt::Transcriber;
pub use tts::{OPENAI_VOICES, Synthesizer};
