//! Energy-based end-of-speech detection
//!
//! Decides when a microphone recording holds one complete utterance: speech
//! followed by enough silence. Also gives up when nobody speaks.

/// Minimum RMS energy considered speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum amount of audio before an utterance can complete (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (0.8s at 16kHz)
const TRAILING_SILENCE_SAMPLES: usize = 12_800;

/// Silence before any speech after which the pass is abandoned (8s at 16kHz)
const NO_SPEECH_SAMPLES: usize = 128_000;

/// Segmenter progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// No speech heard yet
    Waiting,
    /// Speech in progress
    Speaking,
    /// Speech followed by silence; the utterance is ready
    Complete,
    /// Nobody spoke
    NoSpeech,
}

/// Accumulates microphone audio into a single utterance
#[derive(Debug)]
pub struct SpeechSegmenter {
    state: SegmentState,
    utterance: Vec<f32>,
    silence: usize,
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmentState::Waiting,
            utterance: Vec::new(),
            silence: 0,
        }
    }

    /// Feed a chunk of samples and return the updated state
    pub fn push(&mut self, samples: &[f32]) -> SegmentState {
        if samples.is_empty() {
            return self.state;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmentState::Waiting => {
                if is_speech {
                    tracing::trace!(energy, "speech detected");
                    self.state = SegmentState::Speaking;
                    self.utterance.extend_from_slice(samples);
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                    if self.silence > NO_SPEECH_SAMPLES {
                        self.state = SegmentState::NoSpeech;
                    }
                }
            }
            SegmentState::Speaking => {
                self.utterance.extend_from_slice(samples);
                if is_speech {
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                if self.silence > TRAILING_SILENCE_SAMPLES
                    && self.utterance.len() > MIN_SPEECH_SAMPLES
                {
                    tracing::debug!(samples = self.utterance.len(), "utterance complete");
                    self.state = SegmentState::Complete;
                }
            }
            SegmentState::Complete | SegmentState::NoSpeech => {}
        }

        self.state
    }

    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }

    /// End recording early
    ///
    /// Speech long enough to transcribe becomes a complete utterance;
    /// anything shorter counts as no speech.
    pub fn finish(&mut self) -> SegmentState {
        self.state = match self.state {
            SegmentState::Complete => SegmentState::Complete,
            SegmentState::Speaking if self.utterance.len() > MIN_SPEECH_SAMPLES => {
                SegmentState::Complete
            }
            _ => SegmentState::NoSpeech,
        };
        self.state
    }

    /// Take the recorded utterance, resetting the segmenter
    pub fn take_utterance(&mut self) -> Vec<f32> {
        self.state = SegmentState::Waiting;
        self.silence = 0;
        std::mem::take(&mut self.utterance)
    }
}

/// RMS energy of a chunk of samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
