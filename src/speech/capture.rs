//! Speech capture engine
//!
//! Wraps the recognition capability and keeps the two transcript views: a
//! volatile interim string and a final string that is only set once the
//! platform marks a segment complete.

use super::port::{CaptureEvent, PassId, RecognitionSegment, SpeechCapturePort};

/// How a recognition pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureExit {
    /// Platform reported natural end of speech
    Finished,
    /// Platform reported a recognition error
    Failed,
    /// Explicit stop
    Stopped,
}

/// What a capture callback changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSignal {
    /// Transcript views changed
    Updated,
    /// The pass is over; the engine is no longer listening
    Ended(CaptureExit),
}

/// Converts microphone audio into interim and final transcripts
pub struct CaptureEngine<P> {
    port: P,
    supported: bool,
    language: String,
    next_pass: u64,
    active: Option<PassId>,
    stopping: Option<PassId>,
    interim: String,
    final_text: String,
}

impl<P: SpeechCapturePort> CaptureEngine<P> {
    /// Create a capture engine
    ///
    /// When `supported` is false every operation is a no-op.
    pub fn new(port: P, supported: bool, language: impl Into<String>) -> Self {
        Self {
            port,
            supported,
            language: language.into(),
            next_pass: 0,
            active: None,
            stopping: None,
            interim: String::new(),
            final_text: String::new(),
        }
    }

    /// Begin a recognition pass
    ///
    /// Returns false without side effects if recognition is unsupported or a
    /// pass is already active.
    pub fn start(&mut self) -> bool {
        if !self.supported || self.active.is_some() {
            return false;
        }

        self.next_pass += 1;
        let pass = PassId(self.next_pass);

        if let Err(e) = self.port.start(pass, &self.language) {
            tracing::warn!(error = %e, %pass, "failed to start recognition");
            return false;
        }

        self.active = Some(pass);
        self.stopping = None;
        self.interim.clear();
        self.final_text.clear();
        tracing::debug!(%pass, language = %self.language, "listening");
        true
    }

    /// End the active pass
    ///
    /// Listening stops immediately and interim text is dropped. The pass
    /// keeps stopping until the platform reports its end, so a final result
    /// delivered after the stop still lands. Returns whether a pass was
    /// active.
    pub fn stop(&mut self) -> bool {
        let Some(pass) = self.active.take() else {
            return false;
        };

        self.port.stop();
        self.interim.clear();
        self.stopping = Some(pass);
        tracing::debug!(%pass, "recognition stopping");
        true
    }

    /// Apply a recognition callback
    ///
    /// Callbacks for any pass other than the active or stopping one are
    /// ignored.
    pub fn handle(&mut self, event: CaptureEvent) -> Option<CaptureSignal> {
        match event {
            CaptureEvent::Result { pass, segments } => {
                if !self.owns(pass) {
                    tracing::trace!(%pass, "ignoring result from inactive pass");
                    return None;
                }
                self.apply_results(&segments);
                if self.stopping.is_some() {
                    self.interim.clear();
                }
                Some(CaptureSignal::Updated)
            }
            CaptureEvent::Error { pass, reason } => {
                if !self.owns(pass) {
                    return None;
                }
                tracing::warn!(%pass, reason = %reason, "recognition error");
                self.finish(CaptureExit::Failed)
            }
            CaptureEvent::End { pass } => {
                if !self.owns(pass) {
                    return None;
                }
                let exit = if self.stopping.is_some() {
                    CaptureExit::Stopped
                } else {
                    CaptureExit::Finished
                };
                self.finish(exit)
            }
        }
    }

    fn owns(&self, pass: PassId) -> bool {
        self.active == Some(pass) || self.stopping == Some(pass)
    }

    fn apply_results(&mut self, segments: &[RecognitionSegment]) {
        let mut interim = String::new();
        let mut final_text = String::new();
        for segment in segments {
            if segment.is_final {
                final_text.push_str(&segment.text);
            } else {
                interim.push_str(&segment.text);
            }
        }

        if !final_text.is_empty() {
            tracing::debug!(transcript = %final_text, "final transcript");
            self.final_text = final_text;
        }
        self.interim = interim;
    }

    fn finish(&mut self, exit: CaptureExit) -> Option<CaptureSignal> {
        self.active = None;
        self.stopping = None;
        self.interim.clear();
        tracing::debug!(?exit, "recognition ended");
        Some(CaptureSignal::Ended(exit))
    }

    /// Take the final transcript, leaving it empty
    ///
    /// Returns `None` if no non-blank final text is available.
    pub fn take_final(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.final_text);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Clear both transcript views and forget a pass that is still stopping
    pub fn reset(&mut self) {
        self.stopping = None;
        self.interim.clear();
        self.final_text.clear();
    }

    /// A recognition pass is active
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.active.is_some()
    }

    /// A stopped pass has not reported its end yet
    #[must_use]
    pub const fn is_stopping(&self) -> bool {
        self.stopping.is_some()
    }

    /// Recognition is available on this platform
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.supported
    }

    /// Latest partial transcript
    #[must_use]
    pub fn interim(&self) -> &str {
        &self.interim
    }

    /// Latest final transcript (empty until a segment completes)
    #[must_use]
    pub fn final_transcript(&self) -> &str {
        &self.final_text
    }
}
