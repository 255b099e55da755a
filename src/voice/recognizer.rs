//! Microphone-backed speech recognition
//!
//! Records one utterance per pass (ended by trailing silence or a stop), sends it to
//! the transcription API and reports the text as a single final segment.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::segmenter::{SegmentState, SpeechSegmenter};
use super::stt::Transcriber;
use crate::event::EventSender;
use crate::speech::{CaptureEvent, PassId, RecognitionSegment, SpeechCapturePort};
use crate::{Error, Result};

/// Longest single recording
const MAX_RECORDING: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// [`SpeechCapturePort`] using the default microphone and a transcription API
pub struct MicrophoneRecognizer {
    transcriber: Transcriber,
    events: EventSender,
    cancel: Option<Arc<AtomicBool>>,
}

impl MicrophoneRecognizer {
    #[must_use]
    pub const fn new(transcriber: Transcriber, events: EventSender) -> Self {
        Self {
            transcriber,
            events,
            cancel: None,
        }
    }
}

impl SpeechCapturePort for MicrophoneRecognizer {
    fn start(&mut self, pass: PassId, language: &str) -> Result<()> {
        if !super::has_input_device() {
            return Err(Error::Audio("no input device available".to_string()));
        }

        self.stop();
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Some(Arc::clone(&cancel));

        tokio::spawn(run_pass(
            pass,
            language.to_string(),
            self.transcriber.clone(),
            self.events.clone(),
            cancel,
        ));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::Release);
        }
    }
}

impl Drop for MicrophoneRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_pass(
    pass: PassId,
    language: String,
    transcriber: Transcriber,
    events: EventSender,
    cancel: Arc<AtomicBool>,
) {
    let event = match recognize(pass, &language, &transcriber, &events, cancel).await {
        Ok(()) => CaptureEvent::End { pass },
        Err(e) => CaptureEvent::Error {
            pass,
            reason: e.to_string(),
        },
    };
    let _ = events.send(event.into());
}

async fn recognize(
    pass: PassId,
    language: &str,
    transcriber: &Transcriber,
    events: &EventSender,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let recorded = tokio::task::spawn_blocking(move || record_utterance(&cancel))
        .await
        .map_err(|e| Error::Audio(format!("recording task failed: {e}")))??;

    let Some(samples) = recorded else {
        tracing::debug!(%pass, "no speech recorded");
        return Ok(());
    };

    let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
    let text = transcriber.transcribe(wav, language).await?;
    let text = text.trim();
    if !text.is_empty() {
        let segments = vec![RecognitionSegment::final_text(text)];
        let _ = events.send(CaptureEvent::Result { pass, segments }.into());
    }
    Ok(())
}

/// Record until an utterance completes, nobody speaks, or `cancel` is set
///
/// A cancel keeps whatever speech was already heard. Returns `None` when
/// there is nothing worth transcribing.
fn record_utterance(cancel: &AtomicBool) -> Result<Option<Vec<f32>>> {
    let capture = AudioCapture::start()?;
    let mut segmenter = SpeechSegmenter::new();
    let started = Instant::now();

    let state = loop {
        std::thread::sleep(POLL_INTERVAL);
        let state = segmenter.push(&capture.take_buffer());

        if matches!(state, SegmentState::Complete | SegmentState::NoSpeech) {
            break state;
        }
        if cancel.load(Ordering::Acquire) {
            tracing::debug!(?state, "recording stopped");
            break segmenter.finish();
        }
        if started.elapsed() > MAX_RECORDING {
            tracing::debug!("recording limit reached");
            break segmenter.finish();
        }
    };
    capture.stop();

    Ok((state == SegmentState::Complete).then(|| segmenter.take_utterance()))
}
