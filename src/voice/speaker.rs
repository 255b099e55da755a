//! Speaker-backed speech synthesis
//!
//! Each utterance is synthesized to MP3 by the speech API, decoded and
//! played on the default output device. Progress is reported back as
//! [`PlaybackEvent`]s tagged with the utterance id.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::playback::{PlaybackEnd, decode_mp3, play_blocking};
use super::tts::Synthesizer;
use crate::event::EventSender;
use crate::speech::{
    PlaybackEvent, SpeechPlaybackPort, SynthesisError, UtteranceRequest, Voice,
};
use crate::{Error, Result};

#[derive(Default)]
struct UtteranceFlags {
    pending: AtomicBool,
    speaking: AtomicBool,
    cancelled: AtomicBool,
}

/// [`SpeechPlaybackPort`] using a speech API and the default speaker
pub struct SpeakerSynthesizer {
    synthesizer: Synthesizer,
    events: EventSender,
    language: String,
    current: Option<Arc<UtteranceFlags>>,
}

impl SpeakerSynthesizer {
    #[must_use]
    pub fn new(synthesizer: Synthesizer, events: EventSender, language: impl Into<String>) -> Self {
        Self {
            synthesizer,
            events,
            language: language.into(),
            current: None,
        }
    }
}

impl SpeechPlaybackPort for SpeakerSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.synthesizer.voices(&self.language)
    }

    fn speak(&mut self, request: UtteranceRequest) -> Result<()> {
        // Native output needs no gesture unlock; the silent primer is a no-op
        if request.volume <= 0.0 || request.text.trim().is_empty() {
            return Ok(());
        }
        if !super::has_output_device() {
            return Err(Error::Audio("no output device available".to_string()));
        }

        let flags = Arc::new(UtteranceFlags::default());
        flags.pending.store(true, Ordering::Release);
        self.current = Some(Arc::clone(&flags));

        tokio::spawn(run_utterance(
            request,
            self.synthesizer.clone(),
            self.events.clone(),
            flags,
        ));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(flags) = self.current.take() {
            flags.cancelled.store(true, Ordering::Release);
        }
    }

    fn is_speaking(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|f| f.speaking.load(Ordering::Acquire))
    }

    fn is_pending(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|f| f.pending.load(Ordering::Acquire))
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn resume(&mut self) {}
}

impl Drop for SpeakerSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_utterance(
    request: UtteranceRequest,
    synthesizer: Synthesizer,
    events: EventSender,
    flags: Arc<UtteranceFlags>,
) {
    let id = request.id;
    let event = match voice_utterance(request, &synthesizer, &events, &flags).await {
        Ok(PlaybackEnd::Completed) => PlaybackEvent::Ended(id),
        Ok(PlaybackEnd::Cancelled) => PlaybackEvent::Failed {
            id,
            error: SynthesisError::Canceled,
        },
        Err(e) => PlaybackEvent::Failed {
            id,
            error: SynthesisError::Other(e.to_string()),
        },
    };
    flags.pending.store(false, Ordering::Release);
    flags.speaking.store(false, Ordering::Release);
    let _ = events.send(event.into());
}

async fn voice_utterance(
    request: UtteranceRequest,
    synthesizer: &Synthesizer,
    events: &EventSender,
    flags: &Arc<UtteranceFlags>,
) -> Result<PlaybackEnd> {
    let voice = request.voice.as_ref().map(|v| v.name.as_str());
    let mp3 = synthesizer
        .synthesize(&request.text, voice, request.rate)
        .await?;
    if flags.cancelled.load(Ordering::Acquire) {
        return Ok(PlaybackEnd::Cancelled);
    }

    let audio = decode_mp3(&mp3)?;
    flags.pending.store(false, Ordering::Release);
    flags.speaking.store(true, Ordering::Release);
    let _ = events.send(PlaybackEvent::Started(request.id).into());

    let volume = request.volume.clamp(0.0, 1.0);
    let flags = Arc::clone(flags);
    tokio::task::spawn_blocking(move || play_blocking(audio, volume, &flags.cancelled))
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
}
