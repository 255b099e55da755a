//! Speech playback engine
//!
//! Voices agent text through the synthesis capability while working around
//! platform quirks:
//! - cancelling and immediately speaking overlaps audio or drops the first
//!   utterance, so every request waits out a short debounce after cancel
//! - some platforms silently pause long utterances after ~15s, so an active
//!   utterance is polled and resumed when found paused
//! - iOS drops playback not started from a user gesture until a throwaway
//!   utterance has been spoken inside one
//!
//! Exactly one utterance is current at a time. Timer firings carry the
//! utterance id they were armed for and are ignored once it is superseded.

use std::time::Duration;

use super::port::{PlaybackEvent, SpeechPlaybackPort, UtteranceId, UtteranceRequest, Voice};
use super::voices::{VoiceCache, select_voice};
use crate::event::EventSender;
use crate::timer::{self, TimerHandle};

/// Default delay between cancelling and issuing a new utterance
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(80);

/// Default stall-recovery poll interval
pub const DEFAULT_STALL_INTERVAL: Duration = Duration::from_secs(5);

/// Text of the zero-volume gesture unlock utterance
const UNLOCK_TEXT: &str = " ";

/// Tunables for the playback engine
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    /// Language tag for utterances and voice matching
    pub language: String,

    /// Delay between cancel and issuing the next utterance
    pub debounce: Duration,

    /// Interval of the stall-recovery poll
    pub stall_interval: Duration,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Pitch multiplier
    pub pitch: f32,

    /// High-quality voice names tried first, in order
    pub preferred_voices: Vec<String>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            debounce: DEFAULT_DEBOUNCE,
            stall_interval: DEFAULT_STALL_INTERVAL,
            rate: 1.0,
            pitch: 1.0,
            preferred_voices: vec![
                "Samantha".to_string(),
                "Karen".to_string(),
                "Google US English".to_string(),
            ],
        }
    }
}

/// Where a speak request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOrigin {
    /// Issued directly from a user input event
    Gesture,
    /// Issued by the application (auto-play)
    Programmatic,
}

/// Result of a speak request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Scheduled behind the debounce window
    Scheduled,
    /// Held until the platform is unlocked by a gesture
    Queued,
    /// Synthesis is unavailable
    Ignored,
}

/// Lifecycle change of the current utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSignal {
    /// The platform started voicing
    Started,
    /// The utterance reached a terminal state
    Finished,
}

/// Playback status of an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceStatus {
    /// Waiting for the debounce or for the platform to start
    Pending,
    /// Being voiced
    Speaking,
    /// Finished or stopped
    Ended,
    /// Aborted by an error or superseded
    Errored,
}

/// The utterance currently owned by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Token carried by callbacks and timers
    pub id: UtteranceId,

    /// Source text
    pub text: String,

    /// Voice chosen at dispatch
    pub voice: Option<Voice>,

    /// Current status
    pub status: UtteranceStatus,
}

impl Utterance {
    const fn is_active(&self) -> bool {
        matches!(
            self.status,
            UtteranceStatus::Pending | UtteranceStatus::Speaking
        )
    }
}

/// Converts agent text into audible speech
pub struct PlaybackEngine<P> {
    port: P,
    events: EventSender,
    settings: PlaybackSettings,
    supported: bool,
    requires_gesture: bool,
    unlocked: bool,
    voices: VoiceCache,
    next_id: u64,
    current: Option<Utterance>,
    debounce: Option<TimerHandle>,
    stall_poll: Option<TimerHandle>,
    queued: Option<String>,
}

impl<P: SpeechPlaybackPort> PlaybackEngine<P> {
    /// Create a playback engine
    ///
    /// When `supported` is false every operation is a no-op.
    pub fn new(
        port: P,
        events: EventSender,
        supported: bool,
        requires_gesture: bool,
        settings: PlaybackSettings,
    ) -> Self {
        let mut voices = VoiceCache::default();
        if supported {
            voices.store(port.voices());
        }

        Self {
            port,
            events,
            settings,
            supported,
            requires_gesture,
            unlocked: false,
            voices,
            next_id: 0,
            current: None,
            debounce: None,
            stall_poll: None,
            queued: None,
        }
    }

    /// Request voiced playback of `text`
    ///
    /// Cancels whatever is playing or pending and schedules the new text
    /// after the debounce window. A programmatic request on a platform still
    /// waiting for its gesture unlock is queued instead, replacing any
    /// earlier queued text.
    pub fn speak(&mut self, text: &str, origin: SpeakOrigin) -> SpeakOutcome {
        if !self.supported {
            return SpeakOutcome::Ignored;
        }

        if self.is_locked() {
            match origin {
                SpeakOrigin::Programmatic => {
                    tracing::debug!("playback locked until user gesture, queueing");
                    self.queued = Some(text.to_string());
                    return SpeakOutcome::Queued;
                }
                SpeakOrigin::Gesture => self.prime(),
            }
        }

        self.queued = None;
        self.interrupt();

        let id = self.allocate_id();
        self.current = Some(Utterance {
            id,
            text: text.to_string(),
            voice: None,
            status: UtteranceStatus::Pending,
        });
        self.debounce = Some(timer::after(
            self.settings.debounce,
            &self.events,
            PlaybackEvent::DebounceElapsed(id).into(),
        ));

        tracing::debug!(%id, chars = text.len(), ?origin, "speech scheduled");
        SpeakOutcome::Scheduled
    }

    /// Cancel active and pending playback immediately
    ///
    /// Always leaves the engine not speaking with no timers armed, and drops
    /// any request queued behind the gesture lock. Returns whether something
    /// was active.
    pub fn stop_speaking(&mut self) -> bool {
        self.debounce = None;
        self.stall_poll = None;
        self.queued = None;
        if self.supported {
            self.port.cancel();
        }

        match self.current.as_mut() {
            Some(utterance) if utterance.is_active() => {
                utterance.status = UtteranceStatus::Ended;
                tracing::debug!(id = %utterance.id, "speech stopped");
                true
            }
            _ => false,
        }
    }

    /// Unlock playback from inside a genuine user gesture
    ///
    /// Speaks a zero-volume throwaway utterance so later programmatic
    /// playback is allowed, then flushes any queued request. Returns whether
    /// a queued request was scheduled.
    pub fn unlock(&mut self) -> bool {
        if !self.supported {
            return false;
        }
        if !self.unlocked {
            self.prime();
        }
        if !self.unlocked {
            return false;
        }

        match self.queued.take() {
            Some(text) => self.speak(&text, SpeakOrigin::Programmatic) == SpeakOutcome::Scheduled,
            None => false,
        }
    }

    /// Apply a synthesis callback or timer firing
    pub fn handle(&mut self, event: PlaybackEvent) -> Option<PlaybackSignal> {
        match event {
            PlaybackEvent::VoicesChanged(voices) => {
                self.voices.store(voices);
                None
            }
            PlaybackEvent::DebounceElapsed(id) => self.dispatch(id),
            PlaybackEvent::Started(id) => {
                let utterance = self.current_active_mut(id)?;
                if utterance.status != UtteranceStatus::Pending {
                    return None;
                }
                utterance.status = UtteranceStatus::Speaking;
                tracing::debug!(%id, "speaking");
                Some(PlaybackSignal::Started)
            }
            PlaybackEvent::Ended(id) => {
                self.current_active_mut(id)?;
                tracing::debug!(%id, "speech ended");
                Some(self.finish(UtteranceStatus::Ended))
            }
            PlaybackEvent::Failed { id, error } => {
                if self.current_active_mut(id).is_none() {
                    tracing::trace!(%id, %error, "ignoring error from superseded utterance");
                    return None;
                }
                if error.is_benign() {
                    tracing::debug!(%id, %error, "speech interrupted");
                } else {
                    tracing::warn!(%id, %error, "speech synthesis error");
                }
                Some(self.finish(UtteranceStatus::Errored))
            }
            PlaybackEvent::StallCheck(id) => self.check_stall(id),
        }
    }

    fn dispatch(&mut self, id: UtteranceId) -> Option<PlaybackSignal> {
        let pending = self
            .current
            .as_ref()
            .is_some_and(|u| u.id == id && u.status == UtteranceStatus::Pending);
        if !pending || self.debounce.is_none() {
            tracing::trace!(%id, "ignoring stale debounce");
            return None;
        }
        self.debounce = None;

        let voice = {
            let port = &self.port;
            let voices = self.voices.get_or_load(|| port.voices());
            select_voice(
                voices,
                &self.settings.language,
                &self.settings.preferred_voices,
            )
            .cloned()
        };

        let text = self.current.as_ref().map(|u| u.text.clone())?;
        let request = UtteranceRequest {
            id,
            text,
            voice: voice.clone(),
            lang: self.settings.language.clone(),
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            volume: 1.0,
        };

        tracing::debug!(
            %id,
            voice = voice.as_ref().map_or("default", |v| v.name.as_str()),
            "issuing utterance"
        );

        if let Some(utterance) = self.current.as_mut() {
            utterance.voice = voice;
        }

        if let Err(e) = self.port.speak(request) {
            tracing::warn!(%id, error = %e, "platform rejected utterance");
            return Some(self.finish(UtteranceStatus::Errored));
        }

        self.stall_poll = Some(timer::every(
            self.settings.stall_interval,
            &self.events,
            move || PlaybackEvent::StallCheck(id).into(),
        ));
        None
    }

    fn check_stall(&mut self, id: UtteranceId) -> Option<PlaybackSignal> {
        self.current_active_mut(id)?;
        if self.debounce.is_some() {
            return None;
        }

        if !self.port.is_speaking() && !self.port.is_pending() {
            tracing::debug!(%id, "platform went quiet without an end event");
            return Some(self.finish(UtteranceStatus::Ended));
        }

        if self.port.is_paused() {
            tracing::debug!(%id, "synthesis stalled, resuming");
            self.port.resume();
        }
        None
    }

    /// Speak the zero-volume unlock utterance
    fn prime(&mut self) {
        let id = self.allocate_id();
        let request = UtteranceRequest {
            id,
            text: UNLOCK_TEXT.to_string(),
            voice: None,
            lang: self.settings.language.clone(),
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            volume: 0.0,
        };

        match self.port.speak(request) {
            Ok(()) => {
                self.unlocked = true;
                tracing::info!("audio playback unlocked");
            }
            Err(e) => tracing::warn!(error = %e, "audio unlock failed"),
        }
    }

    /// Cancel the current utterance ahead of a new one
    fn interrupt(&mut self) {
        self.debounce = None;
        self.stall_poll = None;
        self.port.cancel();

        if let Some(utterance) = self.current.as_mut().filter(|u| u.is_active()) {
            utterance.status = UtteranceStatus::Errored;
            tracing::trace!(id = %utterance.id, "utterance superseded");
        }
    }

    fn finish(&mut self, status: UtteranceStatus) -> PlaybackSignal {
        self.debounce = None;
        self.stall_poll = None;
        if let Some(utterance) = self.current.as_mut() {
            utterance.status = status;
        }
        PlaybackSignal::Finished
    }

    fn current_active_mut(&mut self, id: UtteranceId) -> Option<&mut Utterance> {
        self.current
            .as_mut()
            .filter(|u| u.id == id && u.is_active())
    }

    fn allocate_id(&mut self) -> UtteranceId {
        self.next_id += 1;
        UtteranceId(self.next_id)
    }

    const fn is_locked(&self) -> bool {
        self.requires_gesture && !self.unlocked
    }

    /// An utterance is being voiced
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|u| u.status == UtteranceStatus::Speaking)
    }

    /// An utterance is pending or being voiced
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(Utterance::is_active)
    }

    /// A stall-recovery poll is armed
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.stall_poll.is_some()
    }

    /// The current (or last) utterance
    #[must_use]
    pub const fn current(&self) -> Option<&Utterance> {
        self.current.as_ref()
    }

    /// Synthesis is available on this platform
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.supported
    }

    /// The platform needs a gesture before programmatic playback
    #[must_use]
    pub const fn requires_gesture(&self) -> bool {
        self.requires_gesture
    }

    /// The gesture unlock has been performed
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Programmatic playback would be voiced rather than queued
    #[must_use]
    pub const fn can_autoplay(&self) -> bool {
        self.supported && !self.is_locked()
    }
}
