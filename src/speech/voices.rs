//! Voice list caching and selection

use super::port::Voice;

/// Voices learned from the platform
///
/// Some platforms populate the list lazily after startup, so the cache is
/// filled on the first non-empty load and refreshed on change notifications.
#[derive(Debug, Clone, Default)]
pub struct VoiceCache {
    voices: Vec<Voice>,
}

impl VoiceCache {
    /// Whether a non-empty list has been cached
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !self.voices.is_empty()
    }

    /// Cache `voices` unless the list is empty
    pub fn store(&mut self, voices: Vec<Voice>) {
        if voices.is_empty() {
            return;
        }
        tracing::debug!(count = voices.len(), "voice list cached");
        self.voices = voices;
    }

    /// Cached voices, loading from `fetch` if nothing is cached yet
    pub fn get_or_load(&mut self, fetch: impl FnOnce() -> Vec<Voice>) -> &[Voice] {
        if !self.is_loaded() {
            self.store(fetch());
        }
        &self.voices
    }
}

/// Whether a voice language tag covers the requested language
///
/// Compares primary subtags only, so an `en-GB` voice serves `en-US`.
#[must_use]
pub fn language_matches(voice_lang: &str, requested: &str) -> bool {
    let primary = |tag: &str| {
        tag.split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    };
    let wanted = primary(requested);
    !wanted.is_empty() && primary(voice_lang) == wanted
}

/// Pick the best voice for `language`
///
/// Priority: a preferred named voice, a "Natural" voice in the language, a
/// local voice in the language, any voice in the language, then none.
#[must_use]
pub fn select_voice<'a>(
    voices: &'a [Voice],
    language: &str,
    preferred: &[String],
) -> Option<&'a Voice> {
    let in_language = |v: &&Voice| language_matches(&v.lang, language);

    preferred
        .iter()
        .find_map(|name| voices.iter().find(|v| v.name.contains(name.as_str())))
        .or_else(|| {
            voices
                .iter()
                .filter(in_language)
                .find(|v| v.name.contains("Natural"))
        })
        .or_else(|| voices.iter().filter(in_language).find(|v| v.local_service))
        .or_else(|| voices.iter().find(in_language))
}
