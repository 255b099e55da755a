//! Text-to-speech over an OpenAI-compatible speech API

use crate::speech::Voice;
use crate::{Error, Result};

/// Voices offered by the OpenAI speech endpoint
pub const OPENAI_VOICES: &[&str] = &[
    "alloy", "ash", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

/// Synthesizes MP3 audio from text
#[derive(Clone)]
pub struct Synthesizer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    voice: String,
    speed: f64,
}

impl Synthesizer {
    /// Create a synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        api_base: &str,
        api_key: String,
        model: String,
        voice: String,
        speed: f64,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            voice,
            speed,
        })
    }

    /// Voices this synthesizer can use, the configured one first
    ///
    /// The service voices are multilingual, so each is listed under
    /// `language`.
    #[must_use]
    pub fn voices(&self, language: &str) -> Vec<Voice> {
        std::iter::once(self.voice.as_str())
            .chain(OPENAI_VOICES.iter().copied().filter(|v| *v != self.voice))
            .map(|name| Voice::new(name, language, false))
            .collect()
    }

    /// Synthesize `text`, returning MP3 bytes
    ///
    /// `voice` overrides the configured voice; `rate` scales the configured
    /// speed.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str, voice: Option<&str>, rate: f32) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: voice.unwrap_or(&self.voice),
            speed: (self.speed * f64::from(rate)).clamp(0.25, 4.0),
        };

        tracing::debug!(chars = text.len(), voice = request.voice, "synthesizing speech");

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizer(voice: &str) -> Synthesizer {
        Synthesizer::new(
            "https://api.openai.com/",
            "sk-test".to_string(),
            "tts-1".to_string(),
            voice.to_string(),
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn configured_voice_listed_first() {
        let voices = synthesizer("nova").voices("en-US");

        assert_eq!(voices[0].name, "nova");
        assert_eq!(voices.len(), OPENAI_VOICES.len());
        assert!(voices.iter().all(|v| v.lang == "en-US"));
    }

    #[test]
    fn custom_voice_is_kept() {
        let voices = synthesizer("my-clone").voices("en-US");
        assert_eq!(voices[0].name, "my-clone");
        assert_eq!(voices.len(), OPENAI_VOICES.len() + 1);
    }

    #[test]
    fn trims_api_base() {
        assert_eq!(synthesizer("alloy").api_base, "https://api.openai.com");
    }

    #[test]
    fn requires_api_key() {
        let result = Synthesizer::new("x", String::new(), "tts-1".into(), "alloy".into(), 1.0);
        assert!(result.is_err());
    }
}
