//! Speech-to-text over an OpenAI-compatible transcription API

use crate::{Error, Result};

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes recorded utterances
#[derive(Clone)]
pub struct Transcriber {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl Transcriber {
    /// Create a transcriber
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_base: &str, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "API key required for speech recognition".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    /// Transcribe WAV audio
    ///
    /// `language` is a BCP-47 tag; only its primary subtag is sent.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn transcribe(&self, wav: Vec<u8>, language: &str) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), model = %self.model, "transcribing");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());
        if let Some(primary) = primary_language(language) {
            form = form.text("language", primary);
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

fn primary_language(tag: &str) -> Option<String> {
    let primary = tag.split(['-', '_']).next()?;
    (matches!(primary.len(), 2 | 3) && primary.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| primary.to_ascii_lowercase())
}
