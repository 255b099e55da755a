//! Speaker output

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate assumed when a decoded stream reports none (TTS default)
const DEFAULT_SAMPLE_RATE: u32 = 24000;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Mono PCM audio
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.samples.len() as u64 * 1000 / u64::from(self.sample_rate))
    }
}

/// How a playback call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Completed,
    Cancelled,
}

/// Whether the host has a default output device
#[must_use]
pub fn has_output_device() -> bool {
    cpal::default_host().default_output_device().is_some()
}

/// Play `audio` on the default output device, blocking until done
///
/// Returns early with [`PlaybackEnd::Cancelled`] once `cancel` is set.
///
/// # Errors
///
/// Returns error if no output device can be opened
pub fn play_blocking(audio: DecodedAudio, volume: f32, cancel: &AtomicBool) -> Result<PlaybackEnd> {
    if audio.samples.is_empty() {
        return Ok(PlaybackEnd::Completed);
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let rate = SampleRate(audio.sample_rate);
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(cpal::SupportedStreamConfigRange::channels)
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;
    let config: StreamConfig = supported.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    let duration = audio.duration();
    let samples = Arc::new(audio.samples);
    let position = Arc::new(AtomicUsize::new(0));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).map_or(0.0, |s| s * volume);
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let deadline = Instant::now() + duration + Duration::from_millis(500);
    let end = loop {
        if cancel.load(Ordering::Acquire) {
            break PlaybackEnd::Cancelled;
        }
        if position.load(Ordering::Relaxed) >= samples.len() || Instant::now() > deadline {
            // Let the device drain its last buffer
            std::thread::sleep(Duration::from_millis(100));
            break PlaybackEnd::Completed;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    drop(stream);
    tracing::debug!(samples = samples.len(), ?end, "playback finished");
    Ok(end)
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the stream is corrupt
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut audio = DecodedAudio {
        samples: Vec::new(),
        sample_rate: DEFAULT_SAMPLE_RATE,
    };

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if let Ok(rate) = u32::try_from(frame.sample_rate) {
                    if rate > 0 {
                        audio.sample_rate = rate;
                    }
                }
                let channels = frame.channels.max(1);
                audio.samples.extend(frame.data.chunks(channels).map(|chunk| {
                    #[allow(clippy::cast_precision_loss)]
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum::<f32>()
                        / chunk.len() as f32;
                    sum
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(audio)
}
