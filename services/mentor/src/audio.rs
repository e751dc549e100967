use anyhow::{Context, Result, bail};
use base64::Engine;
use mentor_core::AudioStream;
use mentor_realtime::types::audio::PCM16_SAMPLE_RATE;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Silence appended after the recording so server-side VAD can close the last turn.
const TRAILING_SILENCE: Duration = Duration::from_secs(1);

/// Reads a 24 kHz mono 16-bit PCM WAV file.
pub fn read_wav(path: &Path) -> Result<Vec<i16>> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let format = reader.spec();
    if format.channels != 1
        || format.sample_rate != PCM16_SAMPLE_RATE
        || format.bits_per_sample != 16
        || format.sample_format != hound::SampleFormat::Int
    {
        bail!(
            "{} must be {} Hz mono 16-bit PCM, got {} Hz, {} channel(s), {} bits {:?}",
            path.display(),
            PCM16_SAMPLE_RATE,
            format.sample_rate,
            format.channels,
            format.bits_per_sample,
            format.sample_format
        );
    }
    reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to decode samples from {}", path.display()))
}

/// Streams `samples` in fixed-size frames at real-time pace, followed by a
/// short stretch of silence. The stream ends when the task finishes.
pub fn stream_samples(samples: Vec<i16>, chunk_size: usize) -> (AudioStream, JoinHandle<()>) {
    let chunk_size = chunk_size.max(1);
    let (tx, rx) = mpsc::channel(32);
    let frame_time = Duration::from_secs_f64(chunk_size as f64 / PCM16_SAMPLE_RATE as f64);
    let silence_len = (TRAILING_SILENCE.as_secs_f64() * PCM16_SAMPLE_RATE as f64) as usize;

    let task = tokio::spawn(async move {
        let mut padded = samples;
        padded.resize(padded.len() + silence_len, 0);

        let mut ticker = tokio::time::interval(frame_time);
        for frame in padded.chunks(chunk_size) {
            ticker.tick().await;
            if tx.send(frame.to_vec()).await.is_err() {
                tracing::debug!("audio consumer went away; stopping playback");
                return;
            }
        }
        tracing::info!("finished streaming input audio");
    });
    (rx, task)
}

/// Encodes PCM16 samples as little-endian bytes in base64, the wire format of
/// `input_audio_buffer.append`.
pub fn encode_i16(pcm16: &[i16]) -> String {
    let bytes: Vec<u8> = pcm16.iter().flat_map(|sample| sample.to_le_bytes()).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
