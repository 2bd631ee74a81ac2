//! Speech synthesis over a pluggable engine.
//!
//! Chunks may be synthesized concurrently, but results are re-joined in
//! input order before anything reads their durations.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use metrics::{counter, histogram};
use tokio::sync::watch;
use tracing::{debug, info};
use vnarr_models::{DurationSource, TextUnit};

use crate::error::{NarrationError, NarrationResult};
use crate::names;

/// An audio file produced for one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub path: PathBuf,
    /// Exact audio length in seconds.
    pub duration: f64,
}

/// Text-to-speech capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` with `voice`. `index` is the unit's position, for file naming.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        index: usize,
    ) -> NarrationResult<SynthesizedAudio>;

    /// Produce `duration` seconds of silence.
    async fn silence(&self, duration: f64, index: usize) -> NarrationResult<SynthesizedAudio>;
}

/// Units with measured durations plus their audio, in the same order.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOutput {
    pub units: Vec<TextUnit>,
    pub audio: Vec<SynthesizedAudio>,
}

impl SynthesisOutput {
    pub fn total_duration(&self) -> f64 {
        self.audio.iter().map(|a| a.duration).sum()
    }
}

fn check_cancelled(cancel: &Option<watch::Receiver<bool>>) -> NarrationResult<()> {
    match cancel {
        Some(rx) if *rx.borrow() => Err(NarrationError::Cancelled),
        _ => Ok(()),
    }
}

async fn synthesize_one<S: SpeechSynthesizer + ?Sized>(
    synth: &S,
    index: usize,
    unit: &TextUnit,
    voice: &str,
    cancel: &Option<watch::Receiver<bool>>,
) -> NarrationResult<(TextUnit, SynthesizedAudio)> {
    check_cancelled(cancel)?;

    if unit.is_silence() {
        // The audio covers duration plus delay; the unit keeps both so
        // the assembler advances by the same amount.
        let audio = synth.silence(unit.span_secs(), index).await?;
        return Ok((unit.clone(), audio));
    }

    let audio = synth.synthesize(unit.text.trim(), voice, index).await?;
    if !audio.duration.is_finite() || audio.duration <= 0.0 {
        return Err(NarrationError::InvalidDuration {
            index,
            duration: audio.duration,
        });
    }

    counter!(names::TTS_CHUNKS_TOTAL).increment(1);
    histogram!(names::TTS_SECONDS).record(audio.duration);
    debug!(index, chars = unit.char_len(), duration = audio.duration, "Synthesized chunk");

    let measured = unit
        .clone()
        .with_duration(audio.duration, DurationSource::Measured);
    Ok((measured, audio))
}

/// Synthesize every unit with up to `concurrency` requests in flight.
///
/// Returns units whose narration durations are replaced by measured audio
/// length. Fails on the first error; nothing partial is returned.
pub async fn synthesize_units<S: SpeechSynthesizer + ?Sized>(
    synth: &S,
    units: &[TextUnit],
    voice: &str,
    concurrency: usize,
    cancel: Option<watch::Receiver<bool>>,
) -> NarrationResult<SynthesisOutput> {
    let cancel = &cancel;
    let results: Vec<(TextUnit, SynthesizedAudio)> = stream::iter(units.iter().enumerate())
        .map(|(index, unit)| synthesize_one(synth, index, unit, voice, cancel))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let (units, audio): (Vec<_>, Vec<_>) = results.into_iter().unzip();
    let output = SynthesisOutput { units, audio };

    info!(
        chunks = output.units.len(),
        total_duration = output.total_duration(),
        voice,
        "Narration synthesized"
    );
    Ok(output)
}
