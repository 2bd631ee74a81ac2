//! End-to-end narration render.
//!
//! ```text
//! probe ─► auto-trim (optional) ─► select intervals ─► extract + concat
//!                                                            │
//! text ─► segment ─► synthesize (measured) ─► timeline ─► SRT │
//!                          │                                 ▼
//!                          └──► narration track ──────────► mux ─► plan.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::Instrument;
use vnarr_media::audio::concat_audio;
use vnarr_media::{
    detect_static_segments, extract_and_concat, load_motion_config, probe_duration, probe_video,
    save_motion_config, select, FfmpegFrames, FfmpegRunner, FrameProvider, MediaError, MuxJob,
    OptimizeOutcome, ParameterOptimizer,
};
use vnarr_models::{
    AutoTrimConfig, JobId, NarrationRequest, RawInterval, SegmentsMode, SplitConfig, SplitStrategy,
    StaticSegment, TextUnit,
};
use vnarr_narration::{
    assemble_timeline, group_by_duration, synthesize_units, write_srt, DurationMode, Segmenter,
    SegmenterConfig, SpeechSynthesizer,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::{RenderLog, RenderStage};
use crate::plan::RenderPlan;
use crate::store::TaskStore;

/// Files produced by one render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub video: PathBuf,
    pub subtitles: PathBuf,
    pub plan_path: PathBuf,
    pub plan: RenderPlan,
}

/// Units sent to the synthesizer for `text` under `split`.
pub fn narration_units(text: &str, split: &SplitConfig) -> Vec<TextUnit> {
    let input = [TextUnit::narration(text)];
    let config = SegmenterConfig::default()
        .with_bounds(split.max_chars, split.min_chars)
        .with_duration_mode(DurationMode::Deferred);
    let segmenter = Segmenter::new(config);

    match split.effective_strategy() {
        SplitStrategy::Smart => segmenter.segment(&input),
        SplitStrategy::Duration | SplitStrategy::None => segmenter.expand_markers(&input),
    }
}

/// Units that become subtitle windows, from measured synthesis output.
pub fn subtitle_units(measured: &[TextUnit], split: &SplitConfig) -> Vec<TextUnit> {
    match split.effective_strategy() {
        SplitStrategy::Duration => group_by_duration(measured, split.target_duration),
        SplitStrategy::Smart | SplitStrategy::None => measured.to_vec(),
    }
}

/// Intervals and mode handed to the selector once static footage is known.
///
/// Auto-trim always cuts: detected static segments are appended to the
/// user's cut list (a keep list with auto-trim is rejected at parse time).
pub fn merge_cuts(
    request: &NarrationRequest,
    static_segments: &[StaticSegment],
) -> (Vec<RawInterval>, SegmentsMode) {
    if request.auto_trim.is_none() {
        return (request.segments.clone(), request.segments_mode);
    }
    let mut raw = request.segments.clone();
    raw.extend(static_segments.iter().map(StaticSegment::to_raw_interval));
    (raw, SegmentsMode::Cut)
}

/// Narration pipeline over a speech engine.
pub struct NarrationPipeline<S> {
    config: WorkerConfig,
    synth: S,
}

impl<S: SpeechSynthesizer> NarrationPipeline<S> {
    pub fn new(config: WorkerConfig, synth: S) -> Self {
        Self { config, synth }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Claim `id`, run the render under the job timeout and record the outcome.
    pub async fn execute(
        &self,
        store: &TaskStore,
        id: &JobId,
        request: &NarrationRequest,
    ) -> WorkerResult<RenderOutput> {
        let writer = store.claim(id)?;
        writer.start()?;
        let log = RenderLog::open(id);

        let timeout = self.config.job_timeout;
        let result = tokio::time::timeout(
            timeout,
            self.run(request, id, writer.cancel_receiver())
                .instrument(log.span()),
        )
        .await
        .unwrap_or_else(|_| Err(WorkerError::Timeout(timeout.as_secs())));

        match &result {
            Ok(output) => {
                writer.complete(output.video.clone())?;
            }
            Err(WorkerError::Cancelled) => {
                log.cancelled();
                writer.cancel()?;
            }
            Err(e) => {
                log.failed(e.kind(), &e.to_string());
                writer.fail(e.to_string())?;
            }
        }
        result
    }

    /// Render `request`. Intermediate files live under the job directory.
    pub async fn run(
        &self,
        request: &NarrationRequest,
        id: &JobId,
        cancel_rx: watch::Receiver<bool>,
    ) -> WorkerResult<RenderOutput> {
        let log = RenderLog::open(id);
        log.started(&request.video_path);

        let job_dir = self.config.job_dir(id.as_str());
        tokio::fs::create_dir_all(&job_dir).await?;
        let runner = FfmpegRunner::new()
            .with_cancel(cancel_rx.clone())
            .with_timeout(self.config.ffmpeg_timeout.as_secs());

        let source = Path::new(&request.video_path);
        let info = probe_video(source).await?;
        log.stage(
            RenderStage::Probe,
            &format!("{:.3}s {}x{} @ {:.2}fps", info.duration, info.width, info.height, info.fps),
        );

        let static_segments = match &request.auto_trim {
            Some(auto_trim) => {
                self.detect_static(source, auto_trim, cancel_rx.clone(), &log)
                    .await?
            }
            None => Vec::new(),
        };

        let (raw, mode) = merge_cuts(request, &static_segments);
        let selection = select(&raw, mode, info.duration)?;
        if selection.overlaps > 0 {
            log.notice(&format!(
                "{} keep interval(s) overlap; that footage repeats in the output",
                selection.overlaps
            ));
        }

        let trimmed = job_dir.join("trimmed.mp4");
        extract_and_concat(source, &trimmed, &selection.intervals, &runner).await?;
        let video_duration = probe_duration(&trimmed).await?;
        log.stage(
            RenderStage::Trim,
            &format!(
                "{} interval(s) kept, {:.3}s of video",
                selection.intervals.len(),
                video_duration
            ),
        );

        let units = narration_units(&request.text, &request.split);
        if !units.iter().any(|u| !u.is_silence()) {
            return Err(WorkerError::configuration("narration text has nothing to speak"));
        }

        let voice = request.voice();
        let synthesized = synthesize_units(
            &self.synth,
            &units,
            voice.id,
            self.config.tts_concurrency,
            Some(cancel_rx.clone()),
        )
        .await?;
        let narration_duration = synthesized.total_duration();

        let timeline = assemble_timeline(&subtitle_units(&synthesized.units, &request.split));
        if timeline.approximated > 0 {
            log.notice(&format!(
                "{} subtitle window(s) use estimated timing",
                timeline.approximated
            ));
        }

        let narration = job_dir.join("narration.m4a");
        let audio_paths: Vec<PathBuf> = synthesized.audio.iter().map(|a| a.path.clone()).collect();
        concat_audio(&audio_paths, &narration, &runner).await?;

        let subtitles = job_dir.join("narration.srt");
        write_srt(&subtitles, &timeline.windows).await?;

        let output = request
            .output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| job_dir.join("output.mp4"));
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let plan = RenderPlan {
            keep_intervals: selection.intervals.clone(),
            windows: timeline.windows.clone(),
            narration_duration,
            video_duration,
            approximated: timeline.approximated,
            overlaps: selection.overlaps,
            static_segments,
        };
        if plan.narration_overruns() {
            log.notice(&format!(
                "narration ({:.3}s) is longer than the video ({:.3}s) and will be cut",
                narration_duration, video_duration
            ));
        }

        MuxJob::new(&trimmed, &narration, &output, video_duration)
            .with_subtitles(&subtitles)
            .run(&runner)
            .await?;

        let plan_path = RenderPlan::path_for(&output);
        plan.write(&plan_path).await?;

        log.finished(&output);
        Ok(RenderOutput {
            video: output,
            subtitles,
            plan_path,
            plan,
        })
    }

    /// Static segments to cut, tuning parameters first when a target range is set.
    async fn detect_static(
        &self,
        source: &Path,
        auto_trim: &AutoTrimConfig,
        cancel_rx: watch::Receiver<bool>,
        log: &RenderLog,
    ) -> WorkerResult<Vec<StaticSegment>> {
        let config_path = auto_trim
            .config_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.motion_config_path());

        let mut motion = load_motion_config(&config_path).await?;
        if motion.metric != auto_trim.metric {
            motion = motion.with_metric(auto_trim.metric);
        }

        if let Some(range) = auto_trim.target_range() {
            let frames = FfmpegFrames::probe(source, self.config.analysis_width).await?;
            let optimizer = ParameterOptimizer::for_base(motion.clone())
                .with_parallel(self.config.optimizer_parallel)
                .with_cancel(cancel_rx.clone());
            let preload = self.config.optimizer_preload;

            let outcome = tokio::task::spawn_blocking(move || {
                let provider: Arc<dyn FrameProvider> = if preload {
                    Arc::new(frames.preload()?)
                } else {
                    Arc::new(frames)
                };
                optimizer.optimize(provider.as_ref(), range)
            })
            .await
            .map_err(|e| MediaError::internal(format!("optimizer task failed: {}", e)))??;

            match outcome {
                OptimizeOutcome::Found {
                    config,
                    resulting_duration,
                    evaluated,
                } => {
                    log.stage(
                        RenderStage::Optimize,
                        &format!(
                            "candidate {} fits: {:.3}s after trimming",
                            evaluated, resulting_duration
                        ),
                    );
                    save_motion_config(&config_path, &config).await?;
                    motion = config;
                }
                OptimizeOutcome::NotFound { evaluated } => {
                    log.notice(&format!(
                        "no parameters reach {:.1}-{:.1}s after {} candidates; using saved parameters",
                        range.0, range.1, evaluated
                    ));
                }
            }
        }

        let run = detect_static_segments(
            source,
            motion,
            self.config.analysis_width,
            Some(cancel_rx),
        )
        .await?;
        log.stage(
            RenderStage::Detect,
            &format!(
                "{} static segment(s), {:.3}s",
                run.segments.len(),
                run.static_time()
            ),
        );
        Ok(run.segments)
    }
}
