//! Narration render worker binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vnarr_media::{
    check_ffmpeg, check_ffprobe, detect_static_segments, load_motion_config, save_motion_config,
    FfmpegFrames, FfmpegRunner, FrameProvider, OptimizeOutcome, ParameterOptimizer,
};
use vnarr_models::{DurationSource, MotionConfig, NarrationRequest, SimilarityMetric, TextUnit};
use vnarr_narration::{BoundaryPolicy, Segmenter, SegmenterConfig};
use vnarr_worker::{EdgeTtsSynthesizer, NarrationPipeline, TaskStore, WorkerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Narrated video timeline renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a narration request (JSON file) end to end
    Render {
        /// Path to the request JSON
        request: PathBuf,
    },

    /// Split narration text into units and print them as JSON
    Segment {
        /// Text to split (reads --file when omitted)
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        max_chars: usize,
        #[arg(long, default_value_t = 5)]
        min_chars: usize,
        /// Known duration of the whole text, shared across pieces
        #[arg(long)]
        duration: Option<f64>,
        /// Cut only at sentence ends instead of the look-back window
        #[arg(long)]
        sentence: bool,
    },

    /// Detect static segments in a video
    Detect {
        video: PathBuf,
        /// Start from a persisted parameter file
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        min_static: Option<f64>,
        #[arg(long)]
        step: Option<u32>,
        #[arg(long, value_enum)]
        metric: Option<MetricArg>,
        /// Near-duplicate frame preset (histogram correlation)
        #[arg(long, conflicts_with_all = ["config", "metric"])]
        duplicates: bool,
    },

    /// Search for motion parameters that trim a video into a duration range
    Optimize {
        video: PathBuf,
        #[arg(long)]
        min: f64,
        #[arg(long)]
        max: f64,
        #[arg(long, value_enum)]
        metric: Option<MetricArg>,
        /// Scan candidates one at a time
        #[arg(long)]
        sequential: bool,
        /// Decode frames for every candidate instead of once into memory
        #[arg(long)]
        streaming: bool,
        /// Where to persist a matching configuration
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    Pixel,
    Histogram,
    Mse,
}

impl From<MetricArg> for SimilarityMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Pixel => SimilarityMetric::PixelDifference,
            MetricArg::Histogram => SimilarityMetric::HistogramCorrelation,
            MetricArg::Mse => SimilarityMetric::NormalizedMse,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production; stdout carries results
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("vnarr_worker=info,vnarr_media=info,vnarr_narration=info")
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Render { request } => render(request).await,
        Commands::Segment {
            text,
            file,
            max_chars,
            min_chars,
            duration,
            sentence,
        } => {
            let text = match (text, file) {
                (Some(t), _) => t,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("pass --text or --file"),
            };
            let policy = if sentence {
                BoundaryPolicy::Sentence
            } else {
                BoundaryPolicy::Windowed
            };
            let segmenter = Segmenter::new(
                SegmenterConfig::default()
                    .with_bounds(max_chars, min_chars)
                    .with_policy(policy),
            );

            let mut unit = TextUnit::narration(text);
            if let Some(secs) = duration {
                unit = unit.with_duration(secs, DurationSource::Measured);
            }
            print_json(&segmenter.segment(&[unit]))
        }
        Commands::Detect {
            video,
            config,
            threshold,
            min_static,
            step,
            metric,
            duplicates,
        } => {
            check_ffmpeg()?;
            let mut motion = if duplicates {
                MotionConfig::duplicate_frames()
            } else {
                match config {
                    Some(path) => load_motion_config(&path).await?,
                    None => MotionConfig::default(),
                }
            };
            if let Some(m) = metric {
                motion = motion.with_metric(m.into());
            }
            if let Some(t) = threshold {
                motion = motion.with_threshold(t);
            }
            if let Some(s) = min_static {
                motion = motion.with_min_static_duration(s);
            }
            if let Some(s) = step {
                motion = motion.with_sample_step(s);
            }

            let worker = WorkerConfig::from_env();
            let (cancel_tx, cancel_rx) = watch::channel(false);
            spawn_ctrl_c(move || {
                cancel_tx.send_replace(true);
            });

            let run = detect_static_segments(
                &video,
                motion.clone(),
                worker.analysis_width,
                Some(cancel_rx),
            )
            .await
            .with_context(|| format!("detecting static segments in {}", video.display()))?;
            let intervals: Vec<_> = run.segments.iter().map(|s| s.to_raw_interval()).collect();
            print_json(&json!({
                "config": motion,
                "segments": run.segments,
                "summary": run.summary(),
                "cut_intervals": intervals,
            }))
        }
        Commands::Optimize {
            video,
            min,
            max,
            metric,
            sequential,
            streaming,
            save,
        } => {
            check_ffmpeg()?;
            check_ffprobe()?;
            let worker = WorkerConfig::from_env();
            let base = match metric {
                Some(m) => MotionConfig::default().with_metric(m.into()),
                None => MotionConfig::default(),
            };

            let (cancel_tx, cancel_rx) = watch::channel(false);
            spawn_ctrl_c(move || {
                cancel_tx.send_replace(true);
            });

            let frames = FfmpegFrames::probe(&video, worker.analysis_width).await?;
            let optimizer = ParameterOptimizer::for_base(base)
                .with_parallel(!sequential)
                .with_cancel(cancel_rx);

            let outcome = tokio::task::spawn_blocking(move || {
                let provider: Arc<dyn FrameProvider> = if streaming {
                    Arc::new(frames)
                } else {
                    Arc::new(frames.preload()?)
                };
                optimizer.optimize(provider.as_ref(), (min, max))
            })
            .await
            .context("optimizer task panicked")??;

            if let (OptimizeOutcome::Found { config, .. }, Some(path)) = (&outcome, &save) {
                save_motion_config(path, config).await?;
                info!(path = %path.display(), "Saved motion parameters");
            }
            print_json(&outcome)
        }
    }
}

async fn render(request_path: PathBuf) -> anyhow::Result<()> {
    let body = tokio::fs::read_to_string(&request_path)
        .await
        .with_context(|| format!("reading {}", request_path.display()))?;
    let request = NarrationRequest::from_json(&body)
        .with_context(|| format!("parsing {}", request_path.display()))?;

    check_ffmpeg()?;
    check_ffprobe()?;

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store = TaskStore::new();
    let id = store.create();

    // Ctrl-C stops the claimed task and any ffmpeg the synthesizer has running.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = FfmpegRunner::new()
        .with_cancel(cancel_rx)
        .with_timeout(config.ffmpeg_timeout.as_secs());
    let synth = EdgeTtsSynthesizer::new(&config.tts_command, config.job_dir(id.as_str()))
        .with_runner(runner);
    synth.check_available()?;

    let cancel_store = store.clone();
    let cancel_id = id.clone();
    spawn_ctrl_c(move || {
        cancel_tx.send_replace(true);
        if let Err(e) = cancel_store.request_cancel(&cancel_id) {
            error!("Failed to cancel {}: {}", cancel_id, e);
        }
    });

    let pipeline = NarrationPipeline::new(config, synth);
    let result = pipeline.execute(&store, &id, &request).await;

    if let Some(record) = store.get(&id) {
        print_json(&record)?;
    }
    let output = result?;
    info!(plan = %output.plan_path.display(), "Render plan written");
    Ok(())
}

fn spawn_ctrl_c(on_signal: impl FnOnce() + Send + 'static) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            on_signal();
        }
    });
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
