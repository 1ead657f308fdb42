// src/main.rs
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use pose_segments::data::{open_log, LogFormat, TimestampStyle};
use pose_segments::replay::FrameReader;
use pose_segments::{build_classifier, ClassifierKind, EngineConfig, Session, TrackManager};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassifierArg {
    Rules,
    Sequence,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Jsonl,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimestampArg {
    /// Frame timestamps are epoch seconds, written as local date and time
    Wallclock,
    /// Frame timestamps are written as seconds with two decimals
    Seconds,
}

#[derive(Parser)]
#[command(name = "pose-segments")]
#[command(about = "Segment recorded pose observations into per-person action durations")]
#[command(version)]
struct Cli {
    /// JSON-lines observation stream, one frame per line
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Engine configuration (JSON); omitted fields use defaults
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[arg(long = "classifier", value_enum, default_value = "rules")]
    classifier: ClassifierArg,

    /// Template model file, required with --classifier sequence
    #[arg(long = "model", required_if_eq("classifier", "sequence"))]
    model: Option<PathBuf>,

    /// Label mapping (JSON array of class names), required with --classifier sequence
    #[arg(long = "labels", required_if_eq("classifier", "sequence"))]
    labels: Option<PathBuf>,

    /// Output directory (defaults to Documents/PoseSegments)
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    #[arg(long = "format", value_enum, default_value = "csv")]
    format: FormatArg,

    /// Session name (defaults to session_<date>_<time>)
    #[arg(short = 's', long = "session")]
    session: Option<String>,

    /// How segment end times are written; use wallclock only for streams
    /// recorded with epoch-second timestamps
    #[arg(long = "timestamps", value_enum, default_value = "seconds")]
    timestamps: TimestampArg,

    /// Show debug messages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("PoseSegments")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let kind = match cli.classifier {
        ClassifierArg::Rules => ClassifierKind::Rules,
        ClassifierArg::Sequence => ClassifierKind::Sequence {
            model: cli.model.clone().context("--model is required for the sequence classifier")?,
            labels: cli.labels.clone().context("--labels is required for the sequence classifier")?,
        },
    };
    let classifier = build_classifier(&kind, &config)?;

    let format = match cli.format {
        FormatArg::Csv => LogFormat::Csv,
        FormatArg::Jsonl => LogFormat::JsonLines,
    };
    let style = match cli.timestamps {
        TimestampArg::Wallclock => TimestampStyle::Wallclock,
        TimestampArg::Seconds => TimestampStyle::Seconds,
    };
    let session_name = cli
        .session
        .clone()
        .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));
    let log_path = cli
        .output_dir
        .clone()
        .unwrap_or_else(default_output_dir)
        .join(&session_name)
        .join(format!("person_actions_log.{}", format.extension()));

    let sink = open_log(format, &log_path, style)
        .with_context(|| format!("Failed to create segment log {}", log_path.display()))?;
    let frames = FrameReader::open(&cli.input, config.frame_skip)?;
    info!("Replaying {} into {}", frames.source(), log_path.display());

    let mut session = Session::new(TrackManager::new(classifier, &config), sink);
    let summary = session.run(frames)?;

    for (label, (count, seconds)) in &summary.per_label {
        info!("{}: {} segments, {:.2}s total", label, count, seconds);
    }
    println!("{}", log_path.display());
    Ok(())
}
