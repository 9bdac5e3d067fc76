use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use gifnetor::{
    CleanupOutcome, ConversionWorkflow, ConvertError, DecoderLogLevel, FfmpegSource,
    FfmpegTranscoder, FramePipeline, GifOptions, OperationType, OutputNaming, ProgressCallback,
    ProgressInfo, TranscodeOptions, TransformEngine, Upload, UploadPolicy, WorkspaceConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  gifnetor convert clip.mp4 --out clip.gif\n  gifnetor convert clip.mov --engine ffmpeg --width 480 --json\n  gifnetor convert clip.mkv --quality 80 --factor 2 --progress --keep\n  gifnetor completions zsh > _gifnetor";

#[derive(Debug, Parser)]
#[command(
    name = "gifnetor",
    version,
    about = "Convert video clips into looping animated GIFs",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while converting.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg decoder log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Scratch directory for uploads and artifacts.
    #[arg(long, global = true, env = "GIFNETOR_WORKSPACE", default_value = "uploads")]
    workspace: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    /// Decode, downscale, and encode frame by frame.
    Frames,
    /// Delegate to an external ffmpeg process.
    Ffmpeg,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a video file into an animated GIF.
    #[command(
        about = "Convert a video to GIF",
        after_help = "Examples:\n  gifnetor convert clip.mp4\n  gifnetor convert clip.mp4 --engine ffmpeg --fps 15 --max-seconds 5"
    )]
    Convert {
        /// Input video (mp4, mov, mkv unless --allow is given).
        input: PathBuf,
        /// Conversion strategy.
        #[arg(long, value_enum, default_value_t = EngineKind::Frames)]
        engine: EngineKind,
        /// Where to write the GIF.
        #[arg(long, default_value = "output.gif")]
        out: PathBuf,
        /// Allow overwriting an existing output file.
        #[arg(long)]
        overwrite: bool,
        /// Keep the workspace files instead of cleaning up.
        #[arg(long)]
        keep: bool,
        /// Use the single shared output slot instead of per-request names.
        #[arg(long)]
        fixed_output: bool,
        /// Print a machine-readable summary.
        #[arg(long)]
        json: bool,
        /// Accepted extensions (repeatable).
        #[arg(long = "allow")]
        allowed_extensions: Vec<String>,
        /// Reject inputs larger than this many bytes.
        #[arg(long)]
        max_bytes: Option<u64>,
        /// Frame engine: lossy quality 1-100.
        #[arg(long, default_value_t = 50)]
        quality: u8,
        /// Frame engine: downscale factor.
        #[arg(long, default_value_t = 4)]
        factor: u32,
        /// Frame engine: disable changed-region optimisation.
        #[arg(long)]
        no_optimize: bool,
        /// Frame engine: delay between frames in hundredths of a second.
        #[arg(long, default_value_t = 0)]
        delay: u16,
        /// ffmpeg engine: program to run.
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
        /// ffmpeg engine: output frame rate (0 keeps the source rate).
        #[arg(long, default_value_t = 10)]
        fps: u32,
        /// ffmpeg engine: output width (0 keeps the source width).
        #[arg(long, default_value_t = 320)]
        width: u32,
        /// ffmpeg engine: maximum clip length in seconds (0 for no limit).
        #[arg(long, default_value_t = 10.0)]
        max_seconds: f64,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<DecoderLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(DecoderLogLevel::Quiet),
        "fatal" | "panic" => Some(DecoderLogLevel::Fatal),
        "error" => Some(DecoderLogLevel::Error),
        "warning" | "warn" => Some(DecoderLogLevel::Warning),
        "info" => Some(DecoderLogLevel::Info),
        "debug" | "verbose" | "trace" => Some(DecoderLogLevel::Debug),
        _ => None,
    }
}

fn max_duration(seconds: f64) -> Option<Duration> {
    if seconds.is_finite() && seconds > 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let label = match info.operation {
            OperationType::FrameDecoding => "decoding",
            OperationType::GifEncoding => "encoding",
            OperationType::Transcoding => "transcoding",
            _ => "converting",
        };
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        self.bar.set_message(label);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    if let Some(level) = &cli.global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        gifnetor::set_decoder_log_level(parsed);
    }

    match cli.command {
        Commands::Convert {
            input,
            engine,
            out,
            overwrite,
            keep,
            fixed_output,
            json,
            allowed_extensions,
            max_bytes,
            quality,
            factor,
            no_optimize,
            delay,
            ffmpeg,
            fps,
            width,
            max_seconds,
        } => {
            ensure_writable_path(&out, overwrite)?;

            let mut policy = UploadPolicy::new().with_max_bytes(max_bytes);
            if !allowed_extensions.is_empty() {
                policy = policy.with_allowed_extensions(&allowed_extensions);
            }
            let upload = policy.accept(Some(Upload::from_path(&input)?))?;

            let naming = if fixed_output {
                OutputNaming::Fixed
            } else {
                OutputNaming::PerRequest
            };
            let config = WorkspaceConfig::new(&cli.global.workspace).with_output_naming(naming);

            let progress = if cli.global.progress {
                Some(Arc::new(TerminalProgress::new()?))
            } else {
                None
            };

            let transform: Box<dyn TransformEngine> = match engine {
                EngineKind::Frames => {
                    let options = GifOptions::new()
                        .with_quality(quality)
                        .with_downscale_factor(factor)
                        .with_optimize(!no_optimize)
                        .with_frame_delay(delay);
                    let mut pipeline = FramePipeline::new(FfmpegSource::new(), options);
                    if let Some(progress) = &progress {
                        pipeline = pipeline.with_progress(progress.clone());
                    }
                    Box::new(pipeline)
                }
                EngineKind::Ffmpeg => {
                    let options = TranscodeOptions::new()
                        .with_program(ffmpeg)
                        .with_fps(Some(fps))
                        .with_width(Some(width))
                        .with_max_duration(max_duration(max_seconds));
                    let mut transcoder = FfmpegTranscoder::new(options);
                    if let Some(progress) = &progress {
                        transcoder = transcoder.with_progress(progress.clone());
                    }
                    Box::new(transcoder)
                }
            };

            let mut workflow = ConversionWorkflow::new(config, transform);
            let request = workflow.intake(Some(upload))?;
            if cli.global.verbose {
                eprintln!(
                    "stored {} ({}) at {}",
                    request.original_name(),
                    request.media_type(),
                    request.storage_path().display()
                );
            }

            let converted = workflow.convert().cloned();
            if let Some(progress) = &progress {
                progress.finish();
            }

            let outcome = converted.and_then(|result| {
                let delivery = workflow.deliver()?;
                fs::write(&out, &delivery.bytes)
                    .map_err(|error| ConvertError::StorageFailure {
                        path: out.clone(),
                        source: error,
                    })?;
                Ok((result, delivery.len()))
            });

            let cleaned = if keep {
                None
            } else {
                match workflow.cleanup() {
                    Ok(cleanup) => Some(cleanup),
                    Err(error) => {
                        eprintln!(
                            "{} {}",
                            "warning:".yellow().bold(),
                            format!("cleanup failed: {error}").yellow()
                        );
                        None
                    }
                }
            };

            let (result, size) = outcome?;
            let removed = match &cleaned {
                Some(CleanupOutcome::Removed(paths)) => paths.len(),
                _ => 0,
            };

            if json {
                let payload = json!({
                    "request_id": result.request_id.to_string(),
                    "output": out.display().to_string(),
                    "bytes": size,
                    "frame_count": result.frame_count,
                    "frame_size": result.frame_size.map(|(w, h)| json!({ "width": w, "height": h })),
                    "workspace_files_removed": removed,
                    "kept": keep,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                let frames = result
                    .frame_count
                    .map(|count| format!(" ({count} frames)"))
                    .unwrap_or_default();
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!("wrote {} bytes to {}{frames}", size, out.display()).green()
                );
                match cleaned {
                    Some(CleanupOutcome::Removed(_)) => {
                        println!("{} removed {removed} workspace file(s)", "cleanup".cyan().bold())
                    }
                    Some(CleanupOutcome::NothingToRemove) => {
                        println!("{} no workspace files were removed", "cleanup".cyan().bold())
                    }
                    None => {}
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "gifnetor", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        match error.downcast_ref::<ConvertError>() {
            Some(convert_error) => {
                eprintln!("{} {}", "error:".red().bold(), convert_error.user_message());
                log::debug!("{convert_error}");
            }
            None => eprintln!("{} {error}", "error:".red().bold()),
        }
        std::process::exit(1);
    }
}
