mod json_sink;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::Receiver;

use facemood_core::capture::domain::camera_position::CameraPosition;
use facemood_core::capture::domain::capture_error::CaptureError;
use facemood_core::capture::domain::device_selector::DeviceSelector;
use facemood_core::capture::infrastructure::camera_frame_source::CameraFrameSource;
use facemood_core::capture::infrastructure::file_device_catalog::FileDeviceCatalog;
use facemood_core::classification::infrastructure::onnx_emotion_classifier::OnnxEmotionClassifier;
use facemood_core::detection::infrastructure::onnx_yolo_locator::OnnxYoloLocator;
use facemood_core::pipeline::infrastructure::threaded_emotion_pipeline::EmotionPipeline;
use facemood_core::pipeline::pipeline_config::{FacePolicy, PipelineConfig};
use facemood_core::pipeline::pipeline_coordinator::PipelineCoordinator;
use facemood_core::pipeline::pipeline_logger::LogPipelineLogger;
use facemood_core::pipeline::presentation::PresentationReceiver;
use facemood_core::preprocessing::domain::region_preprocessor::RegionPreprocessor;
use facemood_core::shared::constants::{EMOTION_MODEL_NAME, FACE_MODEL_NAME};
use facemood_core::shared::model_resolver;

use json_sink::JsonLinesSink;

/// How often the foreground loop drains results.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Live facial expression recognition over image-sequence cameras.
///
/// Each camera is a directory of still images played back at --fps.
/// Results are printed to stdout as JSON lines. Press Enter to switch
/// between the front and back camera.
#[derive(Parser)]
#[command(name = "facemood")]
struct Cli {
    /// Directory of images acting as the front camera.
    #[arg(long)]
    front: Option<PathBuf>,

    /// Directory of images acting as the back camera.
    #[arg(long)]
    back: Option<PathBuf>,

    /// Camera to start on: front or back.
    #[arg(long, default_value = "front")]
    start_position: String,

    /// Playback rate of each camera in frames per second (0 = unpaced).
    #[arg(long, default_value = "15")]
    fps: f64,

    /// Restart each image sequence when it runs out.
    #[arg(long = "loop")]
    looping: bool,

    /// Seconds to run before stopping.
    #[arg(long, default_value = "10")]
    duration: f64,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Face detection model (defaults to the model cache).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Emotion classification model (defaults to the model cache).
    #[arg(long)]
    emotion_model: Option<PathBuf>,

    /// Classify only the first detected face.
    #[arg(long)]
    primary_only: bool,

    /// Switch cameras automatically every N seconds.
    #[arg(long)]
    toggle_every: Option<f64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let start_position = parse_position(&cli.start_position)?;
    let source = build_source(&cli, start_position)?;
    let (coordinator, mut receiver) = build_coordinator(&cli)?;

    let mut pipeline = EmotionPipeline::new(Box::new(source), coordinator);
    let mut sink = JsonLinesSink::new(std::io::stdout().lock());
    let toggle_requests = spawn_stdin_listener();

    pipeline.start()?;
    let outcome = drive(&cli, &mut pipeline, &mut receiver, &mut sink, &toggle_requests);
    pipeline.stop();
    receiver.pump(&mut sink);

    pipeline.coordinator().log_summary();
    let stats = pipeline.stats();
    log::info!(
        "Published {} results ({} accepted, {} dropped busy, {} dropped stale, {} superseded, {} face failures)",
        stats.published,
        stats.accepted,
        stats.dropped_busy,
        stats.dropped_stale,
        stats.superseded,
        stats.face_failures
    );
    log::info!("{} lines written", sink.written());
    outcome
}

/// Foreground loop: drains results, handles camera switches, stops after
/// the configured duration.
fn drive(
    cli: &Cli,
    pipeline: &mut EmotionPipeline,
    receiver: &mut PresentationReceiver,
    sink: &mut JsonLinesSink<std::io::StdoutLock<'static>>,
    toggle_requests: &Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let run_for = Duration::from_secs_f64(cli.duration);
    let toggle_every = cli.toggle_every.map(Duration::from_secs_f64);
    let mut last_toggle = Instant::now();

    while started.elapsed() < run_for {
        receiver.pump(sink);

        let timer_due = toggle_every.is_some_and(|every| last_toggle.elapsed() >= every);
        let requested = toggle_requests.try_recv().is_ok();
        if timer_due || requested {
            toggle(pipeline)?;
            last_toggle = Instant::now();
        }

        std::thread::sleep(PUMP_INTERVAL);
    }
    Ok(())
}

fn toggle(pipeline: &mut EmotionPipeline) -> Result<(), CaptureError> {
    match pipeline.toggle_camera() {
        Ok(position) => {
            log::info!("Now using the {position} camera");
            Ok(())
        }
        Err(CaptureError::NoDeviceAvailable(position)) => {
            log::warn!("No {position} camera available; staying on the current camera");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn build_source(
    cli: &Cli,
    start_position: CameraPosition,
) -> Result<CameraFrameSource, CaptureError> {
    let mut catalog = FileDeviceCatalog::new(cli.fps, cli.looping);
    if let Some(dir) = &cli.front {
        catalog = catalog.with_directory(CameraPosition::Front, dir.clone());
    }
    if let Some(dir) = &cli.back {
        catalog = catalog.with_directory(CameraPosition::Back, dir.clone());
    }
    CameraFrameSource::new(Box::new(catalog), DeviceSelector::default(), start_position)
}

fn build_coordinator(
    cli: &Cli,
) -> Result<(PipelineCoordinator, PresentationReceiver), Box<dyn std::error::Error>> {
    let bundled = bundled_models_dir();

    log::info!("Resolving model: {FACE_MODEL_NAME}");
    let face_model =
        model_resolver::resolve(FACE_MODEL_NAME, cli.face_model.as_deref(), bundled.as_deref())?;
    log::info!("Resolving model: {EMOTION_MODEL_NAME}");
    let emotion_model = model_resolver::resolve(
        EMOTION_MODEL_NAME,
        cli.emotion_model.as_deref(),
        bundled.as_deref(),
    )?;

    let locator = OnnxYoloLocator::new(&face_model, cli.confidence)?;
    let classifier = OnnxEmotionClassifier::new(&emotion_model)?;

    let face_policy = if cli.primary_only {
        FacePolicy::PrimaryOnly
    } else {
        FacePolicy::AllFaces
    };
    let (coordinator, receiver) = PipelineCoordinator::new(
        Box::new(locator),
        RegionPreprocessor::default(),
        Box::new(classifier),
        PipelineConfig::default().with_face_policy(face_policy),
    );
    Ok((
        coordinator.with_logger(Box::new(LogPipelineLogger::default())),
        receiver,
    ))
}

/// `models/` next to the executable, for pre-packaged installs.
fn bundled_models_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

/// Forwards each line typed on stdin as a toggle request.
fn spawn_stdin_listener() -> Receiver<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

fn parse_position(value: &str) -> Result<CameraPosition, String> {
    match value {
        "front" => Ok(CameraPosition::Front),
        "back" => Ok(CameraPosition::Back),
        other => Err(format!(
            "Start position must be 'front' or 'back', got '{other}'"
        )),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.front.is_none() && cli.back.is_none() {
        return Err("At least one of --front or --back is required".into());
    }
    for dir in [&cli.front, &cli.back].into_iter().flatten() {
        check_dir(dir)?;
    }
    let start = parse_position(&cli.start_position)?;
    let start_dir = match start {
        CameraPosition::Front => &cli.front,
        CameraPosition::Back => &cli.back,
    };
    if start_dir.is_none() {
        return Err(format!("--start-position {start} needs a --{start} directory").into());
    }
    if !cli.fps.is_finite() || cli.fps < 0.0 {
        return Err(format!("FPS must be zero or positive, got {}", cli.fps).into());
    }
    if !cli.duration.is_finite() || cli.duration <= 0.0 {
        return Err(format!("Duration must be positive, got {}", cli.duration).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if let Some(every) = cli.toggle_every {
        if !every.is_finite() || every <= 0.0 {
            return Err(format!("Toggle interval must be positive, got {every}").into());
        }
    }
    for model in [&cli.face_model, &cli.emotion_model].into_iter().flatten() {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    Ok(())
}

fn check_dir(dir: &Path) -> Result<(), String> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(format!("Camera directory not found: {}", dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["facemood"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let parsed = cli(&["--front", "cam"]);
        assert_eq!(parsed.start_position, "front");
        assert_eq!(parsed.fps, 15.0);
        assert_eq!(parsed.duration, 10.0);
        assert_eq!(parsed.confidence, 0.5);
        assert!(!parsed.looping);
        assert!(!parsed.primary_only);
        assert!(parsed.toggle_every.is_none());
    }

    #[test]
    fn test_valid_arguments_pass() {
        let front = TempDir::new().unwrap();
        let back = TempDir::new().unwrap();
        let parsed = cli(&[
            "--front",
            front.path().to_str().unwrap(),
            "--back",
            back.path().to_str().unwrap(),
            "--start-position",
            "back",
            "--loop",
            "--toggle-every",
            "2.5",
        ]);
        assert!(validate(&parsed).is_ok());
    }

    #[rstest]
    #[case::no_cameras(&[])]
    #[case::bad_position(&["--start-position", "side"])]
    #[case::start_without_dir(&["--start-position", "back"])]
    #[case::negative_fps(&["--fps=-1"])]
    #[case::zero_duration(&["--duration", "0"])]
    #[case::confidence_too_high(&["--confidence", "1.5"])]
    #[case::zero_toggle(&["--toggle-every", "0"])]
    #[case::missing_model(&["--face-model", "/nonexistent/model.onnx"])]
    fn test_invalid_arguments_rejected(#[case] extra: &[&str]) {
        let front = TempDir::new().unwrap();
        let front_path = front.path().to_str().unwrap().to_string();
        let mut args: Vec<&str> = Vec::new();
        if !extra.is_empty() {
            args.extend_from_slice(&["--front", &front_path]);
        }
        args.extend_from_slice(extra);
        assert!(validate(&cli(&args)).is_err());
    }

    #[test]
    fn test_missing_camera_directory_rejected() {
        let parsed = cli(&["--front", "/nonexistent/camera"]);
        assert!(validate(&parsed).is_err());
    }

    #[rstest]
    #[case("front", CameraPosition::Front)]
    #[case("back", CameraPosition::Back)]
    fn test_parse_position(#[case] value: &str, #[case] expected: CameraPosition) {
        assert_eq!(parse_position(value).unwrap(), expected);
    }
}
