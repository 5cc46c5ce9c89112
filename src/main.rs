//! Cam-labeler binary: labels what the camera sees, once per second.

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use cam_labeler::{
    camera_session, AppConfig, CameraDevice, ColorLabeler, LabelingAnalyzer, LensFacing,
    LifecycleOwner, PreviewOutput, V4L2Device, V4l2Provider,
};
use clap::Parser;
use tracing::{info, warn};

/// How often the result loop checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Device indices probed by `--list`.
const MAX_PROBED_DEVICES: u32 = 10;

#[derive(Parser)]
#[command(name = "cam-labeler")]
#[command(about = "Label camera frames with an on-device labeler")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera to use (front or back), overrides the configuration
    #[arg(short, long)]
    facing: Option<LensFacing>,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(short, long)]
    duration: Option<u64>,

    /// List capture devices and exit
    #[arg(long)]
    list: bool,
}

fn main() {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=cam_labeler=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let result = if cli.list { list_devices() } else { run(&cli) };
    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    for index in 0..MAX_PROBED_DEVICES {
        if let Ok(device) = V4L2Device::open(index) {
            let caps = device.capabilities();
            println!("/dev/video{index}: {} ({}, {})", caps.card, caps.driver, caps.bus_info);
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(facing) = cli.facing {
        config.facing = facing;
    }

    let mut provider = V4l2Provider::v4l2()
        .with_devices(config.devices)
        .with_buffer_count(config.buffer_count)
        .with_rotation(config.rotation);
    let owner = LifecycleOwner::new();
    let (label_tx, label_rx) = mpsc::channel();

    let preview = config.preview;
    let analysis = config.analysis;
    let interval = config.label_interval();
    let max_labels = config.labeling.max_labels;
    let session = camera_session(owner.clone(), &mut provider, |session| {
        session
            .facing(config.facing)
            .preview(move |builder| {
                builder.width = preview.width;
                builder.height = preview.height;
                builder.aspect_ratio = preview.aspect_ratio;
                builder.on_output_update = Some(Box::new(|output: PreviewOutput| {
                    info!(
                        width = output.format.width,
                        height = output.format.height,
                        fourcc = %output.format.fourcc,
                        "Preview output ready"
                    );
                }));
            })
            .image_analysis(move |builder| {
                builder.width = analysis.width;
                builder.height = analysis.height;
                builder.aspect_ratio = analysis.aspect_ratio;
                builder.analyzer = Some(Box::new(
                    LabelingAnalyzer::new(ColorLabeler::new(), label_tx.clone())
                        .with_interval(interval)
                        .with_max_labels(max_labels),
                ));
            })
    })?;
    info!(use_cases = session.use_cases().len(), "Session built");

    let stop = owner.clone();
    ctrlc::set_handler(move || stop.destroy())?;

    owner.start();
    println!("Labeling the {} camera (press Ctrl+C to stop)", config.facing);

    let deadline = cli.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        match label_rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(summary)) => {
                println!();
                println!("== {}", summary.title);
                println!("{}", summary.text);
            }
            Ok(Err(err)) => warn!(%err, "Labeling failed"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if owner.is_destroyed() || deadline.is_some_and(|at| Instant::now() >= at) {
            break;
        }
    }

    owner.destroy();
    drop(session);
    provider.join()?;
    println!("Stopped");
    Ok(())
}
