mod angles;
mod capture;
mod control;
mod detect;
mod landmarks;
mod output;
mod overlay;
mod session;

use anyhow::{Context, Result};
use capture::{CaptureSource, WebcamCapture};
use clap::Parser;
use control::Command;
use detect::{DetectorOptions, HandTracker, HolisticTracker};
use output::{LoopbackSink, OutputSink};
use overlay::OverlayRenderer;
use session::{CaptureMode, TrackingSession};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Tracking mode active at startup
    #[arg(long, value_enum, default_value = "holistic")]
    mode: ModeArg,

    /// Path to the hand-tracking model (ONNX file)
    #[arg(long, default_value = "models/hand_tracker.onnx")]
    hand_model: String,

    /// Path to the holistic model (ONNX file)
    #[arg(long, default_value = "models/holistic_tracker.onnx")]
    holistic_model: String,

    /// Detector options file (TOML); defaults apply when omitted
    #[arg(long)]
    detector_options: Option<String>,

    /// Font used for angle labels
    #[arg(long, default_value = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")]
    font: String,

    /// Disable angle labels
    #[arg(long)]
    no_angles: bool,

    /// Show the segmentation mask instead of landmark overlays
    #[arg(long)]
    show_mask: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ModeArg {
    Hands,
    Holistic,
    Off,
}

impl From<ModeArg> for Option<CaptureMode> {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hands => Some(CaptureMode::Hands),
            ModeArg::Holistic => Some(CaptureMode::Holistic),
            ModeArg::Off => None,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Poselens starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);
    tracing::info!("Target FPS: {}", args.fps);

    let mut options = match &args.detector_options {
        Some(path) => DetectorOptions::load(path)?,
        None => DetectorOptions::default(),
    };
    if args.show_mask && !options.enable_segmentation {
        tracing::info!("Mask preview requested; enabling segmentation");
        options.enable_segmentation = true;
    }

    let mut capture = WebcamCapture::new(
        args.input_device,
        args.capture_width,
        args.capture_height,
    )
    .context("Failed to initialize webcam capture")?;

    let mut output = LoopbackSink::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;

    let hands = HandTracker::new(&args.hand_model, options.clone())
        .context("Failed to load hand-tracking model")?;
    let holistic = HolisticTracker::new(&args.holistic_model, options)
        .context("Failed to load holistic model")?;

    let mut session = TrackingSession::new(Box::new(hands), Box::new(holistic));
    session.set_mode(args.mode.into());

    let font_path = if args.no_angles {
        None
    } else {
        Some(args.font.clone())
    };
    let renderer = OverlayRenderer::new(
        args.output_width,
        args.output_height,
        font_path.as_deref().map(Path::new),
        !args.no_angles,
        args.show_mask,
    );

    capture.start().context("Failed to start capture")?;
    session.start();

    let commands = control::spawn_stdin_controller();
    tracing::info!("Commands: start, stop, hands, holistic, off, quit");

    run_pipeline(
        &mut capture,
        &mut output,
        &mut session,
        &renderer,
        &commands,
        args.fps,
    )
}

fn run_pipeline<C, O>(
    capture: &mut C,
    output: &mut O,
    session: &mut TrackingSession,
    renderer: &OverlayRenderer,
    commands: &Receiver<Command>,
    target_fps: u32,
) -> Result<()>
where
    C: CaptureSource,
    O: OutputSink,
{
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps as f32);
    let mut frame_count = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_detect_time = Duration::ZERO;
    let mut total_render_time = Duration::ZERO;

    tracing::info!("Starting main pipeline loop");

    loop {
        let loop_start = Instant::now();

        // Control commands apply between frames, never retroactively.
        for command in commands.try_iter() {
            match command {
                Command::Start => {
                    capture.start().context("Failed to start capture")?;
                    session.start();
                }
                Command::Stop => {
                    capture.stop().context("Failed to stop capture")?;
                    session.stop();
                }
                Command::Hands => session.set_mode(Some(CaptureMode::Hands)),
                Command::Holistic => session.set_mode(Some(CaptureMode::Holistic)),
                Command::Off => session.set_mode(None),
                Command::Quit => {
                    tracing::info!("Quit requested");
                    capture.stop().context("Failed to stop capture")?;
                    return Ok(());
                }
            }
        }

        if !session.is_running() {
            std::thread::sleep(frame_duration);
            continue;
        }

        let capture_start = Instant::now();
        let frame = capture.capture_frame().context("Failed to capture frame")?;
        total_capture_time += capture_start.elapsed();

        let rendered = match session.mode() {
            Some(mode) => {
                let detect_start = Instant::now();
                match session.infer(&frame) {
                    Some(result) => {
                        let detection = result.context("Detection failed")?;
                        total_detect_time += detect_start.elapsed();

                        // A stop issued while inference was in flight
                        // drops the result instead of drawing it.
                        if !session.is_running() {
                            continue;
                        }

                        let render_start = Instant::now();
                        let canvas = renderer.render(&frame, &detection, mode);
                        total_render_time += render_start.elapsed();
                        canvas
                    }
                    // In-flight slot taken: this frame is dropped.
                    None => continue,
                }
            }
            None => renderer.passthrough(&frame),
        };

        output
            .write_frame(&rendered)
            .context("Failed to write frame")?;

        frame_count += 1;

        if frame_count % 30 == 0 {
            let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_detect_ms = total_detect_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_render_ms = total_render_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let total_ms = avg_capture_ms + avg_detect_ms + avg_render_ms;
            tracing::info!(
                "Frame {}: capture={:.1}ms, detect={:.1}ms, render={:.1}ms, fps={:.1}, mode={}",
                frame_count,
                avg_capture_ms,
                avg_detect_ms,
                avg_render_ms,
                1000.0 / total_ms.max(0.001),
                session.active_detector_name().unwrap_or("off"),
            );
        }

        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, LandmarkDetector};
    use crate::landmarks::Landmark;
    use anyhow::anyhow;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};

    struct StubCapture {
        streaming: bool,
        frames_left: usize,
    }

    impl CaptureSource for StubCapture {
        fn start(&mut self) -> Result<()> {
            self.streaming = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.streaming = false;
            Ok(())
        }

        fn is_streaming(&self) -> bool {
            self.streaming
        }

        fn capture_frame(&mut self) -> Result<RgbImage> {
            if !self.streaming {
                return Err(anyhow!("stream not started"));
            }
            if self.frames_left == 0 {
                return Err(anyhow!("stub camera exhausted"));
            }
            self.frames_left -= 1;
            Ok(RgbImage::from_pixel(32, 32, Rgb([30, 30, 30])))
        }

        fn resolution(&self) -> (u32, u32) {
            (32, 32)
        }
    }

    struct MemorySink {
        frames: Vec<RgbImage>,
    }

    impl OutputSink for MemorySink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (32, 32)
        }
    }

    struct StubDetector {
        calls: Arc<AtomicUsize>,
    }

    impl LandmarkDetector for StubDetector {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn detect(&mut self, _frame: &RgbImage) -> Result<Detection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hand = (0..21)
                .map(|i| Landmark::new(0.1 + i as f32 * 0.04, 0.5, 0.0))
                .collect();
            Ok(Detection {
                hands: vec![hand],
                ..Detection::default()
            })
        }
    }

    fn harness(
        frames: usize,
    ) -> (
        StubCapture,
        MemorySink,
        TrackingSession,
        Arc<AtomicUsize>,
        OverlayRenderer,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = TrackingSession::new(
            Box::new(StubDetector {
                calls: calls.clone(),
            }),
            Box::new(StubDetector {
                calls: calls.clone(),
            }),
        );
        (
            StubCapture {
                streaming: false,
                frames_left: frames,
            },
            MemorySink { frames: Vec::new() },
            session,
            calls,
            OverlayRenderer::new(32, 32, None, false, false),
        )
    }

    #[test]
    fn pipeline_detects_and_writes_every_frame() {
        let (mut capture, mut sink, mut session, calls, renderer) = harness(3);
        capture.start().unwrap();
        session.start();
        session.set_mode(Some(CaptureMode::Hands));

        let (_tx, rx) = mpsc::channel::<Command>();
        drop(_tx);
        let result = run_pipeline(&mut capture, &mut sink, &mut session, &renderer, &rx, 1000);

        // The stub camera runs dry after three frames.
        assert!(result.is_err());
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Overlays landed on the output, not the bare camera frame.
        assert_ne!(sink.frames[0], RgbImage::from_pixel(32, 32, Rgb([30, 30, 30])));
    }

    #[test]
    fn pipeline_passes_through_when_tracking_is_off() {
        let (mut capture, mut sink, mut session, calls, renderer) = harness(2);
        capture.start().unwrap();
        session.start();
        session.set_mode(None);

        let (_tx, rx) = mpsc::channel::<Command>();
        drop(_tx);
        let result = run_pipeline(&mut capture, &mut sink, &mut session, &renderer, &rx, 1000);

        assert!(result.is_err());
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.frames[0], RgbImage::from_pixel(32, 32, Rgb([30, 30, 30])));
    }

    #[test]
    fn quit_command_ends_the_loop_cleanly() {
        let (mut capture, mut sink, mut session, _calls, renderer) = harness(10);
        capture.start().unwrap();
        session.start();
        session.set_mode(Some(CaptureMode::Hands));

        let (tx, rx) = mpsc::channel::<Command>();
        tx.send(Command::Quit).unwrap();
        let result = run_pipeline(&mut capture, &mut sink, &mut session, &renderer, &rx, 1000);

        assert!(result.is_ok());
        assert!(sink.frames.is_empty());
        assert!(!capture.is_streaming());
    }

    #[test]
    fn mode_commands_swap_the_route_between_frames() {
        let (mut capture, mut sink, mut session, calls, renderer) = harness(2);
        capture.start().unwrap();
        session.start();
        session.set_mode(Some(CaptureMode::Hands));

        // Both mode commands drain before the first frame; holistic wins.
        let (tx, rx) = mpsc::channel::<Command>();
        tx.send(Command::Hands).unwrap();
        tx.send(Command::Holistic).unwrap();
        drop(tx);
        let result = run_pipeline(&mut capture, &mut sink, &mut session, &renderer, &rx, 1000);

        assert!(result.is_err());
        assert_eq!(session.mode(), Some(CaptureMode::Holistic));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
