// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanner operations
//!
//! This module provides command-line functionality for:
//! - Reading codes from an image file
//! - Running the live scan pipeline against a replayed image
//! - Rendering a scan line overlay frame
//! - Showing the effective configuration

use chrono::Local;
use qrscan::backends::camera::LensPosition;
use qrscan::backends::camera::synthetic::{FrameSource, SyntheticProvider};
use qrscan::frame_processor::QrDetector;
use qrscan::overlay::{DrawSurface, RasterSurface, ScanLineAnimator, Viewport};
use qrscan::scanner::{HostEvent, ScanController, StartOptions, StaticPermissions};
use qrscan::session::HeadlessPreview;
use qrscan::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

/// Default folder name for saved freeze frames and overlay renders
const DEFAULT_SAVE_FOLDER: &str = "qrscan";

/// Options for the `scan` command
pub struct ScanArgs {
    pub image: PathBuf,
    /// Overrides the configured default lens
    pub lens: Option<LensPosition>,
    /// Overrides the configured default resolution tier
    pub resolution: Option<i32>,
    pub fps: u32,
    pub duration: u64,
    pub once: bool,
    pub output: Option<PathBuf>,
}

/// Options for the `overlay` command
pub struct OverlayArgs {
    pub elapsed_ms: u64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub status_bar: f64,
    pub background: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Detect codes in an image file and print them as JSON
pub fn read_image(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let detector = QrDetector::with_max_dimension(config.detector_max_dimension);

    let symbols = runtime()?.block_on(detector.read_image(path))?;
    if symbols.is_empty() {
        eprintln!("No codes found in {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&symbols)?);
    Ok(())
}

/// Run the scan pipeline against an image replayed as a camera
pub fn scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let source = FrameSource::from_image(&args.image, args.fps)?;
    let provider = SyntheticProvider::new().with_source(source);
    let preview = HeadlessPreview::new(Viewport::default());

    let rt = runtime()?;
    rt.block_on(async {
        let scanner = ScanController::new(
            Arc::new(provider),
            Arc::new(QrDetector::with_max_dimension(config.detector_max_dimension)),
            Box::new(preview.clone()),
            Arc::new(StaticPermissions::default()),
            &config,
        );

        let defaults = scanner.default_start_options();
        let options = StartOptions {
            lens: args.lens.unwrap_or(defaults.lens),
            resolution: args.resolution.unwrap_or(defaults.resolution),
        };

        if args.once {
            println!("Scanning {} ...", args.image.display());
            let symbols = scanner.scan_with(options).await?;
            println!("{}", serde_json::to_string_pretty(&symbols)?);
            return Ok(());
        }

        let mut events = scanner.subscribe();
        scanner.start_scan(options.clone()).await?;

        println!(
            "Scanning {} with the {} camera at {}",
            args.image.display(),
            options.lens,
            options.tier()
        );
        println!("Press Ctrl+C to stop early");

        // Set up Ctrl+C handler
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();
        ctrlc::set_handler(move || {
            stop_flag_clone.store(true, Ordering::SeqCst);
        })?;

        let start = Instant::now();
        let target_duration = Duration::from_secs(args.duration);
        while start.elapsed() < target_duration && !stop_flag.load(Ordering::SeqCst) {
            match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
                Ok(Ok(event)) => print_event(&event)?,
                Ok(Err(RecvError::Lagged(skipped))) => eprintln!("Skipped {} events", skipped),
                Ok(Err(RecvError::Closed)) => break,
                Err(_) => {}
            }
        }

        scanner.pause_scan().await?;
        match scanner.freeze_image().await {
            Some(frame) => {
                let output_path = output_path(args.output, "freeze")?;
                frame.to_rgba_image().save(&output_path)?;
                println!("Freeze frame saved: {}", output_path.display());
            }
            None => println!("No frame captured"),
        }

        let shown = preview.snapshot();
        println!("Overlay redraws: {}", shown.overlay_draws);

        scanner.stop_scan().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn print_event(event: &HostEvent) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

/// Render a single overlay frame to PNG
pub fn render_overlay(args: OverlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let viewport = Viewport::new(args.width, args.height)
        .with_status_bar(args.status_bar)
        .with_scale(args.scale);
    if viewport.is_empty() {
        return Err("Overlay size must be positive".into());
    }

    let mut animator = ScanLineAnimator::new(config.scan_line, viewport);
    let base = Instant::now();
    animator.start(base);

    // Tick just before the target so the trail direction is known
    let elapsed = Duration::from_millis(args.elapsed_ms);
    animator.tick(base + elapsed.saturating_sub(Duration::from_millis(16)));
    let frame = animator.tick(base + elapsed);

    let pixel_width = (viewport.width * viewport.scale).round() as u32;
    let pixel_height = (viewport.height * viewport.scale).round() as u32;
    let mut surface = match &args.background {
        Some(path) => {
            let background = image::open(path)?.to_rgba8();
            let background = image::imageops::resize(
                &background,
                pixel_width,
                pixel_height,
                image::imageops::FilterType::Triangle,
            );
            RasterSurface::with_background(background, viewport.scale)
        }
        None => RasterSurface::new(&viewport),
    };
    animator.draw(&mut surface as &mut dyn DrawSurface);

    let output_path = output_path(args.output, "overlay")?;
    surface.into_image().save(&output_path)?;

    println!(
        "Line at y = {:.1} ({}), progress {:.3}",
        frame.y,
        if frame.going_down { "down" } else { "up" },
        frame.progress
    );
    println!("Overlay saved: {}", output_path.display());
    Ok(())
}

/// Print the effective configuration (optionally writing the defaults)
pub fn show_config(write_default: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Config::path()?;
    if write_default {
        Config::default().save_to(&path)?;
        println!("Default configuration written: {}", path.display());
    }

    let config = Config::load();
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Use the given path or a timestamped file in the default folder
fn output_path(output: Option<PathBuf>, prefix: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = output {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        return Ok(path);
    }

    let dir = get_default_output_dir();
    std::fs::create_dir_all(&dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("{}_{}.png", prefix, timestamp)))
}

/// Get default output directory
fn get_default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}
