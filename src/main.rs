// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use qrscan::backends::camera::LensPosition;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qrscan")]
#[command(about = "Camera barcode and QR code scanner")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read codes from an image file
    Read {
        /// Image file to scan
        image: PathBuf,
    },

    /// Run the live scan pipeline with an image file as the camera
    Scan {
        /// Image replayed as camera frames
        #[arg(short, long)]
        image: PathBuf,

        /// Camera lens, front or back (default: from the config file)
        #[arg(short, long)]
        lens: Option<String>,

        /// Resolution tier 0-3 for low, medium, high, ultra high (default: from the config file)
        #[arg(short, long)]
        resolution: Option<i32>,

        /// Replayed frames per second
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Stop at the first detection and print it
        #[arg(long)]
        once: bool,

        /// Freeze frame output path (default: ~/Pictures/qrscan/freeze_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render one scan line overlay frame
    Overlay {
        /// Animation time in milliseconds
        #[arg(short, long, default_value = "1000")]
        elapsed: u64,

        /// View width in points
        #[arg(long, default_value = "390")]
        width: f64,

        /// View height in points
        #[arg(long, default_value = "844")]
        height: f64,

        /// Device pixels per point
        #[arg(long, default_value = "3")]
        scale: f64,

        /// Status bar height in points
        #[arg(long, default_value = "47")]
        status_bar: f64,

        /// Image drawn under the overlay
        #[arg(short, long)]
        background: Option<PathBuf>,

        /// Output path (default: ~/Pictures/qrscan/overlay_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration file first
        #[arg(long)]
        write_default: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qrscan=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Read { image } => cli::read_image(&image),
        Commands::Scan {
            image,
            lens,
            resolution,
            fps,
            duration,
            once,
            output,
        } => cli::scan(cli::ScanArgs {
            image,
            lens: lens.as_deref().map(LensPosition::from_host),
            resolution,
            fps,
            duration,
            once,
            output,
        }),
        Commands::Overlay {
            elapsed,
            width,
            height,
            scale,
            status_bar,
            background,
            output,
        } => cli::render_overlay(cli::OverlayArgs {
            elapsed_ms: elapsed,
            width,
            height,
            scale,
            status_bar,
            background,
            output,
        }),
        Commands::Config { write_default } => cli::show_config(write_default),
    }
}
