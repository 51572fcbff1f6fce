// SPDX-License-Identifier: MPL-2.0

//! qrscan - camera barcode and QR code scanning
//!
//! This library drives a camera capture session, runs throttled barcode
//! detection on the delivered frames, animates a scan line overlay over the
//! preview and reports results to a host through serializable events.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera device and capture session abstraction
//! - [`frame_processor`]: Detection throttle, freeze-frame buffer and QR detector
//! - [`overlay`]: Scan line animation and drawing
//! - [`session`]: Capture session controller and its execution contexts
//! - [`scanner`]: Host-facing facade and event types
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let scanner = ScanController::new(provider, detector, preview, permissions, &Config::load());
//! let mut events = scanner.subscribe();
//! scanner.start_scan(StartOptions::default()).await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod overlay;
pub mod scanner;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use constants::ResolutionTier;
pub use errors::{ScanError, ScanResult};
pub use frame_processor::{DetectedSymbol, Symbology};
pub use scanner::{HostEvent, ScanController, StartOptions};
pub use session::{CaptureSessionController, ScanEvent, SessionState};
