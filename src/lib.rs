//! contourcam - periodic webcam capture with largest-contour highlighting.
//!
//! The pipeline: a capture source produces RGB frames, the highlight
//! stage grayscales each one, runs Canny edge detection, outlines the
//! largest contour it finds, and the result lands on a display sink. A
//! fixed-period orchestrator drives the cycle between explicit
//! start/stop transitions.
//!
//! Module map:
//! - [`capture`]: the `FrameSource` seam and camera backends
//! - [`highlight`]: the per-frame contour transformation
//! - [`display`]: the `DisplaySink` seam and shipped sinks
//! - [`orchestrator`]: the start/tick/stop state machine and worker
//! - [`config`]: daemon configuration (file + env)
//! - [`transcribe`]: the unrelated speech-to-text upload utility

pub mod capture;
pub mod config;
pub mod display;
pub mod frame;
pub mod highlight;
pub mod orchestrator;
pub mod transcribe;

pub use capture::{CameraConfig, CameraSource, FrameSource};
pub use config::DaemonConfig;
pub use display::{DisplaySink, NullSink, PngSink};
pub use highlight::{highlight, HighlightError, HighlightParams};
pub use orchestrator::{
    CaptureLoop, CaptureLoopHandle, LoopState, LoopStats, TickOutcome, TICK_PERIOD,
};
pub use transcribe::SttConfig;
