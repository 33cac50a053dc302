//! Display sinks.
//!
//! The capture loop pushes each processed frame through a `DisplaySink`.
//! The daemon has no windowing surface of its own, so the shipped sinks
//! are a discard sink and a latest-frame PNG writer; a GUI embedding
//! would implement the trait over its image widget.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::PathBuf;

/// A surface the capture loop can present frames on.
///
/// `set_image(None)` clears the surface; the orchestrator sends it once
/// on stop.
pub trait DisplaySink {
    fn set_image(&mut self, frame: Option<&RgbImage>) -> Result<()>;
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn set_image(&mut self, frame: Option<&RgbImage>) -> Result<()> {
        (**self).set_image(frame)
    }
}

/// Discards every frame. Useful for headless runs and benchmarks.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn set_image(&mut self, _frame: Option<&RgbImage>) -> Result<()> {
        Ok(())
    }
}

/// Writes the latest frame to a PNG file, overwriting on each update.
///
/// Clearing the surface removes the file, so the file's existence tracks
/// whether the loop is live.
pub struct PngSink {
    path: PathBuf,
}

impl PngSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DisplaySink for PngSink {
    fn set_image(&mut self, frame: Option<&RgbImage>) -> Result<()> {
        match frame {
            Some(frame) => frame
                .save_with_format(&self.path, image::ImageFormat::Png)
                .with_context(|| format!("write frame to {}", self.path.display())),
            None => match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => {
                    Err(err).with_context(|| format!("clear frame at {}", self.path.display()))
                }
            },
        }
    }
}
