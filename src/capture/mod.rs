//! Frame capture sources.
//!
//! This module provides the device seam for the capture loop:
//! - `FrameSource`: the open/read/release contract the orchestrator
//!   drives. A session exists between `open` and `release`, and at most
//!   one session is open per source.
//! - `CameraSource`: backend-switching camera. `stub://` device strings
//!   select a synthetic scene that is always available; real device
//!   paths require the `capture-v4l2` feature.
//!
//! Sources produce owned `RgbImage` frames. A zero-dimension frame means
//! the device had nothing to deliver this tick and the caller should
//! skip silently.

#[cfg(feature = "capture-v4l2")]
mod v4l2;

use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

/// A camera session: open it, read frames from it, release it.
///
/// Only the orchestrator holds a source, so reads never race. `release`
/// is idempotent; `read` on a closed source is an error.
pub trait FrameSource {
    /// Open the capture session. Fails if the device is unavailable or a
    /// session is already open.
    fn open(&mut self) -> Result<()>;

    /// Whether a session is currently open.
    fn is_open(&self) -> bool;

    /// Read one frame. A 0x0 frame means nothing was captured this tick.
    fn read(&mut self) -> Result<RgbImage>;

    /// Close the session and free the device. Safe to call when closed.
    fn release(&mut self);
}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device string: "stub://..." for the synthetic scene, or a device
    /// node such as "/dev/video0" (requires the `capture-v4l2` feature).
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Backend-switching camera source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "capture-v4l2")]
    Device(v4l2::DeviceSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticSource::new(config)),
            })
        } else {
            #[cfg(feature = "capture-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::Device(v4l2::DeviceSource::new(config)?),
                })
            }
            #[cfg(not(feature = "capture-v4l2"))]
            {
                bail!(
                    "device '{}' requires the capture-v4l2 feature",
                    config.device
                )
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.open(),
        }
    }

    fn is_open(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_open(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.is_open(),
        }
    }

    fn read(&mut self) -> Result<RgbImage> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.read(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.read(),
        }
    }

    fn release(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.release(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and camera-less machines
// ----------------------------------------------------------------------------

/// Synthetic scene: a bright rectangle drifting over a dark background.
///
/// The rectangle guarantees the highlight stage always has a contour to
/// find, which makes the full pipeline exercisable without hardware.
struct SyntheticSource {
    config: CameraConfig,
    open: bool,
    frame_count: u64,
}

impl SyntheticSource {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            open: false,
            frame_count: 0,
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.open {
            bail!("capture session already open on {}", self.config.device);
        }
        self.open = true;
        log::info!("CameraSource: opened {} (synthetic)", self.config.device);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self) -> Result<RgbImage> {
        if !self.open {
            bail!("capture session not open; call open() first");
        }
        self.frame_count += 1;
        Ok(self.generate_scene())
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            log::info!("CameraSource: released {}", self.config.device);
        }
    }

    fn generate_scene(&self) -> RgbImage {
        let width = self.config.width;
        let height = self.config.height;
        let mut frame = RgbImage::from_pixel(width, height, Rgb([16, 16, 16]));

        // Drift the rectangle a little each frame so consecutive frames
        // differ, the way a live scene would.
        let rect_w = (width / 4).max(1);
        let rect_h = (height / 4).max(1);
        let span_x = (width - rect_w).max(1) as u64;
        let span_y = (height - rect_h).max(1) as u64;
        let x = ((self.frame_count * 7) % span_x) as i32;
        let y = ((self.frame_count * 3) % span_y) as i32;

        draw_filled_rect_mut(
            &mut frame,
            Rect::at(x, y).of_size(rect_w, rect_h),
            Rgb([235, 235, 235]),
        );
        frame
    }
}
