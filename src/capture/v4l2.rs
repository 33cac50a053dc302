//! V4L2 device backend.
//!
//! Captures RGB frames from a local device node (e.g. /dev/video0) via
//! libv4l with memory-mapped buffers. The stream borrows the device, so
//! the pair is held in a self-referencing cell; dropping the cell tears
//! down the stream before the device, which releases the node.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;

use super::CameraConfig;

pub(super) struct DeviceSource {
    config: CameraConfig,
    state: Option<DeviceState>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceSource {
    pub(super) fn new(config: CameraConfig) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
        })
    }

    pub(super) fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        if self.state.is_some() {
            return Err(anyhow!(
                "capture session already open on {}",
                self.config.device
            ));
        }

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "CameraSource: opened {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    pub(super) fn is_open(&self) -> bool {
        self.state.is_some()
    }

    pub(super) fn read(&mut self) -> Result<RgbImage> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .context("capture session not open; call open() first")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .context("capture v4l2 frame")?;

        let expected = self.active_width as usize * self.active_height as usize * 3;
        if buf.len() < expected {
            return Err(anyhow!(
                "v4l2 buffer too small: {} bytes for {}x{}",
                buf.len(),
                self.active_width,
                self.active_height
            ));
        }

        RgbImage::from_raw(
            self.active_width,
            self.active_height,
            buf[..expected].to_vec(),
        )
        .ok_or_else(|| anyhow!("v4l2 buffer did not form a valid RGB frame"))
    }

    pub(super) fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("CameraSource: released {}", self.config.device);
        }
    }
}
