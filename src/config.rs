use anyhow::{anyhow, Result};
use image::Rgb;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CameraConfig;
use crate::highlight::HighlightParams;
use crate::orchestrator::TICK_PERIOD;

const DEFAULT_DEVICE: &str = "stub://camera";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct DaemonConfigFile {
    tick_ms: Option<u64>,
    camera: Option<CameraConfigFile>,
    highlight: Option<HighlightConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct HighlightConfigFile {
    canny_low: Option<f32>,
    canny_high: Option<f32>,
    thickness: Option<u32>,
    color: Option<[u8; 3]>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    png_path: Option<PathBuf>,
}

/// Resolved daemon configuration: defaults, then the optional JSON file
/// named by `CONTOURCAM_CONFIG`, then environment overrides.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub camera: CameraConfig,
    pub tick_period: Duration,
    pub highlight: HighlightParams,
    /// Where the latest processed frame is written; `None` discards it.
    pub png_path: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CONTOURCAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DaemonConfigFile) -> Self {
        let defaults = HighlightParams::default();
        let camera = CameraConfig {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .camera
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_HEIGHT),
        };
        let highlight = HighlightParams {
            canny_low: file
                .highlight
                .as_ref()
                .and_then(|h| h.canny_low)
                .unwrap_or(defaults.canny_low),
            canny_high: file
                .highlight
                .as_ref()
                .and_then(|h| h.canny_high)
                .unwrap_or(defaults.canny_high),
            thickness: file
                .highlight
                .as_ref()
                .and_then(|h| h.thickness)
                .unwrap_or(defaults.thickness),
            color: file
                .highlight
                .and_then(|h| h.color)
                .map(Rgb)
                .unwrap_or(defaults.color),
        };
        let tick_period = file
            .tick_ms
            .map(Duration::from_millis)
            .unwrap_or(TICK_PERIOD);
        let png_path = file.display.and_then(|display| display.png_path);
        Self {
            camera,
            tick_period,
            highlight,
            png_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("CONTOURCAM_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(path) = std::env::var("CONTOURCAM_OUT") {
            if !path.trim().is_empty() {
                self.png_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(tick_ms) = std::env::var("CONTOURCAM_TICK_MS") {
            let millis: u64 = tick_ms
                .parse()
                .map_err(|_| anyhow!("CONTOURCAM_TICK_MS must be an integer number of ms"))?;
            self.tick_period = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tick_period.is_zero() {
            return Err(anyhow!("tick period must be greater than zero"));
        }
        if self.highlight.canny_low > self.highlight.canny_high {
            return Err(anyhow!(
                "canny_low ({}) must not exceed canny_high ({})",
                self.highlight.canny_low,
                self.highlight.canny_high
            ));
        }
        if self.highlight.thickness == 0 {
            return Err(anyhow!("outline thickness must be at least 1"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DaemonConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
