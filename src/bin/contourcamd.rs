//! contourcamd - capture loop daemon
//!
//! Wires the configured camera source through the contour highlighter
//! into a display sink, ticking at the configured period until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::mpsc;
use std::time::Duration;

use contourcam::{
    CameraSource, CaptureLoop, CaptureLoopHandle, DaemonConfig, DisplaySink, NullSink, PngSink,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = DaemonConfig::load()?;
    let source = CameraSource::new(cfg.camera.clone())?;
    let sink: Box<dyn DisplaySink + Send> = match &cfg.png_path {
        Some(path) => Box::new(PngSink::new(path.clone())),
        None => Box::new(NullSink),
    };

    let capture = CaptureLoop::new(source, sink, cfg.highlight.clone());
    let handle = CaptureLoopHandle::spawn(capture, cfg.tick_period)?;
    log::info!(
        "capturing from {} every {} ms",
        cfg.camera.device,
        cfg.tick_period.as_millis()
    );
    if let Some(path) = &cfg.png_path {
        log::info!("latest frame written to {}", path.display());
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("install ctrl-c handler")?;

    loop {
        match shutdown_rx.recv_timeout(HEALTH_LOG_INTERVAL) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let stats = handle.stats();
                log::info!(
                    "health: ticks={} displayed={} failed={}",
                    stats.ticks,
                    stats.displayed,
                    stats.failed
                );
            }
        }
    }

    log::info!("shutting down");
    match handle.stop() {
        Some(stats) => log::info!(
            "stopped: {} ticks, {} displayed, {} failed",
            stats.ticks,
            stats.displayed,
            stats.failed
        ),
        None => log::warn!("capture worker did not acknowledge stop in time"),
    }
    Ok(())
}
