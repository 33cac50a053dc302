//! Periodic capture loop.
//!
//! `CaptureLoop` is the state machine: `Idle` until `start` opens the
//! capture session, `Capturing` while ticks run, back to `Idle` on
//! `stop`. The state is owned here and transitioned only by
//! `start`/`tick`/`stop` — there is no process-wide flag.
//!
//! `CaptureLoopHandle` is the runner: it moves the loop onto a dedicated
//! worker thread that fires one tick per period. The worker owns the
//! loop (and through it the capture session) exclusively, so at most one
//! tick is ever in flight; when a tick overruns its period the missed
//! deadlines are skipped rather than bunched up.
//!
//! Per-tick failures never escape: a read error or a frame with no
//! contours is logged and the next tick proceeds. Stopping always
//! releases the device and clears the sink, even if the last tick
//! failed.

use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::capture::FrameSource;
use crate::display::DisplaySink;
use crate::frame;
use crate::highlight::{highlight, HighlightParams};

/// Default tick period: one frame every 33 ms, roughly 30 fps.
pub const TICK_PERIOD: Duration = Duration::from_millis(33);

/// Capture loop lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// No capture session; the device is free.
    Idle,
    /// Session open, ticks running.
    Capturing,
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A processed frame reached the display sink.
    Displayed,
    /// The device returned an empty frame; nothing was shown.
    SkippedEmpty,
    /// Read, highlight, or display failed; logged and swallowed.
    Failed,
    /// The loop is not capturing; the tick was a no-op.
    NotCapturing,
}

/// Tick counters, shared between the worker and observers.
#[derive(Clone, Default)]
pub struct SharedStats {
    ticks: Arc<AtomicU64>,
    displayed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl SharedStats {
    pub fn snapshot(&self) -> LoopStats {
        LoopStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            displayed: self.displayed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the loop's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub displayed: u64,
    pub failed: u64,
}

/// The capture-process-display state machine.
pub struct CaptureLoop<S, D> {
    source: S,
    sink: D,
    params: HighlightParams,
    state: LoopState,
    stats: SharedStats,
}

impl<S: FrameSource, D: DisplaySink> CaptureLoop<S, D> {
    pub fn new(source: S, sink: D, params: HighlightParams) -> Self {
        Self {
            source,
            sink,
            params,
            state: LoopState::Idle,
            stats: SharedStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Label for the UI toggle driving this loop.
    pub fn button_label(&self) -> &'static str {
        match self.state {
            LoopState::Idle => "Start Camera",
            LoopState::Capturing => "Stop Camera",
        }
    }

    /// Shared counters for health logging from another thread.
    pub fn stats_handle(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats.snapshot()
    }

    /// Open the capture session and enter `Capturing`.
    ///
    /// On failure the loop stays `Idle` and the error is reported to the
    /// caller exactly once; no ticks run.
    pub fn start(&mut self) -> Result<()> {
        if self.state == LoopState::Capturing {
            bail!("capture loop already running");
        }
        self.source.open().context("open capture device")?;
        self.state = LoopState::Capturing;
        log::info!("capture loop started");
        Ok(())
    }

    /// Run one capture-process-display cycle.
    ///
    /// Failures are logged and absorbed here; the outcome value exists
    /// so callers and tests can observe what happened.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != LoopState::Capturing {
            return TickOutcome::NotCapturing;
        }
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let captured = match self.source.read() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame read failed: {err:#}");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::Failed;
            }
        };

        if frame::is_empty(&captured) {
            return TickOutcome::SkippedEmpty;
        }

        let annotated = match highlight(&captured, &self.params) {
            Ok(annotated) => annotated,
            Err(err) => {
                log::warn!("highlight failed: {err}");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::Failed;
            }
        };

        match self.sink.set_image(Some(&annotated)) {
            Ok(()) => {
                self.stats.displayed.fetch_add(1, Ordering::Relaxed);
                TickOutcome::Displayed
            }
            Err(err) => {
                log::warn!("display update failed: {err:#}");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                TickOutcome::Failed
            }
        }
    }

    /// Halt capturing: release the device, clear the display, return to
    /// `Idle`. The device is released unconditionally — shutdown never
    /// leaves it held. No-op while `Idle`.
    pub fn stop(&mut self) {
        if self.state == LoopState::Idle {
            return;
        }
        self.source.release();
        if let Err(err) = self.sink.set_image(None) {
            log::warn!("failed to clear display on stop: {err:#}");
        }
        self.state = LoopState::Idle;
        log::info!("capture loop stopped");
    }
}

// ----------------------------------------------------------------------------
// Threaded runner
// ----------------------------------------------------------------------------

/// Handle to a capture loop running on its own worker thread.
///
/// Dropping the handle without calling [`stop`](Self::stop) signals the
/// worker to shut down but does not wait for it.
pub struct CaptureLoopHandle {
    ctrl_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<LoopStats>,
    thread: Option<JoinHandle<()>>,
    stats: SharedStats,
    period: Duration,
}

impl CaptureLoopHandle {
    /// Start the loop and spawn the tick worker.
    ///
    /// `start` runs on the calling thread so a device-open failure is
    /// returned directly, before any thread exists.
    pub fn spawn<S, D>(mut capture: CaptureLoop<S, D>, period: Duration) -> Result<Self>
    where
        S: FrameSource + Send + 'static,
        D: DisplaySink + Send + 'static,
    {
        capture.start()?;
        let stats = capture.stats_handle();

        let (ctrl_tx, ctrl_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<LoopStats>();

        let thread = std::thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || {
                run_worker(&mut capture, &ctrl_rx, period);
                capture.stop();
                let _ = done_tx.send(capture.stats());
            })
            .context("spawn capture worker thread")?;

        Ok(Self {
            ctrl_tx,
            done_rx,
            thread: Some(thread),
            stats,
            period,
        })
    }

    /// Snapshot of the loop's counters, for health logging.
    pub fn stats(&self) -> LoopStats {
        self.stats.snapshot()
    }

    /// Signal the worker to stop and wait up to one tick period for it
    /// to acknowledge.
    ///
    /// The worker releases the device and clears the sink on its way out
    /// regardless of this wait. Returns the final counters, or `None` if
    /// the in-flight tick did not complete within the bound.
    pub fn stop(mut self) -> Option<LoopStats> {
        let _ = self.ctrl_tx.send(());
        match self.done_rx.recv_timeout(self.period) {
            Ok(stats) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                Some(stats)
            }
            Err(_) => {
                log::warn!(
                    "in-flight tick did not finish within {:?}; worker will release the device on exit",
                    self.period
                );
                // Leave the thread detached; it holds the only session
                // handle and releases it when the tick returns.
                self.thread.take();
                None
            }
        }
    }
}

impl Drop for CaptureLoopHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.ctrl_tx.send(());
        }
    }
}

/// Tick at a fixed period until a stop signal arrives.
fn run_worker<S: FrameSource, D: DisplaySink>(
    capture: &mut CaptureLoop<S, D>,
    ctrl_rx: &mpsc::Receiver<()>,
    period: Duration,
) {
    let mut next_tick = Instant::now();
    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match ctrl_rx.recv_timeout(wait) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        capture.tick();
        next_tick += period;

        // A slow tick pushes past later deadlines; skip them instead of
        // firing a burst of catch-up ticks.
        let now = Instant::now();
        if next_tick < now {
            let mut skipped = 0u32;
            while next_tick < now {
                next_tick += period;
                skipped += 1;
            }
            log::debug!("tick overran its period; skipped {skipped} deadline(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct ScriptedSource {
        open: bool,
        fail_open: bool,
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                bail!("device unavailable");
            }
            self.open = true;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn read(&mut self) -> Result<RgbImage> {
            Ok(RgbImage::new(0, 0))
        }

        fn release(&mut self) {
            self.open = false;
        }
    }

    #[test]
    fn labels_track_state() {
        let source = ScriptedSource {
            open: false,
            fail_open: false,
        };
        let mut capture = CaptureLoop::new(source, crate::display::NullSink, Default::default());

        assert_eq!(capture.state(), LoopState::Idle);
        assert_eq!(capture.button_label(), "Start Camera");

        capture.start().unwrap();
        assert_eq!(capture.state(), LoopState::Capturing);
        assert_eq!(capture.button_label(), "Stop Camera");
        assert!(capture.start().is_err(), "double start must fail");

        capture.stop();
        assert_eq!(capture.state(), LoopState::Idle);
        assert_eq!(capture.button_label(), "Start Camera");
        capture.stop(); // no-op while idle
    }

    #[test]
    fn failed_open_stays_idle() {
        let source = ScriptedSource {
            open: false,
            fail_open: true,
        };
        let mut capture = CaptureLoop::new(source, crate::display::NullSink, Default::default());

        assert!(capture.start().is_err());
        assert_eq!(capture.state(), LoopState::Idle);
        assert_eq!(capture.button_label(), "Start Camera");
        assert_eq!(capture.stats().ticks, 0);
    }

    #[test]
    fn empty_frames_are_skipped_silently() {
        let source = ScriptedSource {
            open: false,
            fail_open: false,
        };
        let mut capture = CaptureLoop::new(source, crate::display::NullSink, Default::default());
        capture.start().unwrap();

        assert_eq!(capture.tick(), TickOutcome::SkippedEmpty);
        let stats = capture.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.displayed, 0);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn tick_while_idle_is_a_no_op() {
        let source = ScriptedSource {
            open: false,
            fail_open: false,
        };
        let mut capture = CaptureLoop::new(source, crate::display::NullSink, Default::default());

        assert_eq!(capture.tick(), TickOutcome::NotCapturing);
        assert_eq!(capture.stats().ticks, 0);
    }
}
