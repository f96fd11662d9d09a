//! Device capture loop: capture → relay → report → sleep, forever
//!
//! Startup runs once (Wi-Fi association, then camera init). After that each
//! cycle captures one frame, posts it to the relay, logs the outcome, and
//! sleeps a fixed interval regardless of how the cycle went. A fixed interval
//! bounds the request rate seen by the relay whatever the failure mode.
//!
//! Failures never stop the loop: a capture failure skips the cycle, a relay
//! failure is logged. The camera is not re-initialised mid-run.

use std::convert::Infallible;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capture::{CameraDriver, CameraResource, CaptureError, HardwareError};
use crate::client::{Description, RelayClient, RelayError};
use crate::network::{AssociationError, NetworkAssociationManager, StationInterface};

/// Where the loop currently is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Capturing,
    Relaying,
    Reporting,
    Sleeping,
}

/// Result of one cycle
#[derive(Debug)]
pub enum CycleOutcome {
    Described {
        frame_bytes: usize,
        description: Description,
    },
    /// No frame; the cycle was skipped
    CaptureFailed(CaptureError),
    RelayFailed {
        frame_bytes: usize,
        error: RelayError,
    },
}

impl CycleOutcome {
    pub fn description(&self) -> Option<&Description> {
        match self {
            CycleOutcome::Described { description, .. } => Some(description),
            _ => None,
        }
    }
}

/// One finished cycle, as published to observers
#[derive(Debug)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub outcome: CycleOutcome,
}

/// Fatal startup failures; the device halts on these
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("network association failed: {0}")]
    Association(#[from] AssociationError),

    #[error("camera initialisation failed: {0}")]
    Camera(#[from] HardwareError),
}

type ReclaimHook = Box<dyn FnMut() + Send>;

/// Reports buffered for a subscriber before new ones are dropped
pub const REPORT_QUEUE_CAPACITY: usize = 16;

/// Drives the device for the lifetime of the process
pub struct CaptureLoop<S, D> {
    network: NetworkAssociationManager<S>,
    camera: CameraResource<D>,
    relay: RelayClient,
    interval: Duration,
    phase: CyclePhase,
    cycles: u64,
    /// Set after an unreachable relay; the next cycle checks association first
    reassociate: bool,
    reclaim: Option<ReclaimHook>,
    reports: Option<mpsc::Sender<CycleReport>>,
}

impl<S: StationInterface, D: CameraDriver> CaptureLoop<S, D> {
    pub fn new(
        network: NetworkAssociationManager<S>,
        camera: CameraResource<D>,
        relay: RelayClient,
        interval: Duration,
    ) -> Self {
        Self {
            network,
            camera,
            relay,
            interval,
            phase: CyclePhase::Idle,
            cycles: 0,
            reassociate: false,
            reclaim: None,
            reports: None,
        }
    }

    /// Best-effort memory reclaim run at the start of every cycle
    pub fn with_reclaim_hook(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.reclaim = Some(Box::new(hook));
        self
    }

    /// Publish finished cycles on the returned channel.
    ///
    /// At most `REPORT_QUEUE_CAPACITY` reports wait for the subscriber; while
    /// the queue is full, new reports are dropped.
    pub fn subscribe(&mut self) -> mpsc::Receiver<CycleReport> {
        let (tx, rx) = mpsc::channel(REPORT_QUEUE_CAPACITY);
        self.reports = Some(tx);
        rx
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn network(&self) -> &NetworkAssociationManager<S> {
        &self.network
    }

    pub fn camera(&self) -> &CameraResource<D> {
        &self.camera
    }

    /// Associate with Wi-Fi, then bring up the camera. Runs once per process.
    pub async fn start(&mut self) -> Result<(), StartupError> {
        self.network.ensure_connected().await?;
        self.camera.init().await?;
        info!(
            endpoint = %self.relay.endpoint(),
            interval_secs = self.interval.as_secs_f64(),
            "Device ready"
        );
        Ok(())
    }

    /// Run cycles forever, sleeping `interval` after each one
    pub async fn run(&mut self) -> Infallible {
        loop {
            let report = self.cycle().await;
            self.publish(report);

            self.phase = CyclePhase::Sleeping;
            tokio::time::sleep(self.interval).await;
            self.phase = CyclePhase::Idle;
        }
    }

    fn publish(&self, report: CycleReport) {
        let Some(tx) = &self.reports else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(report)) = tx.try_send(report) {
            debug!(cycle = report.cycle, "Report subscriber lagging, dropping report");
        }
    }

    /// One capture → relay → report pass
    pub async fn cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let started_at = Instant::now();

        if let Some(reclaim) = self.reclaim.as_mut() {
            reclaim();
        }

        if self.reassociate {
            self.reassociate = false;
            if let Err(e) = self.network.ensure_connected().await {
                warn!(error = %e, "Re-association check failed");
            }
        }

        self.phase = CyclePhase::Capturing;
        info!(cycle = self.cycles, "Capturing frame");
        let outcome = match self.camera.capture().await {
            Ok(frame) => {
                info!(bytes = frame.len(), "Captured frame");
                self.phase = CyclePhase::Relaying;
                match self.relay.send(&frame).await {
                    Ok(description) => CycleOutcome::Described {
                        frame_bytes: frame.len(),
                        description,
                    },
                    Err(error) => CycleOutcome::RelayFailed {
                        frame_bytes: frame.len(),
                        error,
                    },
                }
            }
            Err(e) => CycleOutcome::CaptureFailed(e),
        };

        self.phase = CyclePhase::Reporting;
        match &outcome {
            CycleOutcome::Described { description, .. } => {
                info!(description = %description, "Vision description");
            }
            CycleOutcome::RelayFailed { error, .. } => {
                warn!(error = %error, "Vision request failed");
                if matches!(error, RelayError::Unreachable(_)) {
                    self.reassociate = true;
                }
            }
            CycleOutcome::CaptureFailed(e) => {
                error!(error = %e, "Capture failed, skipping cycle");
            }
        }

        CycleReport {
            cycle: self.cycles,
            started_at,
            finished_at: Instant::now(),
            outcome,
        }
    }

    /// Release the camera before the process exits
    pub async fn shutdown(&mut self) -> Result<(), HardwareError> {
        self.phase = CyclePhase::Idle;
        self.camera.deinit().await
    }
}
