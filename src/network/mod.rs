//! Wi-Fi station association
//!
//! The device cannot do anything useful offline, so association is retried
//! forever with a multiplicative backoff instead of surfacing a failure:
//! - `StationInterface` abstracts the radio (NetworkManager on a host,
//!   a simulated radio for development)
//! - `NetworkAssociationManager` owns the retry policy and the association state
//! - `Backoff` produces the bounded, non-decreasing delay sequence

mod nmcli;
mod simulated;

pub use nmcli::NmcliStation;
pub use simulated::SimulatedStation;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::WifiCredentials;

/// Errors reported by a station driver. Never terminal for association.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("station command failed: {0}")]
    Command(String),

    #[error("station I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration faults that make association impossible
#[derive(Debug, thiserror::Error)]
pub enum AssociationError {
    #[error("no Wi-Fi network name configured")]
    MissingSsid,
}

/// Wi-Fi station radio
#[async_trait::async_trait]
pub trait StationInterface: Send {
    /// Whether the station interface is powered up
    async fn is_active(&mut self) -> Result<bool, StationError>;

    /// Power up the station interface
    async fn activate(&mut self) -> Result<(), StationError>;

    /// Ask the radio to associate. Returns once the request is issued,
    /// not once the association is up.
    async fn connect(&mut self, credentials: &WifiCredentials) -> Result<(), StationError>;

    /// Whether an association with the access point is currently active
    async fn is_connected(&mut self) -> Result<bool, StationError>;
}

/// Delay schedule for association polling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    /// Growth per unsuccessful poll; values below 1.0 are treated as 1.0
    pub factor: f64,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            factor: 1.5,
            max: Duration::from_secs(8),
        }
    }
}

/// Bounded, non-decreasing delay sequence.
///
/// Yields `initial, initial*factor, ...` capped at `max`, forever.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        let policy = BackoffPolicy {
            factor: if policy.factor.is_finite() {
                policy.factor.max(1.0)
            } else {
                1.0
            },
            initial: policy.initial.min(policy.max),
            max: policy.max,
        };
        Self {
            current: policy.initial,
            policy,
        }
    }

    /// Delay the next call to `next_delay` will return
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the current delay and grow the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.policy.factor).min(self.policy.max);
        delay
    }

    /// Back to the initial delay
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// The delay sequence `policy` produces, starting from a fresh backoff
pub fn backoff_delays(policy: BackoffPolicy) -> impl Iterator<Item = Duration> {
    Backoff::new(policy)
}

/// Association state as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Disconnected,
    /// Waiting for the radio; `delay` is the sleep before the next poll
    Connecting { attempt: u32, delay: Duration },
    Connected,
}

/// Keeps the station associated with the configured access point
pub struct NetworkAssociationManager<S> {
    station: S,
    credentials: WifiCredentials,
    backoff: Backoff,
    state: AssociationState,
}

impl<S: StationInterface> NetworkAssociationManager<S> {
    pub fn new(station: S, credentials: WifiCredentials) -> Self {
        Self::with_policy(station, credentials, BackoffPolicy::default())
    }

    pub fn with_policy(station: S, credentials: WifiCredentials, policy: BackoffPolicy) -> Self {
        Self {
            station,
            credentials,
            backoff: Backoff::new(policy),
            state: AssociationState::Disconnected,
        }
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn station(&self) -> &S {
        &self.station
    }

    /// Block until the station is associated.
    ///
    /// Returns immediately when already associated. Otherwise powers up the
    /// interface if needed, issues one connect request, and polls with backoff
    /// until the radio reports an association. There is no attempt limit.
    pub async fn ensure_connected(&mut self) -> Result<(), AssociationError> {
        if self.credentials.ssid.is_empty() {
            return Err(AssociationError::MissingSsid);
        }

        if matches!(self.station.is_connected().await, Ok(true)) {
            self.mark_connected();
            return Ok(());
        }

        self.state = AssociationState::Disconnected;

        match self.station.is_active().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Activating station interface");
                if let Err(e) = self.station.activate().await {
                    warn!(error = %e, "Failed to activate station interface");
                }
            }
            Err(e) => warn!(error = %e, "Failed to query station interface"),
        }

        info!(ssid = %self.credentials.ssid, "Connecting to Wi-Fi");
        if let Err(e) = self.station.connect(&self.credentials).await {
            warn!(error = %e, "Connect request failed, polling anyway");
        }

        let mut attempt = 0u32;
        loop {
            match self.station.is_connected().await {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => debug!(error = %e, "Association poll failed"),
            }

            attempt += 1;
            let delay = self.backoff.next_delay();
            self.state = AssociationState::Connecting { attempt, delay };
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Not associated yet");
            tokio::time::sleep(delay).await;
        }

        info!(ssid = %self.credentials.ssid, polls = attempt, "Wi-Fi associated");
        self.mark_connected();
        Ok(())
    }

    fn mark_connected(&mut self) {
        self.state = AssociationState::Connected;
        self.backoff.reset();
    }
}
