//! Simulated radio for development without Wi-Fi hardware

use super::{StationError, StationInterface};
use crate::config::WifiCredentials;

/// Associates after a configurable number of status polls
#[derive(Debug, Default)]
pub struct SimulatedStation {
    active: bool,
    requested: bool,
    polls_until_connected: u32,
    polls: u32,
}

impl SimulatedStation {
    pub fn new(polls_until_connected: u32) -> Self {
        Self {
            polls_until_connected,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl StationInterface for SimulatedStation {
    async fn is_active(&mut self) -> Result<bool, StationError> {
        Ok(self.active)
    }

    async fn activate(&mut self) -> Result<(), StationError> {
        self.active = true;
        Ok(())
    }

    async fn connect(&mut self, _credentials: &WifiCredentials) -> Result<(), StationError> {
        if !self.active {
            return Err(StationError::Command("interface is down".into()));
        }
        self.requested = true;
        self.polls = 0;
        Ok(())
    }

    async fn is_connected(&mut self) -> Result<bool, StationError> {
        if !self.requested {
            return Ok(false);
        }
        if self.polls >= self.polls_until_connected {
            return Ok(true);
        }
        self.polls += 1;
        Ok(false)
    }
}
