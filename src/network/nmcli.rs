//! NetworkManager-backed station for Linux hosts (Pi-class devices)

use tokio::process::Command;
use tracing::debug;

use super::{StationError, StationInterface};
use crate::config::WifiCredentials;

/// Drives the Wi-Fi radio through `nmcli`
#[derive(Debug, Clone)]
pub struct NmcliStation {
    program: String,
}

impl Default for NmcliStation {
    fn default() -> Self {
        Self {
            program: "nmcli".to_string(),
        }
    }
}

impl NmcliStation {
    /// Use a different `nmcli` binary (e.g. a wrapper script)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, StationError> {
        debug!(program = %self.program, ?args, "Running station command");
        let output = Command::new(&self.program).args(args).output().await?;
        if !output.status.success() {
            return Err(StationError::Command(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl StationInterface for NmcliStation {
    async fn is_active(&mut self) -> Result<bool, StationError> {
        let out = self.run(&["radio", "wifi"]).await?;
        Ok(out.trim() == "enabled")
    }

    async fn activate(&mut self) -> Result<(), StationError> {
        self.run(&["radio", "wifi", "on"]).await.map(|_| ())
    }

    async fn connect(&mut self, credentials: &WifiCredentials) -> Result<(), StationError> {
        // --wait 0: hand the request to NetworkManager and return; progress is polled
        let mut args = vec!["--wait", "0", "device", "wifi", "connect", credentials.ssid.as_str()];
        if !credentials.password.is_empty() {
            args.extend(["password", credentials.password.as_str()]);
        }
        self.run(&args).await.map(|_| ())
    }

    async fn is_connected(&mut self) -> Result<bool, StationError> {
        let out = self.run(&["-t", "-f", "TYPE,STATE", "device"]).await?;
        Ok(wifi_connected(&out))
    }
}

/// Parse terse `nmcli -t -f TYPE,STATE device` output
fn wifi_connected(terse: &str) -> bool {
    terse
        .lines()
        .any(|line| line.trim() == "wifi:connected")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_states() {
        let up = "ethernet:unavailable\nwifi:connected\nloopback:connected (externally)\n";
        assert!(wifi_connected(up));

        let down = "wifi:connecting (getting IP configuration)\nwifi-p2p:disconnected\n";
        assert!(!wifi_connected(down));
        assert!(!wifi_connected(""));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let mut station = NmcliStation::with_program("/nonexistent/veri-nmcli");
        assert!(matches!(station.is_active().await, Err(StationError::Io(_))));
    }
}
