//! Liveness probe for role holders
//!
//! A holder counts as reachable when the system `ping` utility gets a reply
//! to a short burst of echo requests.

use std::process::{Command, Stdio};
use std::time::Duration;

/// Echo requests per probe
pub const PROBE_PACKETS: u32 = 2;

/// Answers whether a host is alive
pub trait Prober {
    fn is_reachable(&self, host: &str) -> bool;
}

/// Probe using the platform's ping command
#[derive(Debug, Clone)]
pub struct PingProber {
    pub count: u32,
    pub timeout: Duration,
}

impl Default for PingProber {
    fn default() -> Self {
        Self {
            count: PROBE_PACKETS,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PingProber {
    /// Arguments for the platform's ping (per-reply timeout)
    pub fn ping_args(&self, host: &str) -> Vec<String> {
        if cfg!(windows) {
            vec![
                "-n".to_string(),
                self.count.to_string(),
                "-w".to_string(),
                self.timeout.as_millis().to_string(),
                host.to_string(),
            ]
        } else {
            vec![
                "-c".to_string(),
                self.count.to_string(),
                "-W".to_string(),
                self.timeout.as_secs().max(1).to_string(),
                host.to_string(),
            ]
        }
    }
}

impl Prober for PingProber {
    fn is_reachable(&self, host: &str) -> bool {
        if host.is_empty() || host.starts_with('-') {
            tracing::warn!(host = host, "Refusing to probe suspicious host name");
            return false;
        }

        let output = Command::new("ping")
            .args(self.ping_args(host))
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) => {
                // Windows ping exits 0 on "Destination host unreachable" replies
                let stdout = String::from_utf8_lossy(&output.stdout);
                let reachable = output.status.success()
                    && !stdout.to_lowercase().contains("destination host unreachable");
                tracing::info!(host = host, reachable = reachable, "Probed host");
                reachable
            }
            Err(e) => {
                tracing::error!(host = host, error = %e, "Failed to run ping");
                false
            }
        }
    }
}
