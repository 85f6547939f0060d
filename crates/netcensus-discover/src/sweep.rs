//! Liveness sweep adapter.
//!
//! Wraps nmap as a child process via `tokio::process::Command`, running a
//! ping sweep (`-sn`) over the target range and normalizing the XML output
//! into per-address sweep entries.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use netcensus_core::HostStatus;

use crate::error::{DiscoverError, Result};
use crate::nmap_xml;

/// One reachable-address tuple from the sweep.
#[derive(Debug, Clone)]
pub struct SweepHost {
    pub ip: String,
    pub status: HostStatus,
    pub hostname: Option<String>,
    pub mac: Option<String>,
}

/// The host-discovery primitive establishing the authoritative address set.
///
/// Injectable so the correlation engine can be driven by a fake in tests.
#[async_trait]
pub trait LivenessSweep: Send + Sync {
    async fn sweep(&self, target: &str) -> Result<Vec<SweepHost>>;
}

/// Sweep implementation backed by the nmap binary.
pub struct NmapSweeper {
    nmap_path: String,
    timeout: Duration,
}

impl NmapSweeper {
    pub fn new(nmap_path: &str, timeout: Duration) -> Self {
        Self {
            nmap_path: nmap_path.to_string(),
            timeout,
        }
    }

    /// Verify nmap is installed and accessible.
    pub async fn verify_installation(&self) -> Result<String> {
        let output = Command::new(&self.nmap_path)
            .arg("--version")
            .output()
            .await
            .map_err(|_| DiscoverError::NmapNotFound {
                path: self.nmap_path.clone(),
            })?;

        String::from_utf8(output.stdout).map_err(|e| DiscoverError::XmlParse(e.to_string()))
    }
}

#[async_trait]
impl LivenessSweep for NmapSweeper {
    /// Execute `nmap -sn -oX - <target>` and normalize the results.
    ///
    /// The XML lands on stdout so nothing touches the filesystem; the whole
    /// invocation is bounded by the configured sweep timeout.
    async fn sweep(&self, target: &str) -> Result<Vec<SweepHost>> {
        let sweep_id = Uuid::new_v4();
        let start = Instant::now();

        tracing::info!(
            sweep_id = %sweep_id,
            target = %target,
            "Starting liveness sweep"
        );

        let run = Command::new(&self.nmap_path)
            .arg("-sn")
            .arg("-oX")
            .arg("-")
            .arg("--noninteractive")
            .arg(target)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| DiscoverError::SweepFailed {
                code: -1,
                stderr: format!("sweep timed out after {:?}", self.timeout),
            })?
            .map_err(|e| DiscoverError::NmapNotFound {
                path: format!("{}: {e}", self.nmap_path),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(DiscoverError::SweepFailed {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let run = nmap_xml::parse_nmap_xml(&output.stdout)?;
        let hosts = normalize_sweep(&run);

        tracing::info!(
            sweep_id = %sweep_id,
            target = %target,
            hosts = hosts.len(),
            duration_ms = start.elapsed().as_millis(),
            "Liveness sweep complete"
        );

        Ok(hosts)
    }
}

/// Flatten parsed nmap output into sweep entries, in report order.
fn normalize_sweep(run: &nmap_xml::NmapRun) -> Vec<SweepHost> {
    run.hosts
        .iter()
        .filter_map(|h| {
            let ip = h.ipv4()?;
            Some(SweepHost {
                ip: ip.to_string(),
                status: parse_state(h.state()),
                hostname: h.hostname().map(String::from),
                mac: h.mac().map(String::from),
            })
        })
        .collect()
}

fn parse_state(state: Option<&str>) -> HostStatus {
    match state {
        Some("up") => HostStatus::Up,
        Some("down") => HostStatus::Down,
        _ => HostStatus::Unknown,
    }
}
