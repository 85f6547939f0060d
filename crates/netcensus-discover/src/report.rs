//! Report emission.
//!
//! Writes the final host record collection as a pretty-printed JSON array
//! to a file or stdout, preserving sweep-discovery order.

use std::fs::File;
use std::io::Write;

use netcensus_core::HostRecord;

use crate::error::{DiscoverError, Result};

/// Emit the run's records to the configured sink.
pub fn write_report(records: &[HostRecord], output: Option<&str>) -> Result<()> {
    let identified = records.iter().filter(|r| r.identity.is_some()).count();

    match output {
        Some(path) => {
            let file = File::create(path).map_err(|e| DiscoverError::Report {
                path: path.to_string(),
                source: e,
            })?;
            serde_json::to_writer_pretty(file, records).map_err(|e| DiscoverError::Report {
                path: path.to_string(),
                source: std::io::Error::other(e),
            })?;
            tracing::info!(path = %path, hosts = records.len(), identified, "Report written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, records)
                .map_err(|e| DiscoverError::Io(std::io::Error::other(e)))?;
            writeln!(stdout)?;
            tracing::info!(hosts = records.len(), identified, "Report written to stdout");
        }
    }

    Ok(())
}
