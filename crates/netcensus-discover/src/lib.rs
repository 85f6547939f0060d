//! netcensus-discover: Multi-phase device discovery and identification.
//!
//! Sweeps a subnet for live hosts with nmap, enriches each host through
//! passive mDNS listening and active HTTP fingerprinting, correlates the
//! evidence into per-host identity records, and emits a JSON report.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod nmap_xml;
pub mod probe;
pub mod report;
pub mod sweep;
