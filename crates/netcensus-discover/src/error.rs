//! Error types for the netcensus-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Invalid target range: {0}")]
    InvalidTarget(String),

    #[error("Nmap not found at path: {path}")]
    NmapNotFound { path: String },

    #[error("Sweep failed (exit code {code}): {stderr}")]
    SweepFailed { code: i32, stderr: String },

    #[error("Failed to parse nmap XML output: {0}")]
    XmlParse(String),

    #[error("Failed to write report to {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
