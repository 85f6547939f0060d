//! Banner fingerprint classification.
//!
//! Delegates banner strings to the external recog signature database via
//! the `recog_match` tool. The lookup is modeled as an injectable
//! capability so the precedence logic is testable without the tool.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::RecogConfig;

/// Vendors whose Server-header match says nothing about the device itself.
const GENERIC_VENDORS: &[&str] = &["nginx", "Apache", "IIS"];

/// Which signature database to match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintDb {
    /// HTTP Server banner signatures.
    HttpServer,
    /// WWW-Authenticate challenge signatures.
    HttpAuth,
}

/// A successful signature match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintMatch {
    pub vendor: String,
    pub product: Option<String>,
}

/// Signature lookup capability. A miss is `None`, never an error; tool
/// failures and timeouts are swallowed by implementations.
#[async_trait]
pub trait FingerprintClassifier: Send + Sync {
    async fn classify(&self, text: &str, db: FingerprintDb) -> Option<FingerprintMatch>;
}

/// Classifier backed by the `recog_match` CLI tool.
pub struct RecogClassifier {
    bin_path: String,
    server_db: String,
    auth_db: String,
    timeout: Duration,
}

impl RecogClassifier {
    pub fn new(config: &RecogConfig) -> Self {
        Self {
            bin_path: config.bin_path.clone(),
            server_db: config.server_db.clone(),
            auth_db: config.auth_db.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run `recog_match --format json <db> -` with the text on stdin and
    /// pull vendor/product out of the JSON `match` object.
    async fn run_tool(&self, text: &str, db_path: &str) -> anyhow::Result<Option<FingerprintMatch>> {
        let mut child = Command::new(&self.bin_path)
            .arg("--format")
            .arg("json")
            .arg(db_path)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() || output.stdout.is_empty() {
            return Ok(None);
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let matched = match parsed.get("match") {
            Some(m) if m.is_object() => m,
            _ => return Ok(None),
        };

        let vendor = matched
            .get("service.vendor")
            .or_else(|| matched.get("hw.vendor"))
            .and_then(|v| v.as_str());
        let product = matched
            .get("service.product")
            .or_else(|| matched.get("hw.product"))
            .and_then(|v| v.as_str());

        Ok(vendor.map(|vendor| FingerprintMatch {
            vendor: vendor.to_string(),
            product: product.map(String::from),
        }))
    }
}

#[async_trait]
impl FingerprintClassifier for RecogClassifier {
    async fn classify(&self, text: &str, db: FingerprintDb) -> Option<FingerprintMatch> {
        let db_path = match db {
            FingerprintDb::HttpServer => &self.server_db,
            FingerprintDb::HttpAuth => &self.auth_db,
        };

        match tokio::time::timeout(self.timeout, self.run_tool(text, db_path)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, db = %db_path, "Recog lookup failed");
                None
            }
            Err(_) => {
                tracing::debug!(db = %db_path, timeout = ?self.timeout, "Recog lookup timed out");
                None
            }
        }
    }
}

/// Identify a device from HTTP response headers.
///
/// The WWW-Authenticate challenge is tried first since it is typically the
/// more device-specific signal. Server banners can carry several
/// comma-separated values ("nginx, Hikvision-Webs"); the most specific one
/// is usually last, so tokens are tried in reverse order, and a match on a
/// generic web-server vendor only stands when no tokens are left to try.
pub async fn identify_from_headers(
    classifier: &dyn FingerprintClassifier,
    www_authenticate: Option<&str>,
    server: Option<&str>,
) -> Option<(String, Option<String>)> {
    if let Some(challenge) = www_authenticate {
        if let Some(m) = classifier.classify(challenge, FingerprintDb::HttpAuth).await {
            return Some((m.vendor, m.product));
        }
    }

    if let Some(banner) = server {
        let tokens: Vec<&str> = banner
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        let total = tokens.len();

        for (tried, token) in tokens.iter().rev().enumerate() {
            if let Some(m) = classifier.classify(token, FingerprintDb::HttpServer).await {
                let more_to_try = tried + 1 < total;
                if more_to_try && GENERIC_VENDORS.contains(&m.vendor.as_str()) {
                    continue;
                }
                return Some((m.vendor, m.product));
            }
        }
    }

    None
}
