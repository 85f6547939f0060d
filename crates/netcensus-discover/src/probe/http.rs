//! Active HTTP identity probe.
//!
//! For each live address, walks an ordered list of candidate ports and
//! stops at the first one that answers HTTP. Response headers are fed to
//! the fingerprint classifier; title and version hints are extracted from
//! the body and Server header. Targets are probed concurrently under a
//! configurable limit, and one unresponsive target never stalls the batch
//! beyond its own request timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{SERVER, WWW_AUTHENTICATE};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use netcensus_core::IdentityFragment;

use crate::classify::{identify_from_headers, FingerprintClassifier};
use crate::config::HttpConfig;
use crate::error::{DiscoverError, Result};
use crate::probe::{IdentityProbe, ProbeContext};

#[derive(Clone)]
pub struct HttpProbe {
    ports: Vec<u16>,
    concurrency: usize,
    classifier: Arc<dyn FingerprintClassifier>,
    client: reqwest::Client,
    title_re: Regex,
    version_re: Regex,
}

impl HttpProbe {
    pub fn new(config: &HttpConfig, classifier: Arc<dyn FingerprintClassifier>) -> Result<Self> {
        // Embedded devices ship self-signed certificates; verification
        // failures would hide exactly the hosts worth identifying.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| DiscoverError::Config(format!("http client: {e}")))?;

        let title_re = Regex::new(r"(?i)<title>([^<]+)</title>")
            .map_err(|e| DiscoverError::Config(format!("title regex: {e}")))?;
        let version_re = Regex::new(r"[\d.]+")
            .map_err(|e| DiscoverError::Config(format!("version regex: {e}")))?;

        Ok(Self {
            ports: config.ports.clone(),
            concurrency: config.concurrency,
            classifier,
            client,
            title_re,
            version_re,
        })
    }

    /// Probe one address, first answering port wins.
    async fn probe_target(&self, ip: &str) -> Option<IdentityFragment> {
        for port in &self.ports {
            let url = format!("http://{ip}:{port}");

            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    // No HTTP service on this port; keep walking the list.
                    tracing::debug!(url = %url, error = %e, "HTTP probe miss");
                    continue;
                }
            };

            let server = response
                .headers()
                .get(SERVER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let www_authenticate = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body = response.text().await.unwrap_or_default();

            let title = self.extract_title(&body);
            let version = server.as_deref().and_then(|s| self.extract_version(s));
            let identified = identify_from_headers(
                self.classifier.as_ref(),
                www_authenticate.as_deref(),
                server.as_deref(),
            )
            .await;
            let (vendor, model) = match identified {
                Some((vendor, product)) => (Some(vendor), product),
                None => (None, None),
            };

            if let Some(vendor) = &vendor {
                tracing::info!(ip = %ip, port = port, vendor = %vendor, "HTTP identity found");
            } else {
                tracing::debug!(ip = %ip, port = port, "HTTP service answered but no signature matched");
            }

            let mut extra = std::collections::BTreeMap::new();
            extra.insert("http_url".to_string(), url);
            if let Some(title) = title {
                extra.insert("http_title".to_string(), title);
            }
            if let Some(server) = server {
                extra.insert("http_server".to_string(), server);
            }

            return Some(IdentityFragment {
                vendor,
                model,
                version,
                detection_method: Some("HTTP".to_string()),
                extra,
            });
        }

        None
    }

    fn extract_title(&self, html: &str) -> Option<String> {
        self.title_re
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn extract_version(&self, server: &str) -> Option<String> {
        self.version_re
            .find(server)
            .map(|m| m.as_str().to_string())
            .filter(|v| v.chars().any(|c| c.is_ascii_digit()))
    }
}

#[async_trait]
impl IdentityProbe for HttpProbe {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn run(&self, ctx: &ProbeContext) -> HashMap<String, IdentityFragment> {
        tracing::info!(
            targets = ctx.targets.len(),
            ports = ?self.ports,
            "Starting HTTP fingerprinting"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for ip in &ctx.targets {
            let probe = self.clone();
            let ip = ip.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                probe.probe_target(&ip).await.map(|fragment| (ip, fragment))
            });
        }

        // Per-task results land in a local map only after every task has
        // produced its immutable output; merging into host records is the
        // engine's single-threaded job.
        let mut found = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((ip, fragment))) => {
                    found.insert(ip, fragment);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "HTTP probe task panicked"),
            }
        }

        tracing::info!(identified = found.len(), "HTTP fingerprinting complete");
        found
    }
}
