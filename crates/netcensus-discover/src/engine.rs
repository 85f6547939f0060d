//! Correlation engine.
//!
//! Orchestrates one discovery run: liveness sweep, then each identity
//! probe phase in configured order, merging fragments into host records by
//! address and deriving the platform identifier as vendor/model evidence
//! lands. Phases never overlap; no phase starts before the previous
//! phase's results are fully merged.

use std::collections::HashMap;

use chrono::Utc;

use netcensus_core::{cpe, HostRecord, IdentityFragment};

use crate::error::{DiscoverError, Result};
use crate::probe::{IdentityProbe, ProbeContext};
use crate::sweep::{LivenessSweep, SweepHost};

pub struct CorrelationEngine {
    probes: Vec<Box<dyn IdentityProbe>>,
}

impl CorrelationEngine {
    /// Probes run in the given order; earlier phases win conflicts on
    /// vendor/model.
    pub fn new(probes: Vec<Box<dyn IdentityProbe>>) -> Self {
        Self { probes }
    }

    /// Execute a full discovery run and return the host records in
    /// sweep-discovery order.
    ///
    /// A malformed target fails before the sweep. A failed or empty sweep
    /// is a successful run with zero records: identification phases have
    /// nothing to join against and are skipped.
    pub async fn run(
        &self,
        sweeper: &dyn LivenessSweep,
        target: &str,
    ) -> Result<Vec<HostRecord>> {
        validate_target(target)?;

        let swept = match sweeper.sweep(target).await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "Sweep failed, reporting zero hosts");
                return Ok(Vec::new());
            }
        };

        let mut records = build_records(swept);
        if records.is_empty() {
            tracing::warn!(target = %target, "No hosts found, check your network settings");
            return Ok(records);
        }
        tracing::info!(target = %target, hosts = records.len(), "Sweep established host set");

        let index: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.ip.clone(), i))
            .collect();
        let ctx = ProbeContext {
            targets: records.iter().map(|r| r.ip.clone()).collect(),
        };

        for probe in &self.probes {
            let fragments = probe.run(&ctx).await;

            let mut merged = 0usize;
            let mut dropped = 0usize;
            for (ip, fragment) in fragments {
                match index.get(&ip) {
                    Some(&i) => {
                        merge_fragment(&mut records[i], &fragment);
                        merged += 1;
                    }
                    None => {
                        // Probe evidence for an address the sweep never
                        // saw is not trusted.
                        tracing::debug!(phase = probe.name(), ip = %ip, "Dropping fragment for unswept address");
                        dropped += 1;
                    }
                }
            }

            tracing::info!(phase = probe.name(), merged, dropped, "Probe phase merged");
        }

        Ok(records)
    }
}

/// Fold one fragment into its host record and keep the platform
/// identifier in sync with the merged vendor/model.
fn merge_fragment(record: &mut HostRecord, fragment: &IdentityFragment) {
    let derived_changed = match &mut record.identity {
        Some(identity) => identity.absorb(fragment),
        None => {
            record.identity = Some(fragment.clone().into());
            true
        }
    };

    if derived_changed {
        if let Some(identity) = &record.identity {
            record.platform_id = cpe::derive_platform_id(identity);
        }
    }
}

/// One record per distinct swept address, in discovery order.
fn build_records(swept: Vec<SweepHost>) -> Vec<HostRecord> {
    let now = Utc::now();
    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::with_capacity(swept.len());

    for host in swept {
        if !seen.insert(host.ip.clone()) {
            continue;
        }
        records.push(HostRecord::new(
            host.ip,
            host.status,
            host.hostname,
            host.mac,
            now,
        ));
    }

    records
}

fn validate_target(target: &str) -> Result<()> {
    let valid = target.parse::<ipnet::IpNet>().is_ok()
        || target.parse::<std::net::IpAddr>().is_ok();
    if valid {
        Ok(())
    } else {
        Err(DiscoverError::InvalidTarget(target.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use netcensus_core::HostStatus;

    struct FakeSweeper {
        hosts: Vec<SweepHost>,
        fail: bool,
    }

    impl FakeSweeper {
        fn with(ips: &[&str]) -> Self {
            let hosts = ips
                .iter()
                .map(|ip| SweepHost {
                    ip: ip.to_string(),
                    status: HostStatus::Up,
                    hostname: None,
                    mac: None,
                })
                .collect();
            Self { hosts, fail: false }
        }
    }

    #[async_trait]
    impl LivenessSweep for FakeSweeper {
        async fn sweep(&self, _target: &str) -> Result<Vec<SweepHost>> {
            if self.fail {
                return Err(DiscoverError::SweepFailed {
                    code: 1,
                    stderr: "permission denied".to_string(),
                });
            }
            Ok(self.hosts.clone())
        }
    }

    struct FakeProbe {
        name: &'static str,
        fragments: Vec<(String, IdentityFragment)>,
        runs: Arc<AtomicUsize>,
    }

    impl FakeProbe {
        fn new(name: &'static str, fragments: Vec<(&str, IdentityFragment)>) -> Self {
            Self {
                name,
                fragments: fragments
                    .into_iter()
                    .map(|(ip, f)| (ip.to_string(), f))
                    .collect(),
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl IdentityProbe for FakeProbe {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _ctx: &ProbeContext) -> HashMap<String, IdentityFragment> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.fragments.iter().cloned().collect()
        }
    }

    fn fragment(vendor: Option<&str>, model: Option<&str>, method: &str) -> IdentityFragment {
        IdentityFragment {
            vendor: vendor.map(String::from),
            model: model.map(String::from),
            detection_method: Some(method.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sweep_establishes_deduplicated_host_set() {
        let sweeper = FakeSweeper::with(&["10.0.0.1", "10.0.0.2", "10.0.0.1"]);
        let engine = CorrelationEngine::new(vec![]);

        let records = engine.run(&sweeper, "10.0.0.0/24").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ip, "10.0.0.1");
        assert_eq!(records[1].ip, "10.0.0.2");
    }

    #[tokio::test]
    async fn invalid_target_fails_before_sweep() {
        let sweeper = FakeSweeper::with(&["10.0.0.1"]);
        let engine = CorrelationEngine::new(vec![]);

        let err = engine.run(&sweeper, "not-a-subnet").await.unwrap_err();
        assert!(matches!(err, DiscoverError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn bare_ip_target_is_accepted() {
        let sweeper = FakeSweeper::with(&["10.0.0.5"]);
        let engine = CorrelationEngine::new(vec![]);

        let records = engine.run(&sweeper, "10.0.0.5").await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn sweep_failure_is_an_empty_run_not_an_error() {
        let mut sweeper = FakeSweeper::with(&["10.0.0.1"]);
        sweeper.fail = true;
        let engine = CorrelationEngine::new(vec![]);

        let records = engine.run(&sweeper, "10.0.0.0/24").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn empty_sweep_skips_probe_phases() {
        let sweeper = FakeSweeper::with(&[]);
        let probe = FakeProbe::new("mDNS", vec![]);
        let runs = probe.runs.clone();
        let engine = CorrelationEngine::new(vec![Box::new(probe)]);

        let records = engine.run(&sweeper, "10.0.0.0/24").await.unwrap();
        assert!(records.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fragment_for_unswept_address_is_dropped() {
        let sweeper = FakeSweeper::with(&["10.0.0.1", "10.0.0.2"]);
        let probe = FakeProbe::new(
            "HTTP",
            vec![("10.0.0.99", fragment(Some("Acme"), None, "HTTP"))],
        );
        let engine = CorrelationEngine::new(vec![Box::new(probe)]);

        let records = engine.run(&sweeper, "10.0.0.0/24").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.identity.is_none()));
        assert!(records.iter().all(|r| r.ip != "10.0.0.99"));
    }

    #[tokio::test]
    async fn first_phase_wins_vendor_later_phase_enriches() {
        let sweeper = FakeSweeper::with(&["10.0.0.1"]);

        let mut second = fragment(Some("GenericCo"), Some("Webcam"), "HTTP");
        second
            .extra
            .insert("http_title".to_string(), "Login".to_string());

        let engine = CorrelationEngine::new(vec![
            Box::new(FakeProbe::new(
                "mDNS",
                vec![("10.0.0.1", fragment(Some("Hikvision"), Some("Web Server"), "mDNS"))],
            )),
            Box::new(FakeProbe::new("HTTP", vec![("10.0.0.1", second)])),
        ]);

        let records = engine.run(&sweeper, "10.0.0.0/24").await.unwrap();
        let identity = records[0].identity.as_ref().unwrap();
        assert_eq!(identity.vendor.as_deref(), Some("Hikvision"));
        assert_eq!(identity.model.as_deref(), Some("Web Server"));
        assert_eq!(
            identity.extra.get("http_title").map(String::as_str),
            Some("Login")
        );
        assert_eq!(
            records[0].platform_id.as_deref(),
            Some("cpe:2.3:h:hikvision:web_server:*:*:*:*:*:*:*:*")
        );
    }

    #[tokio::test]
    async fn platform_id_derived_when_vendor_arrives_late() {
        let sweeper = FakeSweeper::with(&["10.0.0.1"]);

        // Phase 1 only knows the model; no identifier can be derived yet.
        let engine = CorrelationEngine::new(vec![
            Box::new(FakeProbe::new(
                "mDNS",
                vec![("10.0.0.1", fragment(None, Some("Nest Thermostat"), "mDNS"))],
            )),
            Box::new(FakeProbe::new(
                "HTTP",
                vec![("10.0.0.1", fragment(Some("Google"), None, "HTTP"))],
            )),
        ]);

        let records = engine.run(&sweeper, "10.0.0.0/24").await.unwrap();
        let record = &records[0];
        let identity = record.identity.as_ref().unwrap();
        assert_eq!(identity.vendor.as_deref(), Some("Google"));
        assert_eq!(identity.model.as_deref(), Some("Nest Thermostat"));
        // detection_method stayed mDNS (first wins), so hyphen folding is
        // not applied.
        assert_eq!(
            record.platform_id.as_deref(),
            Some("cpe:2.3:h:google:nest_thermostat:*:*:*:*:*:*:*:*")
        );
    }

    #[tokio::test]
    async fn replaying_identical_fragment_changes_nothing() {
        let sweeper = FakeSweeper::with(&["10.0.0.1"]);
        let frag = fragment(Some("Acme"), Some("Cam-1"), "HTTP");

        let engine = CorrelationEngine::new(vec![
            Box::new(FakeProbe::new("HTTP", vec![("10.0.0.1", frag.clone())])),
            Box::new(FakeProbe::new("HTTP-again", vec![("10.0.0.1", frag)])),
        ]);

        let records = engine.run(&sweeper, "10.0.0.0/24").await.unwrap();
        let record = &records[0];
        assert_eq!(
            record.identity.as_ref().unwrap().vendor.as_deref(),
            Some("Acme")
        );
        assert_eq!(
            record.platform_id.as_deref(),
            Some("cpe:2.3:h:acme:cam_1:*:*:*:*:*:*:*:*")
        );
    }
}
