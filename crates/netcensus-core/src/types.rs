//! Host records and identity evidence.
//!
//! A `HostRecord` is created once per distinct address during the sweep
//! phase and enriched in place by each probe phase. Probe output arrives as
//! `IdentityFragment`s which are folded into the record's `Identity` under
//! the first-wins merge policy.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness state reported by the sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Up,
    Down,
    Unknown,
}

/// One discovered host, keyed by its IP address.
///
/// `ip`, `status`, `hostname` and `mac_address` are fixed at creation;
/// `identity` and `platform_id` accumulate across probe phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    pub ip: String,
    pub status: HostStatus,
    pub hostname: Option<String>,
    pub mac_address: Option<String>,
    pub identity: Option<Identity>,
    pub platform_id: Option<String>,
    pub first_seen: DateTime<Utc>,
}

impl HostRecord {
    pub fn new(
        ip: String,
        status: HostStatus,
        hostname: Option<String>,
        mac_address: Option<String>,
        first_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            ip,
            status,
            hostname,
            mac_address,
            identity: None,
            platform_id: None,
            first_seen,
        }
    }
}

/// Accumulated identity evidence for one host.
///
/// Named fields cover the attributes every probe understands; anything
/// protocol-specific lands in `extra` so new probes can contribute
/// attributes without a type change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub detection_method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Raw per-address output of a single probe phase. Same shape as
/// `Identity`; it does not persist on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFragment {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub detection_method: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl From<IdentityFragment> for Identity {
    fn from(f: IdentityFragment) -> Self {
        Self {
            vendor: f.vendor,
            model: f.model,
            version: f.version,
            detection_method: f.detection_method,
            extra: f.extra,
        }
    }
}

impl Identity {
    /// Fold a fragment into this identity.
    ///
    /// Every attribute is set only if currently absent: the first phase to
    /// populate vendor/model wins, and later phases may only fill gaps.
    /// Absorbing an already-merged fragment changes nothing.
    ///
    /// Returns true iff `vendor` or `model` gained a value.
    pub fn absorb(&mut self, fragment: &IdentityFragment) -> bool {
        let mut derived_changed = false;

        if self.vendor.is_none() && fragment.vendor.is_some() {
            self.vendor = fragment.vendor.clone();
            derived_changed = true;
        }
        if self.model.is_none() && fragment.model.is_some() {
            self.model = fragment.model.clone();
            derived_changed = true;
        }
        if self.version.is_none() {
            self.version = fragment.version.clone();
        }
        if self.detection_method.is_none() {
            self.detection_method = fragment.detection_method.clone();
        }
        for (key, value) in &fragment.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        derived_changed
    }
}
