//! Identity probe adapters.
//!
//! Each probe is one time-bounded identification pass returning raw
//! identity fragments keyed by address. Probes are infallible at the
//! interface: per-target errors and timeouts are logged and swallowed, so a
//! failed target is simply absent from the result map.

use std::collections::HashMap;

use async_trait::async_trait;

use netcensus_core::IdentityFragment;

pub mod http;
pub mod mdns;

/// Input handed to each probe phase: the authoritative live-address set,
/// in sweep-discovery order. Passive probes ignore it.
#[derive(Debug, Clone, Default)]
pub struct ProbeContext {
    pub targets: Vec<String>,
}

/// One identification protocol, run as a single phase by the correlation
/// engine. Implementations must bound their own runtime: passive probes by
/// a fixed listen window, active probes by per-target timeouts.
#[async_trait]
pub trait IdentityProbe: Send + Sync {
    /// Short protocol name, used in logs and as the detection method.
    fn name(&self) -> &'static str;

    /// Run the probe to completion and return fragments keyed by address.
    async fn run(&self, ctx: &ProbeContext) -> HashMap<String, IdentityFragment>;
}
