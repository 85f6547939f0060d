//! netcensus-core: Shared domain types for the NetCensus inventory pipeline.
//!
//! This crate provides the types every NetCensus component agrees on:
//! - Host records produced by the liveness sweep
//! - Identity fragments/records and their merge policy
//! - Platform identifier (CPE) derivation

pub mod cpe;
pub mod types;

pub use types::{HostRecord, HostStatus, Identity, IdentityFragment};
