//! Platform identifier derivation.
//!
//! Encodes merged vendor/model evidence as a CPE 2.3 hardware identifier
//! with wildcarded version/edition/language fields, e.g.
//! `cpe:2.3:h:hikvision:web_server:*:*:*:*:*:*:*:*`.

use crate::types::Identity;

/// Derive the normalized platform identifier for an identity.
///
/// Requires a vendor; the product falls back to a wildcard when no model
/// was observed. The result is a pure function of the current
/// vendor/model/detection_method, so callers can recompute it after any
/// merge without tracking staleness.
pub fn derive_platform_id(identity: &Identity) -> Option<String> {
    let vendor = identity.vendor.as_deref()?;
    // HTTP-derived names use hyphens where CPE expects underscores
    // (e.g. "Cam-1" -> "cam_1"); mDNS TXT values do not.
    let fold_hyphens = identity.detection_method.as_deref() == Some("HTTP");

    let vendor = normalize(vendor, fold_hyphens);
    let product = identity
        .model
        .as_deref()
        .map(|m| normalize(m, fold_hyphens))
        .unwrap_or_else(|| "*".to_string());

    Some(format!("cpe:2.3:h:{vendor}:{product}:*:*:*:*:*:*:*:*"))
}

fn normalize(value: &str, fold_hyphens: bool) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '-' if fold_hyphens => '_',
            c => c,
        })
        .collect()
}
