//! Configuration for the netcensus-discover pipeline.

use serde::Deserialize;

/// Top-level discover configuration.
///
/// Loaded from `netcensus.toml` `[discover]` section or
/// `NETCENSUS_DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Path to the nmap binary (default: "nmap").
    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// Target subnet in CIDR notation.
    #[serde(default = "default_target")]
    pub target: String,

    /// Hard timeout for the liveness sweep, in seconds.
    #[serde(default = "default_sweep_timeout")]
    pub sweep_timeout_secs: u64,

    /// Seconds to wait before starting, so co-deployed services settle.
    #[serde(default)]
    pub startup_delay_secs: u64,

    /// Optional report file path; stdout when unset.
    #[serde(default)]
    pub output: Option<String>,

    #[serde(default)]
    pub mdns: MdnsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub recog: RecogConfig,
}

/// Passive mDNS listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MdnsConfig {
    /// Fixed listening window in seconds; the probe never exits early.
    #[serde(default = "default_mdns_duration")]
    pub duration_secs: u64,

    /// Service types worth recording an announcement for.
    #[serde(default = "default_service_types")]
    pub service_types: Vec<String>,
}

/// Active HTTP prober settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Candidate ports, tried in order until one answers.
    #[serde(default = "default_http_ports")]
    pub ports: Vec<u16>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Maximum targets probed concurrently.
    #[serde(default = "default_http_concurrency")]
    pub concurrency: usize,
}

/// External recog fingerprint tool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RecogConfig {
    /// Path to the recog_match binary.
    #[serde(default = "default_recog_path")]
    pub bin_path: String,

    /// Signature database for HTTP Server banners.
    #[serde(default = "default_server_db")]
    pub server_db: String,

    /// Signature database for WWW-Authenticate challenges.
    #[serde(default = "default_auth_db")]
    pub auth_db: String,

    /// Per-lookup timeout in seconds.
    #[serde(default = "default_recog_timeout")]
    pub timeout_secs: u64,
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_target() -> String {
    "172.20.0.0/24".to_string()
}

fn default_sweep_timeout() -> u64 {
    120
}

fn default_mdns_duration() -> u64 {
    5
}

fn default_service_types() -> Vec<String> {
    vec![
        "_googlecast._tcp.local".to_string(),
        "_http._tcp.local".to_string(),
        "_ssh._tcp.local".to_string(),
    ]
}

fn default_http_ports() -> Vec<u16> {
    vec![80, 8080, 8081]
}

fn default_http_timeout() -> u64 {
    3
}

fn default_http_concurrency() -> usize {
    16
}

fn default_recog_path() -> String {
    "recog_match".to_string()
}

fn default_server_db() -> String {
    "/usr/share/recog/xml/http_servers.xml".to_string()
}

fn default_auth_db() -> String {
    "/usr/share/recog/xml/http_wwwauth.xml".to_string()
}

fn default_recog_timeout() -> u64 {
    2
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            nmap_path: default_nmap_path(),
            target: default_target(),
            sweep_timeout_secs: default_sweep_timeout(),
            startup_delay_secs: 0,
            output: None,
            mdns: MdnsConfig::default(),
            http: HttpConfig::default(),
            recog: RecogConfig::default(),
        }
    }
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_mdns_duration(),
            service_types: default_service_types(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            ports: default_http_ports(),
            timeout_secs: default_http_timeout(),
            concurrency: default_http_concurrency(),
        }
    }
}

impl Default for RecogConfig {
    fn default() -> Self {
        Self {
            bin_path: default_recog_path(),
            server_db: default_server_db(),
            auth_db: default_auth_db(),
            timeout_secs: default_recog_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoverConfig::default();
        assert_eq!(config.nmap_path, "nmap");
        assert_eq!(config.target, "172.20.0.0/24");
        assert_eq!(config.http.ports, vec![80, 8080, 8081]);
        assert_eq!(config.http.timeout_secs, 3);
        assert_eq!(config.mdns.duration_secs, 5);
        assert_eq!(config.mdns.service_types.len(), 3);
        assert_eq!(config.recog.timeout_secs, 2);
        assert!(config.output.is_none());
    }
}
