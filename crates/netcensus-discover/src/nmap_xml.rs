//! Nmap ping-sweep XML deserialization.
//!
//! The liveness sweep runs nmap with `-sn -oX -`, which emits host status,
//! addresses and resolved names but no port data. This module provides
//! typed structs for exactly that subset, deserialized with `quick-xml`
//! and serde.

use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Root element: `<nmaprun>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "nmaprun")]
pub struct NmapRun {
    #[serde(rename = "@args")]
    pub args: Option<String>,
    #[serde(rename = "host", default)]
    pub hosts: Vec<NmapHost>,
    pub runstats: Option<RunStats>,
}

/// A single `<host>` entry from the sweep.
#[derive(Debug, Clone, Deserialize)]
pub struct NmapHost {
    pub status: Option<HostStatus>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    pub hostnames: Option<Hostnames>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostStatus {
    #[serde(rename = "@state")]
    pub state: String,
    #[serde(rename = "@reason")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: String,
    #[serde(rename = "@vendor")]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostnames {
    #[serde(rename = "hostname", default)]
    pub hostnames: Vec<Hostname>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostname {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStats {
    pub hosts: Option<RunStatsHosts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStatsHosts {
    #[serde(rename = "@up")]
    pub up: Option<String>,
    #[serde(rename = "@total")]
    pub total: Option<String>,
}

impl NmapHost {
    /// The IPv4 address, if present.
    pub fn ipv4(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addr_type == "ipv4")
            .map(|a| a.addr.as_str())
    }

    /// The MAC address, if present (local-segment sweeps only).
    pub fn mac(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addr_type == "mac")
            .map(|a| a.addr.as_str())
    }

    /// The first resolved hostname, if any.
    pub fn hostname(&self) -> Option<&str> {
        self.hostnames
            .as_ref()
            .and_then(|hn| hn.hostnames.first())
            .map(|h| h.name.as_str())
    }

    /// The reported liveness state ("up", "down", ...), if any.
    pub fn state(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.state.as_str())
    }
}

/// Parse nmap XML bytes into a structured `NmapRun`.
pub fn parse_nmap_xml(xml: &[u8]) -> Result<NmapRun> {
    quick_xml::de::from_reader(xml).map_err(|e| DiscoverError::XmlParse(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PING_SWEEP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sn -oX - 172.20.0.0/24">
  <host>
    <status state="up" reason="arp-response"/>
    <address addr="172.20.0.1" addrtype="ipv4"/>
    <address addr="AA:BB:CC:DD:EE:01" addrtype="mac" vendor="Ubiquiti"/>
    <hostnames>
      <hostname name="gateway.local" type="PTR"/>
    </hostnames>
  </host>
  <host>
    <status state="up" reason="arp-response"/>
    <address addr="172.20.0.10" addrtype="ipv4"/>
    <address addr="AA:BB:CC:DD:EE:10" addrtype="mac"/>
    <hostnames/>
  </host>
  <host>
    <status state="down" reason="no-response"/>
    <address addr="172.20.0.99" addrtype="ipv4"/>
  </host>
  <runstats>
    <finished time="1740400000" elapsed="2.50"/>
    <hosts up="2" down="1" total="3"/>
  </runstats>
</nmaprun>"#;

    #[test]
    fn test_parse_ping_sweep() {
        let run = parse_nmap_xml(PING_SWEEP_XML.as_bytes()).unwrap();
        assert_eq!(run.hosts.len(), 3);

        let gateway = &run.hosts[0];
        assert_eq!(gateway.ipv4(), Some("172.20.0.1"));
        assert_eq!(gateway.mac(), Some("AA:BB:CC:DD:EE:01"));
        assert_eq!(gateway.hostname(), Some("gateway.local"));
        assert_eq!(gateway.state(), Some("up"));

        let unnamed = &run.hosts[1];
        assert_eq!(unnamed.hostname(), None);

        let down = &run.hosts[2];
        assert_eq!(down.state(), Some("down"));
        assert_eq!(down.mac(), None);

        let stats = run.runstats.unwrap().hosts.unwrap();
        assert_eq!(stats.up.as_deref(), Some("2"));
        assert_eq!(stats.total.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_empty_sweep() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sn -oX - 192.168.99.0/24">
  <runstats>
    <hosts up="0" down="256" total="256"/>
  </runstats>
</nmaprun>"#;

        let run = parse_nmap_xml(xml.as_bytes()).unwrap();
        assert!(run.hosts.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_an_error() {
        assert!(parse_nmap_xml(b"not xml at all").is_err());
    }
}
