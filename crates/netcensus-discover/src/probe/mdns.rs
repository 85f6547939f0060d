//! Passive mDNS identity probe.
//!
//! Joins the well-known mDNS multicast group and collects service
//! announcements for a fixed window. Announcement TXT records carry
//! vendor-specific key/value properties; each logical attribute is mapped
//! from an ordered list of candidate keys, first match wins.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use async_trait::async_trait;
use dns_parser::{Packet, RData};
use tokio::net::UdpSocket;

use netcensus_core::IdentityFragment;

use crate::config::MdnsConfig;
use crate::probe::{IdentityProbe, ProbeContext};

const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MDNS_PORT: u16 = 5353;

/// Candidate TXT keys per logical attribute, in precedence order.
const MODEL_KEYS: &[&str] = &["md", "model", "product"];
const VERSION_KEYS: &[&str] = &["ve", "version", "sw"];
const ID_KEYS: &[&str] = &["id", "deviceid", "uuid"];

pub struct MdnsProbe {
    duration: std::time::Duration,
    service_types: Vec<String>,
}

impl MdnsProbe {
    pub fn new(config: &MdnsConfig) -> Self {
        Self {
            duration: std::time::Duration::from_secs(config.duration_secs),
            service_types: config.service_types.clone(),
        }
    }

    /// Listen for the full configured window. There is no early exit; the
    /// window bounds the phase regardless of announcement volume.
    async fn listen(&self) -> std::io::Result<HashMap<String, IdentityFragment>> {
        let socket = UdpSocket::bind(("0.0.0.0", MDNS_PORT)).await?;
        socket.join_multicast_v4(MDNS_GROUP, Ipv4Addr::UNSPECIFIED)?;

        let mut found = HashMap::new();
        let deadline = tokio::time::Instant::now() + self.duration;
        let mut buf = vec![0u8; 4096];

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
                Err(_) => break,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "mDNS socket error, stopping listener");
                    break;
                }
                Ok(Ok((len, peer))) => {
                    if let Some((ip, fragment)) =
                        self.decode_announcement(&buf[..len], peer.ip())
                    {
                        tracing::info!(
                            ip = %ip,
                            model = fragment.model.as_deref().unwrap_or("unknown"),
                            "mDNS announcement decoded"
                        );
                        found.insert(ip, fragment);
                    }
                }
            }
        }

        Ok(found)
    }

    /// Decode one announcement packet into an address/fragment pair.
    ///
    /// Only packets advertising a watched service type are kept. The
    /// address comes from the packet's A record, falling back to the
    /// sender when the announcement carries none.
    fn decode_announcement(
        &self,
        data: &[u8],
        sender: std::net::IpAddr,
    ) -> Option<(String, IdentityFragment)> {
        let packet = match Packet::parse(data) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable mDNS packet");
                return None;
            }
        };

        let mut service_type: Option<String> = None;
        let mut instance: Option<String> = None;
        let mut address: Option<String> = None;
        let mut properties: BTreeMap<String, String> = BTreeMap::new();

        for record in packet.answers.iter().chain(packet.additional.iter()) {
            let name = record.name.to_string();

            if service_type.is_none() {
                service_type = self.watched_type(&name);
            }

            match &record.data {
                RData::PTR(ptr) => {
                    let target = ptr.0.to_string();
                    if self.watched_type(&name).is_some() {
                        instance.get_or_insert(target);
                    }
                }
                RData::SRV(_) => {
                    if self.watched_type(&name).is_some() {
                        instance.get_or_insert(name.clone());
                    }
                }
                RData::A(a) => {
                    address.get_or_insert(a.0.to_string());
                }
                RData::TXT(txt) => {
                    for segment in txt.iter() {
                        let text = String::from_utf8_lossy(segment);
                        if let Some((key, value)) = text.split_once('=') {
                            properties.insert(key.to_string(), value.to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        let service_type = service_type?;
        let ip = address.or_else(|| match sender {
            std::net::IpAddr::V4(v4) => Some(v4.to_string()),
            std::net::IpAddr::V6(_) => None,
        })?;

        Some((
            ip,
            fragment_from_announcement(&properties, instance.as_deref(), &service_type),
        ))
    }

    /// Match a record name against the watched service types, ignoring
    /// trailing dots on either side.
    fn watched_type(&self, name: &str) -> Option<String> {
        let name = name.trim_end_matches('.');
        self.service_types
            .iter()
            .find(|st| name.ends_with(st.trim_end_matches('.')))
            .cloned()
    }
}

#[async_trait]
impl IdentityProbe for MdnsProbe {
    fn name(&self) -> &'static str {
        "mDNS"
    }

    async fn run(&self, _ctx: &ProbeContext) -> HashMap<String, IdentityFragment> {
        tracing::info!(
            duration_secs = self.duration.as_secs(),
            services = self.service_types.len(),
            "Starting mDNS listener"
        );

        let found = match self.listen().await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "mDNS listener failed to start");
                HashMap::new()
            }
        };

        tracing::info!(identified = found.len(), "mDNS listener window closed");
        found
    }
}

/// Map raw TXT properties onto fragment attributes.
fn fragment_from_announcement(
    properties: &BTreeMap<String, String>,
    instance: Option<&str>,
    service_type: &str,
) -> IdentityFragment {
    let mut extra = properties.clone();
    extra.insert("service_type".to_string(), service_type.to_string());
    if let Some(instance) = instance {
        extra.insert("mdns_name".to_string(), instance.to_string());
    }
    if let Some(device_id) = first_of(properties, ID_KEYS) {
        extra.insert("id".to_string(), device_id);
    }

    IdentityFragment {
        vendor: None,
        model: first_of(properties, MODEL_KEYS),
        version: first_of(properties, VERSION_KEYS),
        detection_method: Some("mDNS".to_string()),
        extra,
    }
}

/// First-match-wins over candidate property keys.
fn first_of(properties: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| properties.get(*k))
        .cloned()
}
