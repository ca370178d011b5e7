use std::{collections::BTreeMap, fmt, net::Ipv4Addr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(DropletId);

/// Provider lifecycle state. The provider may introduce states this tool
/// does not know about; those are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropletStatus {
    New,
    Active,
    Off,
    Archive,
    #[serde(untagged)]
    Other(String),
}

impl DropletStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, DropletStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkV4 {
    pub ip_address: Ipv4Addr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkV4>,
    #[serde(default)]
    pub v6: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Droplet {
    pub id: DropletId,
    pub name: String,
    pub status: DropletStatus,
    #[serde(default)]
    pub networks: Networks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Provider fields this tool does not interpret, preserved for `list`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Droplet {
    /// Address of the first IPv4 network entry, if the provider has assigned one yet.
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.networks.v4.first().map(|net| net.ip_address)
    }
}

pub fn count_active(droplets: &[Droplet]) -> usize {
    droplets
        .iter()
        .filter(|droplet| droplet.status.is_active())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_preserved() {
        let status: DropletStatus = serde_json::from_str("\"rebooting\"").expect("status");
        assert_eq!(status, DropletStatus::Other("rebooting".into()));
        assert!(!status.is_active());

        let active: DropletStatus = serde_json::from_str("\"active\"").expect("status");
        assert!(active.is_active());
    }

    #[test]
    fn primary_ipv4_takes_first_entry() {
        let droplet: Droplet = serde_json::from_value(serde_json::json!({
            "id": 3164444,
            "name": "cloud-shepard",
            "status": "active",
            "memory": 512,
            "networks": {
                "v4": [
                    { "ip_address": "104.236.32.182", "netmask": "255.255.192.0", "gateway": "104.236.0.1", "type": "public" },
                    { "ip_address": "10.128.0.4", "type": "private" }
                ],
                "v6": []
            }
        }))
        .expect("droplet");

        assert_eq!(droplet.primary_ipv4(), Some(Ipv4Addr::new(104, 236, 32, 182)));
        assert_eq!(droplet.extra.get("memory"), Some(&Value::from(512)));
    }

    #[test]
    fn new_droplet_without_networks_has_no_address() {
        let droplet: Droplet = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "cloud-shepard",
            "status": "new"
        }))
        .expect("droplet");

        assert_eq!(droplet.primary_ipv4(), None);
        assert_eq!(count_active(&[droplet]), 0);
    }
}
