use std::{fmt, net::Ipv4Addr, str::FromStr};

use shared::domain::Droplet;
use thiserror::Error;
use tracing::warn;

/// Group header expected by the provisioning tooling that consumes the document.
pub const INVENTORY_HEADER: &str = "[node]";
pub const EMPTY_INVENTORY: &str = "no droplets found";

/// Addresses of the group as seen in one snapshot.
///
/// `Empty` means the group has no members at all. A group whose members have
/// not been assigned addresses yet is `Hosts` with an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inventory {
    Empty,
    Hosts(Vec<Ipv4Addr>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryParseError {
    #[error("inventory does not start with the [node] header")]
    MissingHeader,
    #[error("line {line}: '{value}' is not an IPv4 address")]
    InvalidAddress { line: usize, value: String },
}

impl Inventory {
    pub fn from_droplets(droplets: &[Droplet]) -> Self {
        if droplets.is_empty() {
            return Inventory::Empty;
        }

        let hosts = droplets
            .iter()
            .filter_map(|droplet| {
                let address = droplet.primary_ipv4();
                if address.is_none() {
                    warn!(droplet_id = %droplet.id, status = ?droplet.status, "inventory: droplet has no IPv4 address");
                }
                address
            })
            .collect();
        Inventory::Hosts(hosts)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Inventory::Empty)
    }

    pub fn hosts(&self) -> &[Ipv4Addr] {
        match self {
            Inventory::Empty => &[],
            Inventory::Hosts(hosts) => hosts,
        }
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inventory::Empty => f.write_str(EMPTY_INVENTORY),
            Inventory::Hosts(hosts) => {
                f.write_str(INVENTORY_HEADER)?;
                for host in hosts {
                    write!(f, "\n{host}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Inventory {
    type Err = InventoryParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.trim() == EMPTY_INVENTORY {
            return Ok(Inventory::Empty);
        }

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        match lines.next() {
            Some((_, INVENTORY_HEADER)) => {}
            _ => return Err(InventoryParseError::MissingHeader),
        }

        let hosts = lines
            .map(|(line, value)| {
                value
                    .parse::<Ipv4Addr>()
                    .map_err(|_| InventoryParseError::InvalidAddress {
                        line,
                        value: value.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Inventory::Hosts(hosts))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;

    fn droplet(id: i64, ip: Option<&str>) -> Droplet {
        let v4 = ip
            .map(|ip| vec![json!({ "ip_address": ip, "type": "public" })])
            .unwrap_or_default();
        serde_json::from_value(json!({
            "id": id,
            "name": "cloud-shepard",
            "status": "active",
            "networks": { "v4": v4, "v6": [] }
        }))
        .expect("droplet")
    }

    #[test]
    fn document_lists_header_then_one_address_per_line() {
        let inventory = Inventory::from_droplets(&[
            droplet(1, Some("10.0.0.1")),
            droplet(2, Some("10.0.0.2")),
        ]);
        assert_eq!(inventory.to_string(), "[node]\n10.0.0.1\n10.0.0.2");
    }

    #[test]
    fn empty_group_is_explicit() {
        let inventory = Inventory::from_droplets(&[]);
        assert!(inventory.is_empty());
        assert_eq!(inventory.to_string(), EMPTY_INVENTORY);
        assert!(!inventory.to_string().is_empty());
    }

    #[test]
    fn members_without_addresses_are_not_the_empty_group() {
        let inventory = Inventory::from_droplets(&[droplet(1, None)]);
        assert_eq!(inventory, Inventory::Hosts(Vec::new()));
        assert_eq!(inventory.to_string(), INVENTORY_HEADER);
    }

    #[test]
    fn document_parses_back_to_snapshot_addresses() {
        let snapshot = vec![
            droplet(1, Some("188.166.1.10")),
            droplet(2, Some("188.166.1.11")),
            droplet(3, Some("188.166.1.12")),
        ];
        let rendered = Inventory::from_droplets(&snapshot).to_string();
        let parsed: Inventory = rendered.parse().expect("parse");

        let expected: BTreeSet<Ipv4Addr> =
            snapshot.iter().filter_map(Droplet::primary_ipv4).collect();
        let actual: BTreeSet<Ipv4Addr> = parsed.hosts().iter().copied().collect();
        assert_eq!(actual, expected);
        assert_eq!("no droplets found\n".parse::<Inventory>(), Ok(Inventory::Empty));
    }

    #[test]
    fn parse_rejects_malformed_documents() {
        assert_eq!(
            "10.0.0.1".parse::<Inventory>(),
            Err(InventoryParseError::MissingHeader)
        );
        assert_eq!(
            "[node]\n10.0.0.1\nnot-an-ip".parse::<Inventory>(),
            Err(InventoryParseError::InvalidAddress {
                line: 3,
                value: "not-an-ip".into()
            })
        );
    }
}
