use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};

use super::serials::Serial;
use crate::utils::is_valid_hostname;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("inventory is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("inventory must be a mapping of hostname to serial")]
    NotAMapping,

    #[error("inventory is empty")]
    Empty,

    #[error("inventory entry '{0}' is not a hostname: serial pair")]
    InvalidEntry(String),

    #[error("'{0}' is not a valid hostname")]
    InvalidHostname(String),

    #[error("serial {serial} is listed for both {first} and {second}")]
    DuplicateSerial {
        serial: String,
        first: String,
        second: String,
    },
}

/// Operator-supplied desired state: hostname to expected chassis serial
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: BTreeMap<String, String>,
}

impl Inventory {
    /// Parse a YAML `hostname: serial` mapping. Scalars are taken as text,
    /// so serials that look numeric keep their digits as written.
    pub fn parse(raw: &[u8]) -> Result<Self, InventoryError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(InventoryError::Empty);
        }
        let doc: Value = serde_yaml::from_slice(raw)?;
        let mapping = match doc {
            Value::Mapping(m) => m,
            Value::Null => return Err(InventoryError::Empty),
            _ => return Err(InventoryError::NotAMapping),
        };

        let mut pairs = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let hostname = scalar_text(&key)
                .ok_or_else(|| InventoryError::InvalidEntry(format!("{:?}", key)))?;
            let serial = scalar_text(&value)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| InventoryError::InvalidEntry(hostname.clone()))?;
            pairs.push((hostname, serial));
        }
        Self::from_entries(pairs)
    }

    pub fn from_entries<I, H, S>(entries: I) -> Result<Self, InventoryError>
    where
        I: IntoIterator<Item = (H, S)>,
        H: Into<String>,
        S: Into<String>,
    {
        let mut by_hostname = BTreeMap::new();
        let mut by_serial: HashMap<String, String> = HashMap::new();

        for (hostname, serial) in entries {
            let hostname = hostname.into().trim().to_string();
            let serial = serial.into().trim().to_string();

            if !is_valid_hostname(&hostname) {
                return Err(InventoryError::InvalidHostname(hostname));
            }
            if let Some(first) = by_serial.get(&serial) {
                return Err(InventoryError::DuplicateSerial {
                    serial,
                    first: first.clone(),
                    second: hostname,
                });
            }
            by_serial.insert(serial.clone(), hostname.clone());
            by_hostname.insert(hostname, serial);
        }

        if by_hostname.is_empty() {
            return Err(InventoryError::Empty);
        }
        Ok(Self { entries: by_hostname })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hostname whose expected serial equals `serial` exactly
    pub fn hostname_for(&self, serial: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, s)| s.as_str() == serial)
            .map(|(h, _)| h.as_str())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Outcome of matching live devices against the inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Address to hostname for devices to configure
    pub targets: BTreeMap<String, String>,
    /// Serials reported by more than one live address; none of those addresses is targeted
    pub ambiguous: BTreeMap<String, Vec<String>>,
}

/// Join live `address → serial` with the inventory on exact serial equality.
///
/// Unknown serials, serials the inventory does not list, and inventory
/// entries with no live device are all left out silently.
pub fn reconcile(live: &BTreeMap<String, Serial>, desired: &Inventory) -> Reconciliation {
    let mut by_serial: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (address, serial) in live {
        if let Some(serial) = serial.as_known() {
            by_serial.entry(serial).or_default().push(address);
        }
    }

    let mut result = Reconciliation::default();
    for (serial, addresses) in by_serial {
        let Some(hostname) = desired.hostname_for(serial) else {
            continue;
        };
        if addresses.len() > 1 {
            tracing::warn!(
                "Serial {} (inventory host {}) seen on {} addresses, skipping",
                serial,
                hostname,
                addresses.len()
            );
            result.ambiguous.insert(
                serial.to_string(),
                addresses.iter().map(|a| a.to_string()).collect(),
            );
            continue;
        }
        result
            .targets
            .insert(addresses[0].to_string(), hostname.to_string());
    }
    result
}

#[cfg(test)]
impl Inventory {
    pub fn serial(&self, hostname: &str) -> Option<&str> {
        self.entries.get(hostname).map(String::as_str)
    }
}
