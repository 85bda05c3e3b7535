use std::collections::BTreeSet;

use crate::device::{CredentialRole, SessionError, SessionFactory};
use crate::utils::is_valid_ipv4;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("could not open a session to core device {core}: {source}")]
    Session {
        core: String,
        #[source]
        source: SessionError,
    },

    #[error("ARP query on core device {core} failed: {source}")]
    Query {
        core: String,
        #[source]
        source: SessionError,
    },

    #[error("no resolved ARP entries on core device {core}")]
    NoAddresses { core: String },
}

/// ARP query for the staging VLAN, minus excluded entries and the header.
/// An empty exclude pattern would match every line, so it is left out.
pub fn arp_query(vlan: &str, exclude: &str) -> String {
    if exclude.trim().is_empty() {
        format!("show ip arp vlan {} | exclude Protocol", vlan)
    } else {
        format!("show ip arp vlan {} | exclude {}|Protocol", vlan, exclude)
    }
}

/// Resolved addresses from `show ip arp` output.
/// Only lines whose second column is an IPv4 address count; incomplete
/// entries, headers and exec timestamp banners are skipped.
pub fn parse_arp_table(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter(|line| !line.contains("Incomplete"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|address| is_valid_ipv4(address))
        .map(str::to_string)
        .collect()
}

/// Read candidate addresses for the staging VLAN from the core switch
pub async fn discover(
    factory: &dyn SessionFactory,
    core: &str,
    vlan: &str,
    exclude: &str,
) -> Result<BTreeSet<String>, DiscoveryError> {
    let query = arp_query(vlan, exclude);
    let mut session = factory.session(core, CredentialRole::Core);

    session.open().await.map_err(|source| DiscoveryError::Session {
        core: core.to_string(),
        source,
    })?;

    let result = session.cli(std::slice::from_ref(&query)).await;
    if let Err(e) = session.close().await {
        tracing::debug!("Closing core session to {} failed: {}", core, e);
    }

    let mut outputs = result.map_err(|source| DiscoveryError::Query {
        core: core.to_string(),
        source,
    })?;
    let output = outputs.remove(&query).unwrap_or_default();

    let addresses = parse_arp_table(&output);
    if addresses.is_empty() {
        return Err(DiscoveryError::NoAddresses {
            core: core.to_string(),
        });
    }

    tracing::info!("Discovered {} devices on VLAN {} via {}", addresses.len(), vlan, core);
    Ok(addresses)
}
