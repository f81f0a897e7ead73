//! Reverse DNS alias lookup
//!
//! Hosted zones carry no index by alias target, so finding the records that
//! point at a load balancer means scanning every record set of every zone.

use crate::cloud::model::{HostedZone, RecordSet};
use crate::cloud::{ApiResult, DnsApi, collect_pages};
use std::sync::Arc;

/// An alias record and the zone it lives in
#[derive(Debug, Clone, PartialEq)]
pub struct AliasRecord {
    pub zone: HostedZone,
    pub record: RecordSet,
}

impl AliasRecord {
    /// Stable synthetic id: `route53:<zone>:<name>:<type>[:<set identifier>]`
    pub fn node_id(&self) -> String {
        let mut id = format!(
            "route53:{}:{}:{}",
            self.zone.id, self.record.name, self.record.record_type
        );
        if let Some(set_id) = &self.record.set_identifier {
            id.push(':');
            id.push_str(set_id);
        }
        id
    }
}

/// Canonical form for comparing DNS names
///
/// Lowercased, without the trailing root dot or the `dualstack.` prefix that
/// alias targets for load balancers often carry.
pub fn normalize_dns_name(name: &str) -> String {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    match name.strip_prefix("dualstack.") {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

pub struct DnsAliasResolver {
    api: Arc<dyn DnsApi>,
}

impl DnsAliasResolver {
    pub fn new(api: Arc<dyn DnsApi>) -> Self {
        Self { api }
    }

    /// Every alias record whose target is `dns_name`
    ///
    /// Fails only if the zones cannot be listed; a zone whose records cannot
    /// be read is skipped.
    pub async fn aliases_for(&self, dns_name: &str) -> ApiResult<Vec<AliasRecord>> {
        let wanted = normalize_dns_name(dns_name);
        let zones = collect_pages(|token| self.api.list_hosted_zones(token)).await?;
        tracing::debug!("Scanning {} hosted zones for aliases of {}", zones.len(), wanted);

        let mut matches = Vec::new();
        for zone in zones {
            let records =
                match collect_pages(|token| self.api.list_record_sets(&zone.id, token)).await {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!("Skipping hosted zone {}: {}", zone.id, e);
                        continue;
                    }
                };
            for record in records {
                let is_match = record
                    .alias_target
                    .as_ref()
                    .is_some_and(|alias| normalize_dns_name(&alias.dns_name) == wanted);
                if is_match {
                    matches.push(AliasRecord {
                        zone: zone.clone(),
                        record,
                    });
                }
            }
        }
        Ok(matches)
    }
}
