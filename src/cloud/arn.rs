//! Amazon Resource Name parsing

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArnError {
    #[error("'{0}' does not start with 'arn:'")]
    MissingPrefix(String),
    #[error("'{0}' has fewer than 6 colon-delimited segments")]
    TooFewSegments(String),
}

/// `arn:partition:service:region:account:resource`
///
/// The resource part keeps any further `:` or `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if !raw.starts_with("arn:") {
            return Err(ArnError::MissingPrefix(raw.to_string()));
        }
        let parts: Vec<&str> = raw.splitn(6, ':').collect();
        if parts.len() < 6 {
            return Err(ArnError::TooFewSegments(raw.to_string()));
        }
        Ok(Arn {
            partition: parts[1].to_string(),
            service: parts[2].to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            resource: parts[5].to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

impl Arn {
    /// ARN of another resource in the same service, region and account
    pub fn sibling(&self, resource: impl Into<String>) -> Arn {
        Arn {
            partition: self.partition.clone(),
            service: self.service.clone(),
            region: self.region.clone(),
            account_id: self.account_id.clone(),
            resource: resource.into(),
        }
    }

    /// Last segment of the resource path, split on `/` and `:`
    pub fn resource_name(&self) -> &str {
        self.resource
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(&self.resource)
    }
}

/// Best-effort display name for an ARN or plain identifier
pub fn short_name(id: &str) -> &str {
    match id.parse::<Arn>() {
        Ok(_) => id.rsplit(['/', ':']).next().unwrap_or(id),
        Err(_) => id,
    }
}
