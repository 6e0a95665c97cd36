//! Configuration model for the synchronizer
//!
//! The whole configuration arrives as one JSON document (in production,
//! the payload of a secret): upstream credentials plus the map-to-targets
//! wiring. Everything is validated up front via [`SyncConfig::validate`]:
//! malformed resource identifiers, bad port ranges, or empty target lists
//! fail the run before any reconciliation starts, never mid-pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default description tag attached to entries and rules we create
pub const DEFAULT_ENTRY_DESCRIPTION: &str = "SiteShield";

/// Top-level synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upstream map source configuration
    pub source: SourceConfig,

    /// Map identifier → ordered list of targets tracking that map
    pub mappings: HashMap<u64, Vec<TargetConfig>>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;

        if self.mappings.is_empty() {
            return Err(Error::config("no map-to-target mappings configured"));
        }

        for (map_id, targets) in &self.mappings {
            if *map_id == 0 {
                return Err(Error::config("map id must be a positive integer"));
            }
            if targets.is_empty() {
                return Err(Error::config(format!(
                    "map {map_id} has an empty target list; remove the entry or add targets"
                )));
            }
            for target in targets {
                target.validate().map_err(|e| {
                    Error::config(format!("map {map_id}: {e}"))
                })?;
            }
        }

        Ok(())
    }
}

/// Upstream map source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Akamai SiteShield API
    SiteShield {
        /// API host, e.g. `https://akab-xxxx.luna.akamaiapis.net`
        host: String,
        /// EdgeGrid client token
        client_token: String,
        /// EdgeGrid client secret
        client_secret: String,
        /// EdgeGrid access token
        access_token: String,
    },

    /// Custom map source resolved through the registry
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Registry key for this source kind
    pub fn kind(&self) -> &str {
        match self {
            SourceConfig::SiteShield { .. } => "site_shield",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::SiteShield {
                host,
                client_token,
                client_secret,
                access_token,
            } => {
                if !host.starts_with("https://") && !host.starts_with("http://") {
                    return Err(Error::config(format!(
                        "source host must be an http(s) URL, got '{host}'"
                    )));
                }
                if client_token.is_empty() || client_secret.is_empty() || access_token.is_empty()
                {
                    return Err(Error::config("source credentials must not be empty"));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }
}

/// IAM account a target lives in, reached via assume-role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Friendly account name for logs
    pub name: String,

    /// 12-digit AWS account id
    pub id: String,

    /// Role to assume in the target account
    pub role_name: String,
}

impl AccountConfig {
    /// Validate account id and role name shapes
    pub fn validate(&self) -> Result<()> {
        if self.id.len() != 12 || !self.id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::config(format!(
                "account id '{}' is not a 12-digit AWS account id",
                self.id
            )));
        }

        // Role name constraints per the IAM CreateRole API
        if self.role_name.is_empty() || self.role_name.len() > 64 {
            return Err(Error::config(format!(
                "role name '{}' must be 1-64 characters",
                self.role_name
            )));
        }
        let valid = self
            .role_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_+=,.@-".contains(c));
        if !valid {
            return Err(Error::config(format!(
                "role name '{}' contains invalid characters",
                self.role_name
            )));
        }

        Ok(())
    }
}

/// IP protocol of a security-group ingress rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

impl Protocol {
    /// Wire representation used by the EC2 API
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// A downstream resource tracking a map's CIDR set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetConfig {
    /// A managed prefix list
    PrefixList {
        /// Prefix list id (`pl-` followed by 8 or 17 hex characters)
        prefix_list_id: String,
        /// Region the prefix list lives in
        region: String,
        /// Owning account, when not the caller's own
        #[serde(default)]
        account: Option<AccountConfig>,
        /// Description tag for entries we add
        #[serde(default = "default_description")]
        description: String,
    },

    /// A security-group ingress rule identified by (protocol, port range)
    SecurityGroup {
        /// Security group id (`sg-` followed by 8 or 17 hex characters)
        group_id: String,
        /// Region the group lives in
        region: String,
        /// Owning account, when not the caller's own
        #[serde(default)]
        account: Option<AccountConfig>,
        /// Rule protocol
        protocol: Protocol,
        /// Start of the rule's port range (inclusive)
        from_port: u16,
        /// End of the rule's port range (inclusive)
        to_port: u16,
        /// Description tag for ranges we authorize
        #[serde(default = "default_description")]
        description: String,
    },
}

impl TargetConfig {
    /// Registry key for this target kind
    pub fn kind(&self) -> &'static str {
        match self {
            TargetConfig::PrefixList { .. } => "prefix-list",
            TargetConfig::SecurityGroup { .. } => "security-group",
        }
    }

    /// Resource identifier for logs
    pub fn resource_id(&self) -> &str {
        match self {
            TargetConfig::PrefixList { prefix_list_id, .. } => prefix_list_id,
            TargetConfig::SecurityGroup { group_id, .. } => group_id,
        }
    }

    /// Validate identifiers, ports, and descriptions
    pub fn validate(&self) -> Result<()> {
        match self {
            TargetConfig::PrefixList {
                prefix_list_id,
                region,
                account,
                description,
            } => {
                validate_resource_id(prefix_list_id, "pl-")?;
                validate_region(region)?;
                validate_description(description)?;
                if let Some(account) = account {
                    account.validate()?;
                }
                Ok(())
            }
            TargetConfig::SecurityGroup {
                group_id,
                region,
                account,
                from_port,
                to_port,
                description,
                ..
            } => {
                validate_resource_id(group_id, "sg-")?;
                validate_region(region)?;
                validate_description(description)?;
                if from_port > to_port {
                    return Err(Error::config(format!(
                        "port range {from_port}-{to_port} is inverted"
                    )));
                }
                if let Some(account) = account {
                    account.validate()?;
                }
                Ok(())
            }
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped with a warning rather than
    /// blocking the pass.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_description() -> String {
    DEFAULT_ENTRY_DESCRIPTION.to_string()
}

fn validate_resource_id(id: &str, prefix: &str) -> Result<()> {
    let rest = id.strip_prefix(prefix).ok_or_else(|| {
        Error::config(format!("resource id '{id}' must start with '{prefix}'"))
    })?;

    let hex = rest.bytes().all(|b| b.is_ascii_hexdigit());
    if !(hex && (rest.len() == 8 || rest.len() == 17)) {
        return Err(Error::config(format!(
            "resource id '{id}' must be '{prefix}' followed by 8 or 17 hex characters"
        )));
    }

    Ok(())
}

fn validate_region(region: &str) -> Result<()> {
    if region.is_empty() {
        return Err(Error::config("target region cannot be empty"));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.len() > 255 {
        return Err(Error::config(format!(
            "description is {} characters, maximum is 255",
            description.len()
        )));
    }
    Ok(())
}
