//! Security-group ingress target
//!
//! A target is one ingress rule identified by the exact
//! (protocol, from-port, to-port) tuple, never protocol alone, since a
//! group may carry independent rules for the same protocol on different
//! ports. Security groups have no version token; the only concurrency
//! guard is that the diff is computed from a read issued immediately
//! before mutating, and that racing authorize/revoke calls fail with
//! duplicate/missing-permission errors which we surface as conflicts.

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{IpPermission, IpRange};

use shieldsync_core::cidr::{CidrSet, Diff, parse_cidr};
use shieldsync_core::config::{Protocol, TargetConfig};
use shieldsync_core::traits::{ApplyOutcome, CidrTarget, TargetFactory};
use shieldsync_core::{Error, Result};

use crate::account;

/// Collect the CIDRs of the ingress rule matching the full tuple
///
/// Pure over the describe output. Returns the empty set when no rule
/// matches yet; the first apply then creates the rule by authorizing
/// into it.
pub(crate) fn rule_cidrs(
    permissions: &[IpPermission],
    protocol: &str,
    from_port: i32,
    to_port: i32,
) -> Result<CidrSet> {
    let mut cidrs = CidrSet::new();

    for permission in permissions {
        let matches = permission.ip_protocol() == Some(protocol)
            && permission.from_port() == Some(from_port)
            && permission.to_port() == Some(to_port);
        if !matches {
            continue;
        }

        for range in permission.ip_ranges() {
            if let Some(cidr) = range.cidr_ip() {
                cidrs.insert(parse_cidr(cidr)?);
            }
        }
    }

    Ok(cidrs)
}

/// A security-group ingress rule tracking one map's CIDR set
pub struct SecurityGroupTarget {
    client: Client,
    group_id: String,
    region: String,
    protocol: Protocol,
    from_port: u16,
    to_port: u16,
    description: String,
}

impl SecurityGroupTarget {
    /// Create a target from its configuration, building the regional EC2
    /// client (assuming a role when the group lives in another account)
    pub async fn from_config(config: &TargetConfig) -> Result<Self> {
        let TargetConfig::SecurityGroup {
            group_id,
            region,
            account,
            protocol,
            from_port,
            to_port,
            description,
        } = config
        else {
            return Err(Error::config("invalid config for security-group target"));
        };

        let shared = account::sdk_config(region, account.as_ref()).await;
        Ok(Self::with_client(
            Client::new(&shared),
            group_id.clone(),
            region.clone(),
            *protocol,
            *from_port,
            *to_port,
            description.clone(),
        ))
    }

    /// Create a target around an existing client
    #[allow(clippy::too_many_arguments)]
    pub fn with_client(
        client: Client,
        group_id: String,
        region: String,
        protocol: Protocol,
        from_port: u16,
        to_port: u16,
        description: String,
    ) -> Self {
        Self {
            client,
            group_id,
            region,
            protocol,
            from_port,
            to_port,
            description,
        }
    }

    /// Read the CIDRs currently authorized for the configured rule tuple
    async fn authorized_cidrs(&self) -> Result<CidrSet> {
        let output = self
            .client
            .describe_security_groups()
            .group_ids(self.group_id.clone())
            .send()
            .await
            .map_err(|e| self.classify_error("DescribeSecurityGroups", &e))?;

        let groups = output.security_groups();
        match groups {
            [] => Err(Error::not_found(format!(
                "security group {} not found in {}",
                self.group_id, self.region
            ))),
            [group] => rule_cidrs(
                group.ip_permissions(),
                self.protocol.as_str(),
                i32::from(self.from_port),
                i32::from(self.to_port),
            ),
            _ => Err(Error::ambiguous(format!(
                "{} security groups returned for {}",
                groups.len(),
                self.group_id
            ))),
        }
    }

    /// Build the ip-permission payload for a set of ranges
    ///
    /// Descriptions go on authorize calls only: revoke matches ranges by
    /// CIDR and must not carry descriptions.
    fn permission_for(&self, cidrs: &CidrSet, with_description: bool) -> IpPermission {
        let mut builder = IpPermission::builder()
            .ip_protocol(self.protocol.as_str())
            .from_port(i32::from(self.from_port))
            .to_port(i32::from(self.to_port));

        for cidr in cidrs {
            let mut range = IpRange::builder().cidr_ip(cidr.to_string());
            if with_description {
                range = range.description(self.description.clone());
            }
            builder = builder.ip_ranges(range.build());
        }

        builder.build()
    }

    /// Map an SDK error onto the error taxonomy
    fn classify_error<E: ProvideErrorMetadata>(
        &self,
        operation: &str,
        err: &SdkError<E>,
    ) -> Error {
        let code = err
            .as_service_error()
            .and_then(|service| service.code())
            .unwrap_or_default();
        let message = err
            .as_service_error()
            .and_then(|service| service.message())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());

        if code.ends_with(".NotFound") && code.starts_with("InvalidGroup") {
            Error::not_found(format!(
                "security group {} not found in {}: {message}",
                self.group_id, self.region
            ))
        } else if code == "InvalidPermission.Duplicate" || code == "InvalidPermission.NotFound" {
            // Someone else authorized/revoked the same range between our
            // read and our write.
            Error::conflict(format!(
                "security group {} changed concurrently ({code}): {message}",
                self.group_id
            ))
        } else {
            Error::api(self.group_id.clone(), format!("{operation}: {code} {message}"))
        }
    }
}

#[async_trait]
impl CidrTarget for SecurityGroupTarget {
    async fn apply(&self, desired: &CidrSet) -> Result<ApplyOutcome> {
        // Freshness: re-read immediately before mutating
        let current = self.authorized_cidrs().await?;
        let diff = Diff::between(&current, desired);

        // The EC2 API rejects authorize/revoke calls with empty range
        // lists, so a no-op must issue zero calls.
        if diff.is_empty() {
            return Ok(ApplyOutcome::Unchanged);
        }

        // Authorize before revoking so the rule never transiently drops
        // blocks that stay authorized.
        if !diff.to_add.is_empty() {
            self.client
                .authorize_security_group_ingress()
                .group_id(self.group_id.clone())
                .ip_permissions(self.permission_for(&diff.to_add, true))
                .send()
                .await
                .map_err(|e| self.classify_error("AuthorizeSecurityGroupIngress", &e))?;
        }

        if !diff.to_remove.is_empty() {
            self.client
                .revoke_security_group_ingress()
                .group_id(self.group_id.clone())
                .ip_permissions(self.permission_for(&diff.to_remove, false))
                .send()
                .await
                .map_err(|e| self.classify_error("RevokeSecurityGroupIngress", &e))?;
        }

        tracing::info!(
            group_id = %self.group_id,
            region = %self.region,
            protocol = self.protocol.as_str(),
            from_port = self.from_port,
            to_port = self.to_port,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "updated security group rule"
        );

        Ok(ApplyOutcome::Applied {
            added: diff.to_add,
            removed: diff.to_remove,
        })
    }

    fn target_id(&self) -> String {
        self.group_id.clone()
    }

    fn kind(&self) -> &'static str {
        "security-group"
    }
}

/// Factory for creating security-group targets
pub struct SecurityGroupFactory;

#[async_trait]
impl TargetFactory for SecurityGroupFactory {
    async fn create(&self, config: &TargetConfig) -> Result<Box<dyn CidrTarget>> {
        Ok(Box::new(SecurityGroupTarget::from_config(config).await?))
    }
}
