//! Managed prefix-list target
//!
//! Prefix lists have a hard entry capacity and a monotonically increasing
//! version. Every apply re-describes the list, re-reads its entries at the
//! observed version, plans the diff against that fresh state, checks the
//! projected entry count against the capacity, and submits one modify call
//! conditioned on the observed version. A version race is surfaced as a
//! `Conflict` and retried by a later pass, not here.

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{AddPrefixListEntry, RemovePrefixListEntry};

use shieldsync_core::cidr::{CidrSet, Diff, parse_cidr};
use shieldsync_core::config::TargetConfig;
use shieldsync_core::traits::{ApplyOutcome, CidrTarget, TargetFactory};
use shieldsync_core::{Error, Result};

use crate::account;

/// Snapshot of a prefix list's describe output
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PrefixListDescription {
    /// Lifecycle state, e.g. `modify-complete`
    pub state: Option<String>,
    /// Current version, used as the optimistic-concurrency token
    pub version: i64,
    /// Maximum number of entries the list may hold
    pub max_entries: usize,
}

/// Plan the update: compute the diff and enforce the capacity guard
///
/// Pure. Fails with [`Error::CapacityExceeded`] when the projected entry
/// count after the update would exceed `max_entries`; an empty diff always
/// plans successfully (removals free capacity before additions consume it,
/// so a full replacement within capacity is fine).
pub(crate) fn plan_update(
    current: &CidrSet,
    desired: &CidrSet,
    max_entries: usize,
) -> Result<Diff> {
    let diff = Diff::between(current, desired);
    if diff.is_empty() {
        return Ok(diff);
    }

    let projected = current.len() - diff.to_remove.len() + diff.to_add.len();
    if projected > max_entries {
        return Err(Error::CapacityExceeded {
            required: projected,
            max: max_entries,
        });
    }

    Ok(diff)
}

/// A managed prefix list tracking one map's CIDR set
pub struct PrefixListTarget {
    client: Client,
    prefix_list_id: String,
    region: String,
    description: String,
}

impl PrefixListTarget {
    /// Create a target from its configuration, building the regional EC2
    /// client (assuming a role when the list lives in another account)
    pub async fn from_config(config: &TargetConfig) -> Result<Self> {
        let TargetConfig::PrefixList {
            prefix_list_id,
            region,
            account,
            description,
        } = config
        else {
            return Err(Error::config("invalid config for prefix-list target"));
        };

        let shared = account::sdk_config(region, account.as_ref()).await;
        Ok(Self::with_client(
            Client::new(&shared),
            prefix_list_id.clone(),
            region.clone(),
            description.clone(),
        ))
    }

    /// Create a target around an existing client
    pub fn with_client(
        client: Client,
        prefix_list_id: String,
        region: String,
        description: String,
    ) -> Self {
        Self {
            client,
            prefix_list_id,
            region,
            description,
        }
    }

    /// Describe the prefix list
    ///
    /// Fails with [`Error::NotFound`] when the list no longer exists and
    /// with [`Error::Ambiguous`] when the API returns more than one match
    /// for the id.
    async fn describe(&self) -> Result<PrefixListDescription> {
        let output = self
            .client
            .describe_managed_prefix_lists()
            .prefix_list_ids(self.prefix_list_id.clone())
            .send()
            .await
            .map_err(|e| self.classify_error("DescribeManagedPrefixLists", &e))?;

        let lists = output.prefix_lists();
        match lists {
            [] => Err(Error::not_found(format!(
                "prefix list {} not found in {}",
                self.prefix_list_id, self.region
            ))),
            [list] => Ok(PrefixListDescription {
                state: list.state().map(|s| s.as_str().to_string()),
                version: list.version().ok_or_else(|| {
                    Error::api(
                        self.prefix_list_id.clone(),
                        "describe response carried no version",
                    )
                })?,
                max_entries: list.max_entries().unwrap_or(0).max(0) as usize,
            }),
            _ => Err(Error::ambiguous(format!(
                "{} prefix lists returned for {}",
                lists.len(),
                self.prefix_list_id
            ))),
        }
    }

    /// Read all entries at the given version
    ///
    /// Paginating at the version just observed by describe keeps the read a
    /// consistent snapshot even if the list changes mid-pagination.
    async fn current_entries(&self, version: i64) -> Result<CidrSet> {
        let mut pages = self
            .client
            .get_managed_prefix_list_entries()
            .prefix_list_id(self.prefix_list_id.clone())
            .target_version(version)
            .into_paginator()
            .send();

        let mut entries = CidrSet::new();
        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|e| self.classify_error("GetManagedPrefixListEntries", &e))?;
            for entry in page.entries() {
                if let Some(cidr) = entry.cidr() {
                    entries.insert(parse_cidr(cidr).map_err(|e| {
                        Error::api(
                            self.prefix_list_id.clone(),
                            format!("unparseable entry in prefix list: {e}"),
                        )
                    })?);
                }
            }
        }

        Ok(entries)
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

        if code.ends_with(".NotFound") {
            Error::not_found(format!(
                "prefix list {} not found in {}: {message}",
                self.prefix_list_id, self.region
            ))
        } else if code == "PrefixListVersionMismatch" || code == "IncorrectState" {
            // The version moved (or the list is mid-modification); a later
            // pass re-reads and retries.
            Error::conflict(format!(
                "prefix list {} changed concurrently ({code}): {message}",
                self.prefix_list_id
            ))
        } else {
            Error::api(
                self.prefix_list_id.clone(),
                format!("{operation}: {code} {message}"),
            )
        }
    }
}

#[async_trait]
impl CidrTarget for PrefixListTarget {
    async fn apply(&self, desired: &CidrSet) -> Result<ApplyOutcome> {
        // Freshness: re-read immediately before mutating, not at pass start
        let described = self.describe().await?;
        tracing::debug!(
            prefix_list_id = %self.prefix_list_id,
            state = described.state.as_deref(),
            version = described.version,
            max_entries = described.max_entries,
            "described prefix list"
        );
        let current = self.current_entries(described.version).await?;

        let diff = plan_update(&current, desired, described.max_entries)?;
        if diff.is_empty() {
            return Ok(ApplyOutcome::Unchanged);
        }

        let mut request = self
            .client
            .modify_managed_prefix_list()
            .prefix_list_id(self.prefix_list_id.clone())
            .current_version(described.version);

        for cidr in &diff.to_add {
            request = request.add_entries(
                AddPrefixListEntry::builder()
                    .cidr(cidr.to_string())
                    .description(self.description.clone())
                    .build()
                    .map_err(|e| {
                        Error::api(self.prefix_list_id.clone(), format!("invalid add entry: {e}"))
                    })?,
            );
        }
        for cidr in &diff.to_remove {
            request = request.remove_entries(
                RemovePrefixListEntry::builder()
                    .cidr(cidr.to_string())
                    .build()
                    .map_err(|e| {
                        Error::api(
                            self.prefix_list_id.clone(),
                            format!("invalid remove entry: {e}"),
                        )
                    })?,
            );
        }

        let output = request
            .send()
            .await
            .map_err(|e| self.classify_error("ModifyManagedPrefixList", &e))?;

        let new_version = output.prefix_list().and_then(|list| list.version());
        tracing::info!(
            prefix_list_id = %self.prefix_list_id,
            region = %self.region,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            version = ?new_version,
            "updated prefix list"
        );

        Ok(ApplyOutcome::Applied {
            added: diff.to_add,
            removed: diff.to_remove,
        })
    }

    fn target_id(&self) -> String {
        self.prefix_list_id.clone()
    }

    fn kind(&self) -> &'static str {
        "prefix-list"
    }
}

/// Factory for creating prefix-list targets
pub struct PrefixListFactory;

#[async_trait]
impl TargetFactory for PrefixListFactory {
    async fn create(&self, config: &TargetConfig) -> Result<Box<dyn CidrTarget>> {
        Ok(Box::new(PrefixListTarget::from_config(config).await?))
    }
}
