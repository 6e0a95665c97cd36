//! CIDR target trait
//!
//! The downstream side of the synchronizer: a resource whose CIDR
//! allow-list must track a map's proposed set. The engine stays
//! target-agnostic; prefix lists and security-group rules both implement
//! the same `apply` capability.

use async_trait::async_trait;

use crate::cidr::CidrSet;
use crate::config::TargetConfig;
use crate::error::Result;

/// Result of applying a desired CIDR set to a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The target already matched the desired set; nothing was written
    Unchanged,

    /// The target was mutated
    Applied {
        /// Blocks added to the target
        added: CidrSet,
        /// Blocks removed from the target
        removed: CidrSet,
    },
}

/// Trait for downstream allow-list targets
///
/// # Freshness
///
/// `apply` must re-read the target's live state immediately before
/// mutating and compute the diff from that read, never from a snapshot
/// taken earlier in the pass, and never from the upstream map's
/// `current_cidrs` field. This keeps the optimistic-concurrency window as
/// small as the API allows and tolerates drift between the upstream
/// snapshot and the target's true state.
///
/// # Idempotency
///
/// Applying the same desired set twice must yield `Unchanged` the second
/// time, with no mutation calls issued.
#[async_trait]
pub trait CidrTarget: Send + Sync {
    /// Reconcile the target's allow-list to exactly `desired`
    ///
    /// Returns [`ApplyOutcome::Unchanged`] without issuing any mutation
    /// call when the live state already matches.
    async fn apply(&self, desired: &CidrSet) -> Result<ApplyOutcome>;

    /// Resource identifier for logging (e.g. `pl-0123abcd`)
    fn target_id(&self) -> String;

    /// Target kind for logging (`prefix-list`, `security-group`)
    fn kind(&self) -> &'static str;
}

/// Helper trait for constructing targets from configuration
///
/// Construction is async because building an API client may itself require
/// credential resolution (e.g. assuming a role in the owning account).
#[async_trait]
pub trait TargetFactory: Send + Sync {
    /// Create a [`CidrTarget`] instance from configuration
    async fn create(&self, config: &TargetConfig) -> Result<Box<dyn CidrTarget>>;
}
