//! Upstream allow-list maps
//!
//! A [`ProposedMap`] is the unit of work for a reconciliation pass: a named
//! CIDR allow-list published by the edge provider, carrying the currently
//! acknowledged set and the newly proposed set. Maps are immutable once
//! read; their lifecycle is a single pass.

use chrono::{DateTime, Utc};

use crate::cidr::CidrSet;

/// An outstanding allow-list proposal from the edge provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedMap {
    /// Upstream map identifier (positive)
    pub id: u64,

    /// Human-readable alias for the map
    pub alias: String,

    /// Whether the current proposal has already been acknowledged
    pub acknowledged: bool,

    /// The CIDR set as last acknowledged upstream
    ///
    /// Informational only: diffs are always computed against a target's live
    /// state, never against this snapshot, to tolerate drift.
    pub current_cidrs: CidrSet,

    /// The newly proposed CIDR set
    pub proposed_cidrs: CidrSet,

    /// Upstream rule name, when the provider reports one
    pub rule_name: Option<String>,

    /// Upstream service name, when the provider reports one
    pub service: Option<String>,

    /// Deadline by which the provider expects an acknowledgment
    pub acknowledge_required_by: Option<DateTime<Utc>>,

    /// When the map was last acknowledged
    pub acknowledged_on: Option<DateTime<Utc>>,

    /// Who last acknowledged the map
    pub acknowledged_by: Option<String>,
}

impl ProposedMap {
    /// Whether this map is waiting for an acknowledgment
    pub fn is_outstanding(&self) -> bool {
        !self.acknowledged
    }
}
