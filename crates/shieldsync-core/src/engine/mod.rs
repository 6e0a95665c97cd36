//! Reconciliation engine
//!
//! One [`Reconciler::run`] call is one pass: list the upstream maps, filter
//! to the outstanding ones we have targets for, drive every configured
//! target to the proposed CIDR set, and acknowledge each map whose targets
//! all succeeded.
//!
//! ```text
//! ┌───────────┐   list    ┌────────────┐   apply    ┌─────────────┐
//! │ MapSource │──────────▶│ Reconciler │───────────▶│ CidrTarget  │
//! └───────────┘           └────────────┘  (per map, └─────────────┘
//!       ▲                       │           in configured order)
//!       │   acknowledge         │
//!       └───────────────────────┘  only when every outcome succeeded
//! ```
//!
//! ## Failure containment
//!
//! A target failure is recorded and the remaining targets of the same map
//! are still attempted (partial progress is valuable for observability),
//! but the map is then left unacknowledged: the provider keeps re-proposing
//! it, which is the retry path. Only a configuration error or a failed
//! listing aborts the pass.
//!
//! ## Ordering
//!
//! Maps are processed sequentially, in listing order, and a map's targets
//! in configured order. Sequential processing makes a shared-target race
//! structurally impossible; see DESIGN.md for the trade-off.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cidr::CidrSet;
use crate::config::{EngineConfig, SyncConfig};
use crate::error::{Error, Result};
use crate::map::ProposedMap;
use crate::registry::TargetRegistry;
use crate::traits::{ApplyOutcome, CidrTarget, MapSource};

/// Why a map was skipped without applying anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The map is not present in the source-to-targets mapping
    NoConfiguredTargets,
    /// The proposal carried an empty CIDR set; applying it would revoke
    /// all access, so it is treated as suspicious input
    EmptyProposal,
}

/// Events emitted by the engine for external monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A pass started after a successful listing
    PassStarted {
        /// Number of maps the source returned
        maps_listed: usize,
    },

    /// A map was skipped without touching any target
    MapSkipped {
        map_id: u64,
        reason: SkipReason,
    },

    /// A target already matched the proposed set
    TargetUnchanged {
        map_id: u64,
        target_id: String,
    },

    /// A target was mutated
    TargetApplied {
        map_id: u64,
        target_id: String,
        added: usize,
        removed: usize,
    },

    /// A target apply failed; the map will not be acknowledged
    TargetFailed {
        map_id: u64,
        target_id: String,
        cause: String,
    },

    /// All targets succeeded and the map was acknowledged upstream
    MapAcknowledged {
        map_id: u64,
    },

    /// The acknowledge call itself failed (non-fatal for other maps)
    AcknowledgeFailed {
        map_id: u64,
        cause: String,
    },

    /// The pass finished
    PassFinished {
        acknowledged: usize,
        failed_targets: usize,
    },
}

/// Per-target outcome of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Live state already matched; no mutation was issued
    Unchanged,
    /// The target was updated
    Applied {
        /// Blocks added
        added: CidrSet,
        /// Blocks removed
        removed: CidrSet,
    },
    /// The apply failed; the error stayed local to this target
    Failed {
        /// Rendered cause, with the original error's context
        cause: String,
    },
}

impl TargetOutcome {
    /// Whether this outcome blocks acknowledgment
    pub fn is_failure(&self) -> bool {
        matches!(self, TargetOutcome::Failed { .. })
    }
}

/// Outcome of one target within a map's reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    /// Resource identifier
    pub target_id: String,
    /// Target kind
    pub kind: &'static str,
    /// What happened
    pub outcome: TargetOutcome,
}

/// Outcome of one map's reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReport {
    /// Upstream map identifier
    pub map_id: u64,
    /// Map alias, for log correlation
    pub alias: String,
    /// Set when the map was skipped before touching targets
    pub skipped: Option<SkipReason>,
    /// Per-target outcomes, in configured order
    pub outcomes: Vec<TargetReport>,
    /// Whether the map was acknowledged upstream
    pub acknowledged: bool,
    /// Set when every target succeeded but the acknowledge call failed
    pub acknowledge_error: Option<String>,
}

impl MapReport {
    /// Whether every attempted target succeeded
    pub fn all_targets_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|t| !t.outcome.is_failure())
    }
}

/// Aggregated result of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Per-map reports, in processing order
    pub maps: Vec<MapReport>,
}

impl RunReport {
    /// Number of maps acknowledged this pass
    pub fn acknowledged_count(&self) -> usize {
        self.maps.iter().filter(|m| m.acknowledged).count()
    }

    /// Number of target applies that failed this pass
    pub fn failed_target_count(&self) -> usize {
        self.maps
            .iter()
            .flat_map(|m| &m.outcomes)
            .filter(|t| t.outcome.is_failure())
            .count()
    }

    /// Whether anything went wrong (failed targets or failed acknowledges)
    pub fn has_failures(&self) -> bool {
        self.failed_target_count() > 0 || self.maps.iter().any(|m| m.acknowledge_error.is_some())
    }
}

/// Reconciliation engine
///
/// Owns the upstream source and the map-to-targets wiring for the duration
/// of a pass. Construct with [`Reconciler::new`] (or
/// [`Reconciler::from_config`] to resolve implementations through a
/// registry), then call [`Reconciler::run`] once per invocation.
pub struct Reconciler {
    /// Upstream provider of proposals
    source: Box<dyn MapSource>,

    /// Map identifier → targets tracking that map, in configured order
    targets: HashMap<u64, Vec<Box<dyn CidrTarget>>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create an engine from already-built collaborators
    ///
    /// Returns the engine and the receiving end of its event channel.
    pub fn new(
        source: Box<dyn MapSource>,
        targets: HashMap<u64, Vec<Box<dyn CidrTarget>>>,
        engine: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        for (map_id, list) in &targets {
            if list.is_empty() {
                return Err(Error::config(format!(
                    "map {map_id} has an empty target list"
                )));
            }
        }

        let (tx, rx) = mpsc::channel(engine.event_channel_capacity.max(1));

        Ok((
            Self {
                source,
                targets,
                event_tx: tx,
            },
            rx,
        ))
    }

    /// Create an engine from configuration, resolving implementations
    /// through the registry
    ///
    /// Validates the configuration before building anything.
    pub async fn from_config(
        config: &SyncConfig,
        registry: &TargetRegistry,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let source = registry.create_source(&config.source)?;

        let mut targets = HashMap::new();
        for (map_id, target_configs) in &config.mappings {
            let mut list = Vec::with_capacity(target_configs.len());
            for target_config in target_configs {
                list.push(registry.create_target(target_config).await?);
            }
            targets.insert(*map_id, list);
        }

        Self::new(source, targets, &config.engine)
    }

    /// Run one reconciliation pass
    ///
    /// Fails only when the upstream listing fails; every other failure is
    /// contained in the returned [`RunReport`].
    pub async fn run(&self) -> Result<RunReport> {
        let maps = self.source.list_maps().await?;
        info!(
            source = self.source.source_name(),
            maps = maps.len(),
            "retrieved maps"
        );
        self.emit(ReconcileEvent::PassStarted {
            maps_listed: maps.len(),
        });

        let mut report = RunReport::default();

        for map in maps.iter().filter(|m| m.is_outstanding()) {
            let Some(targets) = self.targets.get(&map.id) else {
                // A map without configured targets belongs to a different
                // consumer: skipped, not an error.
                debug!(map_id = map.id, alias = %map.alias, "no configured targets; skipping");
                self.emit(ReconcileEvent::MapSkipped {
                    map_id: map.id,
                    reason: SkipReason::NoConfiguredTargets,
                });
                continue;
            };

            report.maps.push(self.reconcile_map(map, targets).await);
        }

        if report.maps.is_empty() {
            info!("no outstanding maps with configured targets");
        }

        self.emit(ReconcileEvent::PassFinished {
            acknowledged: report.acknowledged_count(),
            failed_targets: report.failed_target_count(),
        });

        Ok(report)
    }

    /// Reconcile a single map across its targets and decide acknowledgment
    async fn reconcile_map(
        &self,
        map: &ProposedMap,
        targets: &[Box<dyn CidrTarget>],
    ) -> MapReport {
        let mut report = MapReport {
            map_id: map.id,
            alias: map.alias.clone(),
            skipped: None,
            outcomes: Vec::with_capacity(targets.len()),
            acknowledged: false,
            acknowledge_error: None,
        };

        if map.proposed_cidrs.is_empty() {
            // An empty proposal would revoke every authorized block; refuse
            // to apply it and leave the map unacknowledged.
            warn!(map_id = map.id, alias = %map.alias, "empty proposed CIDR set; skipping");
            self.emit(ReconcileEvent::MapSkipped {
                map_id: map.id,
                reason: SkipReason::EmptyProposal,
            });
            report.skipped = Some(SkipReason::EmptyProposal);
            return report;
        }

        for target in targets {
            let target_id = target.target_id();
            let outcome = match target.apply(&map.proposed_cidrs).await {
                Ok(ApplyOutcome::Unchanged) => {
                    info!(
                        map_id = map.id,
                        target = %target_id,
                        kind = target.kind(),
                        "target already up to date"
                    );
                    self.emit(ReconcileEvent::TargetUnchanged {
                        map_id: map.id,
                        target_id: target_id.clone(),
                    });
                    TargetOutcome::Unchanged
                }
                Ok(ApplyOutcome::Applied { added, removed }) => {
                    info!(
                        map_id = map.id,
                        target = %target_id,
                        kind = target.kind(),
                        added = added.len(),
                        removed = removed.len(),
                        "target updated"
                    );
                    self.emit(ReconcileEvent::TargetApplied {
                        map_id: map.id,
                        target_id: target_id.clone(),
                        added: added.len(),
                        removed: removed.len(),
                    });
                    TargetOutcome::Applied { added, removed }
                }
                // A failed target must not prevent attempting the rest of
                // this map's targets.
                Err(e) => {
                    warn!(
                        map_id = map.id,
                        target = %target_id,
                        kind = target.kind(),
                        error = %e,
                        "target update failed"
                    );
                    self.emit(ReconcileEvent::TargetFailed {
                        map_id: map.id,
                        target_id: target_id.clone(),
                        cause: e.to_string(),
                    });
                    TargetOutcome::Failed {
                        cause: e.to_string(),
                    }
                }
            };

            report.outcomes.push(TargetReport {
                target_id,
                kind: target.kind(),
                outcome,
            });
        }

        if report.all_targets_succeeded() {
            match self.source.acknowledge(map.id).await {
                Ok(_) => {
                    info!(map_id = map.id, alias = %map.alias, "map acknowledged");
                    self.emit(ReconcileEvent::MapAcknowledged { map_id: map.id });
                    report.acknowledged = true;
                }
                Err(e) => {
                    warn!(map_id = map.id, error = %e, "acknowledge failed");
                    self.emit(ReconcileEvent::AcknowledgeFailed {
                        map_id: map.id,
                        cause: e.to_string(),
                    });
                    report.acknowledge_error = Some(e.to_string());
                }
            }
        } else {
            warn!(
                map_id = map.id,
                alias = %map.alias,
                "one or more targets failed; map left unacknowledged"
            );
        }

        report
    }

    /// Emit an engine event without blocking the pass
    fn emit(&self, event: ReconcileEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping event");
        }
    }
}
