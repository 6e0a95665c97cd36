//! Test doubles and common utilities for engine contract tests

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use shieldsync_core::cidr::CidrSet;
use shieldsync_core::error::{Error, Result};
use shieldsync_core::map::ProposedMap;
use shieldsync_core::traits::{ApplyOutcome, CidrTarget, MapSource};

/// Build a ProposedMap fixture
pub fn proposed_map(id: u64, alias: &str, proposed: &[&str]) -> ProposedMap {
    ProposedMap {
        id,
        alias: alias.to_string(),
        acknowledged: false,
        current_cidrs: CidrSet::new(),
        proposed_cidrs: CidrSet::parse(proposed.iter().copied()).unwrap(),
        rule_name: None,
        service: None,
        acknowledge_required_by: None,
        acknowledged_on: None,
        acknowledged_by: None,
    }
}

/// A scripted MapSource that records acknowledge calls
#[derive(Clone)]
pub struct ScriptedMapSource {
    maps: Vec<ProposedMap>,
    fail_listing: bool,
    /// Map ids whose acknowledge call should fail
    fail_acknowledge_for: Vec<u64>,
    acknowledge_calls: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedMapSource {
    pub fn new(maps: Vec<ProposedMap>) -> Self {
        Self {
            maps,
            fail_listing: false,
            fail_acknowledge_for: Vec::new(),
            acknowledge_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_listing() -> Self {
        Self {
            maps: Vec::new(),
            fail_listing: true,
            fail_acknowledge_for: Vec::new(),
            acknowledge_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_acknowledge_for(mut self, map_id: u64) -> Self {
        self.fail_acknowledge_for.push(map_id);
        self
    }

    /// Map ids acknowledge() was called with, in order
    pub fn acknowledge_calls(&self) -> Vec<u64> {
        self.acknowledge_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MapSource for ScriptedMapSource {
    async fn list_maps(&self) -> Result<Vec<ProposedMap>> {
        if self.fail_listing {
            return Err(Error::source("listing failed"));
        }
        Ok(self.maps.clone())
    }

    async fn acknowledge(&self, map_id: u64) -> Result<ProposedMap> {
        self.acknowledge_calls.lock().unwrap().push(map_id);
        if self.fail_acknowledge_for.contains(&map_id) {
            return Err(Error::acknowledge(format!("map {map_id}: HTTP 502")));
        }
        let map = self
            .maps
            .iter()
            .find(|m| m.id == map_id)
            .cloned()
            .ok_or_else(|| Error::acknowledge(format!("map {map_id} unknown")))?;
        Ok(ProposedMap {
            acknowledged: true,
            ..map
        })
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// What a RecordingTarget should do on apply
#[derive(Clone)]
pub enum Behavior {
    Unchanged,
    Applied { added: &'static [&'static str], removed: &'static [&'static str] },
    FailApi,
    FailCapacity { required: usize, max: usize },
    FailConflict,
}

/// A CidrTarget double that records every apply call
#[derive(Clone)]
pub struct RecordingTarget {
    id: String,
    behavior: Behavior,
    apply_calls: Arc<AtomicUsize>,
    applied_sets: Arc<Mutex<Vec<CidrSet>>>,
    /// Shared across targets to observe cross-target ordering
    order_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingTarget {
    pub fn new(id: &str, behavior: Behavior) -> Self {
        Self {
            id: id.to_string(),
            behavior,
            apply_calls: Arc::new(AtomicUsize::new(0)),
            applied_sets: Arc::new(Mutex::new(Vec::new())),
            order_log: None,
        }
    }

    pub fn with_order_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.order_log = Some(log);
        self
    }

    pub fn apply_call_count(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Desired sets passed to apply(), in call order
    pub fn applied_sets(&self) -> Vec<CidrSet> {
        self.applied_sets.lock().unwrap().clone()
    }
}

#[async_trait]
impl CidrTarget for RecordingTarget {
    async fn apply(&self, desired: &CidrSet) -> Result<ApplyOutcome> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.applied_sets.lock().unwrap().push(desired.clone());
        if let Some(log) = &self.order_log {
            log.lock().unwrap().push(self.id.clone());
        }

        match &self.behavior {
            Behavior::Unchanged => Ok(ApplyOutcome::Unchanged),
            Behavior::Applied { added, removed } => Ok(ApplyOutcome::Applied {
                added: CidrSet::parse(added.iter().copied()).unwrap(),
                removed: CidrSet::parse(removed.iter().copied()).unwrap(),
            }),
            Behavior::FailApi => Err(Error::api(self.id.clone(), "connection reset")),
            Behavior::FailCapacity { required, max } => Err(Error::CapacityExceeded {
                required: *required,
                max: *max,
            }),
            Behavior::FailConflict => Err(Error::conflict("version moved during apply")),
        }
    }

    fn target_id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> &'static str {
        "recording"
    }
}
