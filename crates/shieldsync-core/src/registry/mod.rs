//! Plugin-based factory registry
//!
//! Target and source implementations register themselves by kind, letting
//! the engine be assembled from configuration without hardcoded if-else
//! chains over vendor crates.
//!
//! ```rust,ignore
//! use shieldsync_core::registry::TargetRegistry;
//!
//! let registry = TargetRegistry::new();
//! shieldsync_target_aws::register(&registry);
//! shieldsync_source_siteshield::register(&registry);
//!
//! let source = registry.create_source(&config.source)?;
//! let target = registry.create_target(&target_config).await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::{SourceConfig, TargetConfig};
use crate::error::{Error, Result};
use crate::traits::{CidrTarget, MapSource, MapSourceFactory, TargetFactory};

/// Factory registry for targets and map sources
///
/// Uses interior mutability with `RwLock`, allowing concurrent reads and
/// exclusive writes during registration.
#[derive(Default)]
pub struct TargetRegistry {
    /// Registered target factories, keyed by target kind
    targets: RwLock<HashMap<String, Arc<dyn TargetFactory>>>,

    /// Registered map source factories, keyed by source kind
    sources: RwLock<HashMap<String, Arc<dyn MapSourceFactory>>>,
}

impl TargetRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target factory
    ///
    /// # Parameters
    ///
    /// - `kind`: Target kind (e.g. "prefix-list", "security-group")
    /// - `factory`: Factory object for creating target instances
    pub fn register_target(&self, kind: impl Into<String>, factory: Arc<dyn TargetFactory>) {
        let mut targets = self.targets.write().unwrap();
        targets.insert(kind.into(), factory);
    }

    /// Register a map source factory
    ///
    /// # Parameters
    ///
    /// - `kind`: Source kind (e.g. "site_shield")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&self, kind: impl Into<String>, factory: Arc<dyn MapSourceFactory>) {
        let mut sources = self.sources.write().unwrap();
        sources.insert(kind.into(), factory);
    }

    /// Create a target from configuration
    ///
    /// Fails with [`Error::Config`] when no factory is registered for the
    /// configuration's kind.
    pub async fn create_target(&self, config: &TargetConfig) -> Result<Box<dyn CidrTarget>> {
        let factory = {
            let targets = self.targets.read().unwrap();
            targets
                .get(config.kind())
                .ok_or_else(|| Error::config(format!("unknown target kind: {}", config.kind())))?
                .clone()
            // Lock released here; factory creation may await credential setup
        };

        factory.create(config).await
    }

    /// Create a map source from configuration
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn MapSource>> {
        let sources = self.sources.read().unwrap();

        let factory = sources
            .get(config.kind())
            .ok_or_else(|| Error::config(format!("unknown source kind: {}", config.kind())))?;

        factory.create(config)
    }

    /// Check if a target kind is registered
    pub fn has_target(&self, kind: &str) -> bool {
        self.targets.read().unwrap().contains_key(kind)
    }

    /// Check if a source kind is registered
    pub fn has_source(&self, kind: &str) -> bool {
        self.sources.read().unwrap().contains_key(kind)
    }

    /// List all registered target kinds
    pub fn list_targets(&self) -> Vec<String> {
        self.targets.read().unwrap().keys().cloned().collect()
    }

    /// List all registered source kinds
    pub fn list_sources(&self) -> Vec<String> {
        self.sources.read().unwrap().keys().cloned().collect()
    }
}
