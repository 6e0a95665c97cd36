// # shieldsync-core
//
// Core library for the SiteShield-to-AWS allow-list synchronizer.
//
// ## Architecture Overview
//
// - **MapSource**: Trait for listing and acknowledging upstream allow-list
//   proposals ("maps")
// - **CidrTarget**: Trait for applying a desired CIDR set to a downstream
//   resource (managed prefix list, security-group rule)
// - **Reconciler**: Engine driving one list → diff → apply → acknowledge
//   pass across all configured maps
// - **TargetRegistry**: Plugin-based registry resolving configuration to
//   source/target implementations
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core orchestration is separate from vendor
//    API implementations
// 2. **All-or-Nothing Acknowledgment**: A map is acknowledged only when
//    every one of its targets succeeded
// 3. **Fresh Reads**: Targets recompute their diff from live state
//    immediately before mutating; nothing is planned from stale snapshots
// 4. **Idempotency by Design**: No local state between runs; an
//    interrupted pass is safely retried because unacknowledged maps are
//    re-proposed upstream

pub mod cidr;
pub mod config;
pub mod engine;
pub mod error;
pub mod map;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use cidr::{CidrSet, Diff};
pub use config::{SourceConfig, SyncConfig, TargetConfig};
pub use engine::{Reconciler, ReconcileEvent, RunReport};
pub use error::{Error, Result};
pub use map::ProposedMap;
pub use registry::TargetRegistry;
pub use traits::{ApplyOutcome, CidrTarget, MapSource};
