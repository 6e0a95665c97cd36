// # AWS Targets
//
// Downstream side of the synchronizer: managed prefix lists and
// security-group ingress rules, driven through the official AWS SDK.
//
// Both targets implement the same `CidrTarget` capability:
//
// - re-read live state immediately before mutating
// - compute the add/remove diff against the desired set
// - return `Unchanged` (zero mutation calls) when the diff is empty
// - surface capacity, not-found, ambiguity, and concurrency failures as
//   distinct error kinds for the engine to record
//
// The crate also loads the operator configuration from AWS Secrets Manager
// (`secrets`), and builds cross-account sessions via STS assume-role
// (`account`).
//
// Like every adapter in this workspace, targets are single-shot: no retry,
// no backoff, no caching. The engine leaves a failed map unacknowledged
// and the upstream provider re-proposes it on the next pass.

mod account;
pub mod prefix_list;
pub mod secrets;
pub mod security_group;

pub use prefix_list::{PrefixListFactory, PrefixListTarget};
pub use secrets::fetch_sync_config;
pub use security_group::{SecurityGroupFactory, SecurityGroupTarget};

use std::sync::Arc;

use shieldsync_core::registry::TargetRegistry;

/// Register both AWS target kinds with a registry
pub fn register(registry: &TargetRegistry) {
    registry.register_target("prefix-list", Arc::new(PrefixListFactory));
    registry.register_target("security-group", Arc::new(SecurityGroupFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_installs_both_target_kinds() {
        let registry = TargetRegistry::new();
        register(&registry);
        assert!(registry.has_target("prefix-list"));
        assert!(registry.has_target("security-group"));
    }
}
