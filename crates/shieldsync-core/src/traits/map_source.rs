//! Map source trait
//!
//! The upstream side of the synchronizer: something that publishes named
//! CIDR allow-lists ("maps") and accepts acknowledgments once a proposal
//! has been applied everywhere it is wired to.

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::Result;
use crate::map::ProposedMap;

/// Trait for upstream allow-list providers
///
/// Implementations perform single-shot authenticated API calls and return
/// errors as-is; the engine decides what is fatal. They must not retry:
/// an unacknowledged map is re-proposed upstream, which is the retry path.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait MapSource: Send + Sync {
    /// List the provider's maps
    ///
    /// An empty list is a normal outcome ("nothing to do"), not an error.
    /// A transport or auth failure is returned as [`crate::Error::Source`]
    /// and aborts the pass: with no listing there is nothing to reconcile.
    async fn list_maps(&self) -> Result<Vec<ProposedMap>>;

    /// Acknowledge a map's outstanding proposal
    ///
    /// Returns the map as the provider sees it after the acknowledgment.
    /// Failures are [`crate::Error::Acknowledge`]: the engine logs them and
    /// continues with the next map.
    async fn acknowledge(&self, map_id: u64) -> Result<ProposedMap>;

    /// Source name for logging
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing map sources from configuration
pub trait MapSourceFactory: Send + Sync {
    /// Create a [`MapSource`] instance from configuration
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn MapSource>>;
}
