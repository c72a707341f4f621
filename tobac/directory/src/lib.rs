//! Team directory
//!
//! Teams are mirrored from an external directory into an in-memory [`TeamCache`] so that
//! admission decisions never wait on the network. A single [`TeamSync`] task refreshes the cache on
//! a fixed interval:
//!
//! ```text
//! [ DiscoverTeams ] --(refresh)--> [ TeamSync ] --(replace)--> [ TeamCache ] <--(get)-- admission
//! ```
//!
//! The whole snapshot is swapped at once. A failed refresh leaves the previous snapshot in place,
//! so a directory outage makes lookups stale but never unavailable. Until the first refresh
//! succeeds, every team is unknown.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
pub mod graph;
mod metrics;
mod sync;

#[cfg(test)]
mod tests;

pub use self::{
    cache::{SharedCache, TeamCache, Teams},
    metrics::SyncMetrics,
    sync::TeamSync,
};
pub use tobac_core::Team;

/// Fetches the complete set of teams from a directory.
///
/// Implementations must be safe to retry; a fetch is abandoned when it exceeds the sync timeout.
#[async_trait::async_trait]
pub trait DiscoverTeams {
    async fn fetch_teams(&self) -> anyhow::Result<Teams>;
}
