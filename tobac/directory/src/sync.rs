use crate::{DiscoverTeams, SharedCache, SyncMetrics, Teams};
use anyhow::{bail, Result};
use std::future::Future;
use tokio::time;
use tracing::{debug, info, warn};

/// Periodically refreshes a [`TeamCache`](crate::TeamCache) from a directory.
pub struct TeamSync<D> {
    discover: D,
    cache: SharedCache,
    metrics: SyncMetrics,
}

impl<D: DiscoverTeams> TeamSync<D> {
    pub fn new(discover: D, cache: SharedCache, metrics: SyncMetrics) -> Self {
        Self {
            discover,
            cache,
            metrics,
        }
    }

    /// Fetches a complete snapshot of the directory without updating the cache.
    pub async fn refresh(&self, timeout: time::Duration) -> Result<Teams> {
        match time::timeout(timeout, self.discover.fetch_teams()).await {
            Ok(res) => res,
            Err(_) => bail!("directory did not respond within {timeout:?}"),
        }
    }

    /// Refreshes the cache every `interval` until `shutdown` completes.
    ///
    /// The first refresh starts immediately. Subsequent refreshes start one full interval after
    /// the previous one started, whether or not it succeeded.
    pub async fn run<S: Future>(
        self,
        interval: time::Duration,
        timeout: time::Duration,
        shutdown: S,
    ) {
        let mut ticks = time::interval(interval);
        ticks.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    debug!("Directory sync stopped");
                    return;
                }

                _ = ticks.tick() => {}
            }

            self.sync(timeout).await;
        }
    }

    pub(crate) async fn sync(&self, timeout: time::Duration) {
        debug!("Retrieving teams from directory");
        match self.refresh(timeout).await {
            Ok(teams) => {
                let count = self.cache.replace(teams);
                self.metrics.succeeded(count);
                info!(teams = count, "Cached teams from directory");
            }
            Err(error) => {
                self.metrics.failed();
                warn!(%error, cached = self.cache.len(), "Failed to retrieve teams");
            }
        }
    }
}
