use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tobac_core::{Team, TeamLookup};

/// Teams indexed by ID.
pub type Teams = HashMap<String, Team>;

pub type SharedCache = Arc<TeamCache>;

/// Holds the latest snapshot of the team directory.
///
/// Readers look up single teams; the sync task replaces the whole snapshot. Both happen under the
/// same lock, so a reader never observes a partially applied refresh.
#[derive(Debug, Default)]
pub struct TeamCache {
    teams: RwLock<Teams>,
}

impl TeamCache {
    pub fn shared() -> SharedCache {
        Arc::new(Self::default())
    }

    /// Returns the team with the given ID, or an invalid default team if it is not cached.
    pub fn get(&self, id: &str) -> Team {
        self.teams.read().get(id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.teams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.read().is_empty()
    }

    /// Replaces the snapshot, returning the number of cached teams.
    pub fn replace(&self, teams: Teams) -> usize {
        let len = teams.len();
        // Drop the previous snapshot after the lock is released.
        let _prior = std::mem::replace(&mut *self.teams.write(), teams);
        len
    }
}

impl TeamLookup for TeamCache {
    #[inline]
    fn lookup(&self, id: &str) -> Team {
        self.get(id)
    }
}
