use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct SyncMetrics {
    teams: Gauge,
    syncs: Family<SyncLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct SyncLabels {
    result: &'static str,
}

// === impl SyncMetrics ===

impl SyncMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let teams = Gauge::default();
        reg.register(
            "teams",
            "Number of teams cached from the directory",
            teams.clone(),
        );

        let syncs = Family::<SyncLabels, Counter>::default();
        reg.register(
            "syncs",
            "Total number of directory sync attempts",
            syncs.clone(),
        );

        Self { teams, syncs }
    }

    pub(crate) fn succeeded(&self, teams: usize) {
        self.teams.set(teams.try_into().unwrap_or(i64::MAX));
        self.syncs
            .get_or_create(&SyncLabels { result: "success" })
            .inc();
    }

    pub(crate) fn failed(&self) {
        self.syncs
            .get_or_create(&SyncLabels { result: "failure" })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn attempts(&self, result: &'static str) -> u64 {
        self.syncs.get_or_create(&SyncLabels { result }).get()
    }
}
