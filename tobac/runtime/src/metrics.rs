use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use tobac_core::Decision;

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    decisions: Family<DecisionLabels, Counter>,
    resolve_errors: Counter,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct DecisionLabels {
    allowed: &'static str,
    reason: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let decisions = Family::<DecisionLabels, Counter>::default();
        reg.register(
            "decisions",
            "Total number of admission decisions by outcome and reason",
            decisions.clone(),
        );

        let resolve_errors = Counter::default();
        reg.register(
            "resolve_errors",
            "Total number of failures to read a deleted resource from the cluster",
            resolve_errors.clone(),
        );

        Self {
            decisions,
            resolve_errors,
        }
    }

    pub(crate) fn decided(&self, decision: &Decision) {
        self.decisions
            .get_or_create(&DecisionLabels::new(decision.allowed, decision.reason.code()))
            .inc();
    }

    pub(crate) fn resolve_failed(&self) {
        self.resolve_errors.inc();
    }

    #[cfg(test)]
    pub(crate) fn decisions(&self, allowed: bool, reason: &'static str) -> u64 {
        self.decisions
            .get_or_create(&DecisionLabels::new(allowed, reason))
            .get()
    }

    #[cfg(test)]
    pub(crate) fn resolve_errors(&self) -> u64 {
        self.resolve_errors.get()
    }
}

impl DecisionLabels {
    fn new(allowed: bool, reason: &'static str) -> Self {
        let allowed = if allowed { "true" } else { "false" };
        Self { allowed, reason }
    }
}
