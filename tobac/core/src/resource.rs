use std::{collections::BTreeMap, fmt};

/// The label that names a resource's owning team.
pub const TEAM_LABEL: &str = "team";

/// Identifies a resource for logging.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

/// The parts of a Kubernetes resource that matter for ownership.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceView {
    pub reference: ResourceRef,
    team: Option<String>,
}

// === impl ResourceRef ===

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace.as_deref() {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

// === impl ResourceView ===

impl ResourceView {
    pub fn new(reference: ResourceRef, team: Option<&str>) -> Self {
        Self {
            reference,
            team: team.map(str::to_string),
        }
    }

    pub fn from_labels(reference: ResourceRef, labels: &BTreeMap<String, String>) -> Self {
        Self::new(reference, labels.get(TEAM_LABEL).map(String::as_str))
    }

    /// Returns the owning team's ID, if the resource is labeled.
    ///
    /// An empty label is treated as no label at all.
    pub fn team(&self) -> Option<&str> {
        self.team.as_deref().filter(|t| !t.is_empty())
    }
}
