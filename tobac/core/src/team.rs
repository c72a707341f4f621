/// A team mirrored from the directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Team {
    /// The team's internal identifier, as referenced by `team` labels.
    pub id: String,

    /// The directory group whose members belong to the team.
    pub group_id: String,

    pub display_name: String,
    pub description: String,
}

/// Resolves team IDs against the directory.
///
/// Lookups are total: an unknown ID resolves to [`Team::default()`], which is never valid.
/// Implementations must not block on I/O.
pub trait TeamLookup {
    fn lookup(&self, id: &str) -> Team;
}

// === impl Team ===

impl Team {
    pub fn new(id: impl ToString, group_id: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            group_id: group_id.to_string(),
            ..Default::default()
        }
    }

    /// A team is valid only when both its ID and its directory group are known.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.group_id.is_empty()
    }
}

// === impl TeamLookup ===

impl<F> TeamLookup for F
where
    F: Fn(&str) -> Team,
{
    #[inline]
    fn lookup(&self, id: &str) -> Team {
        (self)(id)
    }
}
