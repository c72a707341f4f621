use crate::{Identity, ResourceView, ServiceUserTemplate, Team, TeamLookup};
use std::fmt;


/// Cluster-wide access configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Policy {
    /// Groups whose members bypass ownership checks entirely.
    pub cluster_admins: Vec<String>,

    pub service_user_templates: Vec<ServiceUserTemplate>,
}

/// A single write request under review.
///
/// `submitted` is the resource as it would be stored (absent for deletions) and `existing` is the
/// resource as it is currently stored (absent for creations).
#[derive(Clone, Copy)]
pub struct Request<'a> {
    pub identity: &'a Identity,
    pub submitted: Option<&'a ResourceView>,
    pub existing: Option<&'a ResourceView>,
    pub policy: &'a Policy,
    pub teams: &'a dyn TeamLookup,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Reason,
}

/// How a requester was found to have access to a team.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// The requester is in the team's directory group.
    Member,

    /// The requester's username matches a service user template for the team.
    ServiceUser,
}

/// Why a request was allowed or denied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    ClusterAdmin { group: String },
    Owner { team: String, access: Access },
    Annexed { team: String, access: Access },
    /// An unlabeled resource is being deleted.
    Unowned,

    MissingTeamLabel,
    UnknownTeam { team: String },
    UnknownExistingTeam { team: String },
    NoAccessToExistingTeam { user: String, team: String },
    NoAccess { user: String, team: String },
}

/// Decides whether a request may be admitted.
///
/// Evaluation has no side effects beyond team lookups, so identical requests always produce
/// identical decisions for a given directory snapshot.
pub fn evaluate(req: &Request<'_>) -> Decision {
    let Request {
        identity,
        submitted,
        existing,
        policy,
        teams,
    } = *req;

    if let Some(group) = policy.admin_group(identity) {
        return Decision::allow(Reason::ClusterAdmin {
            group: group.to_string(),
        });
    }

    let team = match submitted {
        Some(submitted) => {
            let Some(id) = submitted.team() else {
                return Decision::deny(Reason::MissingTeamLabel);
            };

            let team = teams.lookup(id);
            if !team.is_valid() {
                return Decision::deny(Reason::UnknownTeam {
                    team: id.to_string(),
                });
            }
            Some(team)
        }
        None => None,
    };

    // The existing resource's owner must grant access independently of the submitted team, so
    // moving a resource between teams requires access to both.
    let mut annexing = false;
    if let Some(existing) = existing {
        match existing.team() {
            Some(id) => {
                let owner = teams.lookup(id);
                if !owner.is_valid() {
                    return Decision::deny(Reason::UnknownExistingTeam {
                        team: id.to_string(),
                    });
                }

                let Some(access) = policy.access(identity, &owner) else {
                    return Decision::deny(Reason::NoAccessToExistingTeam {
                        user: identity.username.clone(),
                        team: id.to_string(),
                    });
                };

                if team.is_none() {
                    return Decision::allow(Reason::Owner {
                        team: id.to_string(),
                        access,
                    });
                }
            }
            None => {
                if team.is_none() {
                    return Decision::allow(Reason::Unowned);
                }
                annexing = true;
            }
        }
    }

    let Some(team) = team else {
        return Decision::deny(Reason::MissingTeamLabel);
    };

    match policy.access(identity, &team) {
        Some(access) if annexing => Decision::allow(Reason::Annexed {
            team: team.id,
            access,
        }),
        Some(access) => Decision::allow(Reason::Owner {
            team: team.id,
            access,
        }),
        None => Decision::deny(Reason::NoAccess {
            user: identity.username.clone(),
            team: team.id,
        }),
    }
}

// === impl Policy ===

impl Policy {
    pub fn new(
        cluster_admins: impl IntoIterator<Item = impl ToString>,
        service_user_templates: impl IntoIterator<Item = ServiceUserTemplate>,
    ) -> Self {
        Self {
            cluster_admins: cluster_admins.into_iter().map(|g| g.to_string()).collect(),
            service_user_templates: service_user_templates.into_iter().collect(),
        }
    }

    /// Returns the first of the identity's groups that is a cluster administrator group.
    pub fn admin_group<'i>(&self, identity: &'i Identity) -> Option<&'i str> {
        identity
            .groups
            .iter()
            .find(|g| self.cluster_admins.contains(g))
            .map(String::as_str)
    }

    pub fn is_cluster_admin(&self, identity: &Identity) -> bool {
        self.admin_group(identity).is_some()
    }

    /// Determines whether the identity may act on behalf of a valid team.
    fn access(&self, identity: &Identity, team: &Team) -> Option<Access> {
        if identity.in_group(&team.group_id) {
            return Some(Access::Member);
        }

        if self
            .service_user_templates
            .iter()
            .any(|t| t.matches(&identity.username, &team.id))
        {
            return Some(Access::ServiceUser);
        }

        None
    }
}

// === impl Decision ===

impl Decision {
    fn allow(reason: Reason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: Reason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

// === impl Reason ===

impl Reason {
    /// A stable, machine-readable name for the reason.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClusterAdmin { .. } => "cluster_admin",
            Self::Owner {
                access: Access::Member,
                ..
            } => "team_member",
            Self::Owner {
                access: Access::ServiceUser,
                ..
            } => "service_user",
            Self::Annexed { .. } => "annexed",
            Self::Unowned => "unowned",
            Self::MissingTeamLabel => "missing_team_label",
            Self::UnknownTeam { .. } => "unknown_team",
            Self::UnknownExistingTeam { .. } => "unknown_existing_team",
            Self::NoAccessToExistingTeam { .. } => "no_access_existing_team",
            Self::NoAccess { .. } => "no_access",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterAdmin { group } => write!(f, "cluster administrator via group '{group}'"),
            Self::Owner {
                team,
                access: Access::Member,
            } => write!(f, "user belongs to owner team '{team}'"),
            Self::Owner {
                team,
                access: Access::ServiceUser,
            } => write!(f, "service user for owner team '{team}'"),
            Self::Annexed { team, .. } => {
                write!(f, "resource had no team label; annexed by team '{team}'")
            }
            Self::Unowned => f.write_str("resource has no team label"),
            Self::MissingTeamLabel => f.write_str("object is not tagged with a team label"),
            Self::UnknownTeam { team } => {
                write!(f, "team '{team}' does not exist in the directory")
            }
            Self::UnknownExistingTeam { team } => write!(
                f,
                "team '{team}' on existing resource does not exist in the directory"
            ),
            Self::NoAccessToExistingTeam { user, team } | Self::NoAccess { user, team } => {
                write!(f, "user '{user}' has no access to team '{team}'")
            }
        }
    }
}
