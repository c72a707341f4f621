//! Team ownership based access control.
//!
//! Every namespaced or cluster-scoped resource is owned by the team named in its `team` label.
//! Teams are mirrored from an external directory, and a user belongs to a team when the user's
//! groups include the team's directory group. Writes are admitted according to a fixed procedure:
//!
//! 1. Members of a cluster administrator group may do anything.
//! 2. A submitted resource must carry a `team` label naming a known team.
//! 3. Modifying or deleting a labeled resource requires access to its current owner.
//! 4. An unlabeled resource may be annexed by any team the requester has access to.
//! 5. Creating or updating a resource requires access to the team it is submitted for.
//!
//! Access to a team is granted either by directory group membership or by a username that matches
//! one of the configured service user templates instantiated with the team's ID.
//!
//! This crate performs no I/O: team lookups are delegated to a [`TeamLookup`] implementation,
//! which is expected to be backed by an in-memory snapshot of the directory.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod decision;
mod identity;
mod resource;
mod team;
mod template;

pub use self::{
    decision::{evaluate, Access, Decision, Policy, Reason, Request},
    identity::Identity,
    resource::{ResourceRef, ResourceView, TEAM_LABEL},
    team::{Team, TeamLookup},
    template::{InvalidTemplate, ServiceUserTemplate},
};
