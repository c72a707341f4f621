use std::{fmt, str::FromStr};
use thiserror::Error;

const SLOT: &str = "%s";

/// A service user naming pattern, e.g. `system:serviceaccount:%s:deployer`.
///
/// The `%s` slot is replaced with a team's ID. A username that equals the instantiated template
/// has the same access to the team as a member of its directory group. A literal `%` is written
/// as `%%`; any other `%` sequence is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceUserTemplate {
    prefix: String,
    suffix: String,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InvalidTemplate {
    #[error("service user template {0:?} has no '%s' slot")]
    MissingSlot(String),

    #[error("service user template {0:?} has more than one '%s' slot")]
    MultipleSlots(String),

    #[error("service user template {0:?} has a '%' that is neither '%s' nor '%%'")]
    StrayPercent(String),
}

impl ServiceUserTemplate {
    /// Returns the username this template grants access to the given team.
    pub fn render(&self, team_id: &str) -> String {
        format!("{}{}{}", self.prefix, team_id, self.suffix)
    }

    /// Tests whether `username` is exactly this template instantiated with `team_id`.
    pub fn matches(&self, username: &str, team_id: &str) -> bool {
        username
            .strip_prefix(&*self.prefix)
            .and_then(|rest| rest.strip_suffix(&*self.suffix))
            == Some(team_id)
    }
}

impl FromStr for ServiceUserTemplate {
    type Err = InvalidTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Literal text on either side of each slot, with `%%` unescaped.
        let mut parts = Vec::with_capacity(2);
        let mut literal = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => literal.push('%'),
                Some('s') => parts.push(std::mem::take(&mut literal)),
                _ => return Err(InvalidTemplate::StrayPercent(s.to_string())),
            }
        }
        parts.push(literal);

        match <[String; 2]>::try_from(parts) {
            Ok([prefix, suffix]) => Ok(Self { prefix, suffix }),
            Err(parts) if parts.len() < 2 => Err(InvalidTemplate::MissingSlot(s.to_string())),
            Err(_) => Err(InvalidTemplate::MultipleSlots(s.to_string())),
        }
    }
}

impl fmt::Display for ServiceUserTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escape = |part: &str| part.replace('%', "%%");
        write!(f, "{}{}{}", escape(&self.prefix), SLOT, escape(&self.suffix))
    }
}
