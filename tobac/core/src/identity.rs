/// The user or service account issuing a request.
///
/// Identities are asserted by the API server and are not verified here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub groups: Vec<String>,
}

impl Identity {
    pub fn new(username: impl ToString, groups: impl IntoIterator<Item = impl ToString>) -> Self {
        Self {
            username: username.to_string(),
            groups: groups.into_iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
