use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated user identity, as issued by the auth provider.
///
/// Anonymous viewers have no `Owner`; the local storage tier itself is their
/// scope. An `Owner` is resolved fresh for every repository operation, never
/// cached across calls, because sign-in or sign-out can change it mid-session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
