use std::fmt;

use serde::Deserialize;

/// A submitted username/password pair. Compared verbatim, never hashed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Credential;

    #[test]
    fn debug_output_redacts_password() {
        let credential = Credential::new("student", "travel-demo");
        let debug = format!("{credential:?}");

        assert!(debug.contains("student"));
        assert!(!debug.contains("travel-demo"));
    }
}
