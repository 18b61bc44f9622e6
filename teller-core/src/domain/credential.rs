//! Stored credential domain model

use serde::{Deserialize, Serialize};

use super::user::UserId;

/// Password digest stored for a user, keyed by user id.
///
/// The digest is a PHC string (`$argon2id$v=19$...`) so it carries its own
/// salt and parameters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    pub digest: String,
}

impl Credential {
    pub fn new(user_id: UserId, digest: impl Into<String>) -> Self {
        Self {
            user_id,
            digest: digest.into(),
        }
    }
}

// Digests stay out of Debug output so they never reach the logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("digest", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_digest() {
        let credential = Credential::new(7, "$argon2id$v=19$secret");
        let rendered = format!("{:?}", credential);
        assert!(rendered.contains("user_id: 7"));
        assert!(!rendered.contains("secret"));
    }
}
