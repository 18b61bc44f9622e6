//! Session domain model

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::user::User;

/// An authenticated caller.
///
/// Returned by login and carried explicitly through each call; nothing keeps
/// a "current user" on a shared manager. Not `Clone`: logging out consumes
/// the one session login handed out.
#[derive(Debug, Serialize)]
pub struct Session {
    id: Uuid,
    user: User,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
