use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::values::Timestamp;

/// Unique identifier for a user
pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "USER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub created_at: Timestamp,
}

impl User {
    pub fn new_with_time(name: impl Into<String>, role: Role, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
            created_at: timestamp,
        }
    }

    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self::new_with_time(name, role, Utc::now())
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
