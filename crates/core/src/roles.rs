//! Roles carried in the identity provider's `role` claim.

use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_LEARNER: &str = "learner";

/// Who is calling: a learner acting on their own journey, or an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Learner,
    Admin,
}

impl Role {
    /// Parse a claim value. Unknown roles are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            ROLE_LEARNER => Some(Self::Learner),
            ROLE_ADMIN => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learner => ROLE_LEARNER,
            Self::Admin => ROLE_ADMIN,
        }
    }
}
