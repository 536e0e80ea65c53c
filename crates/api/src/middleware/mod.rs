//! Request extractors for caller identity.
//!
//! [`auth::AuthUser`] verifies the bearer token; [`rbac::RequireAdmin`]
//! additionally demands the admin role.

pub mod auth;
pub mod rbac;
