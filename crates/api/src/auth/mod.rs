//! Bearer-token verification for the external identity provider.

pub mod jwt;
