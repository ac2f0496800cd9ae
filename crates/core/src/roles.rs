//! Well-known role name constants.
//!
//! These must match the `role` claim minted by the identity provider.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
