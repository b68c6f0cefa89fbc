//! `atrium-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. Both the API
//! server and the client link it, which keeps the permission registry
//! identical on both tiers.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod tokens;
pub mod user;
pub mod wire;

pub use authorize::{AuthzError, RbacRegistry, authorize, authorize_workspace};
pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::{PERMISSIONS, Permission, PermissionSet, UnknownPermission};
pub use principal::Principal;
pub use roles::Role;
pub use tokens::{Hs256Jwt, JwtValidator, TokenIssueError, generate_refresh_token};
pub use user::{CachedUser, User, UserProfile, has_permission, normalize_email};
