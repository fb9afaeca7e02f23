//! Tracker Access - who may do what.
//!
//! [`RoleDirectory`] answers role membership questions (user or group actors,
//! per project) and [`PermissionResolver`] folds every grant source into one
//! decision. Both are thin facades over [`tracker_storage::TrackerStorage`].
#![deny(unsafe_code)]

pub mod error;
pub mod resolver;
pub mod roles;
pub mod sources;

pub use error::{AccessError, AccessResult};
pub use resolver::PermissionResolver;
pub use roles::{actor_matches, RoleDirectory};
pub use sources::{AccessDecision, GrantSource, GlobalPrincipal, ProjectPrincipal};
