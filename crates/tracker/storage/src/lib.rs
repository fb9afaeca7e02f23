//! Tracker storage contracts.
//!
//! The authorization and workflow layers only ever talk to the narrow traits
//! in [`traits`]. [`memory::InMemoryTrackerStorage`] is the deterministic
//! reference adapter used by tests and embedded deployments; a relational
//! backend implements the same traits with unique-key upserts.
#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod model;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryTrackerStorage;
pub use model::{FieldUpdate, TransitionCommit};
pub use traits::{
    DirectoryStore, GrantStore, IssueStore, ProjectStore, RoleStore, TrackerStorage,
    WorkflowStore,
};
