//! Tracker Types - domain model for permission resolution and workflow
//! transitions.
//!
//! Everything here is plain data: identifiers, closed enumerations and the
//! relational rows the stores hand back. No I/O happens in this crate.
#![deny(unsafe_code)]

pub mod directory;
pub mod error;
pub mod grant;
pub mod ids;
pub mod issue;
pub mod permission;
pub mod pipeline;
pub mod role;
pub mod workflow;

pub use directory::*;
pub use error::*;
pub use grant::*;
pub use ids::*;
pub use issue::*;
pub use permission::*;
pub use pipeline::*;
pub use role::*;
pub use workflow::*;
