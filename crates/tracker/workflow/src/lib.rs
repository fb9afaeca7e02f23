//! Tracker Workflow - issue lifecycles as configurable state machines.
//!
//! - [`WorkflowCatalog`] reads workflow graphs and resolves which workflow an
//!   issue type follows through its project's workflow scheme.
//! - [`PipelineRegistry`] maps every condition, validator and post-function
//!   type tag to an evaluator.
//! - [`TransitionExecutor`] runs one status change through the gates,
//!   commits it with a compare-and-swap, then runs the post-functions.
//! - [`NotificationDispatcher`] is the fire-and-forget outlet used by the
//!   notification and webhook post-functions.
#![deny(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod executor;
pub mod notify;
pub mod pipeline;

pub use catalog::{select_mapping, TransitionPipeline, WorkflowCatalog};
pub use error::{PostFunctionWarning, TransitionError, TransitionRejection, WorkflowResult};
pub use executor::{TransitionExecutor, TransitionResult, DEFAULT_POST_FUNCTION_TIMEOUT};
pub use notify::{DispatchError, Notification, NotificationDispatcher, OutboxDispatcher};
pub use pipeline::{
    ConditionCheck, PipelineContext, PipelineRegistry, PipelineServices, PostFunctionAction,
    TransitionInput, ValidatorCheck, Verdict,
};
