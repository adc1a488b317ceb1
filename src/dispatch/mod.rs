//! Multi-backend dispatch orchestrator.
//!
//! Renders a [`MergeTemplate`](crate::template::MergeTemplate) for every
//! recipient and hands each rendered message to the highest-priority
//! backend still standing. A backend that fails is demoted once and the
//! next available one takes over for the remaining recipients.

mod backend;
mod chain;
mod orchestrator;
mod progress;
mod report;

pub use backend::{describe_backends, BackendDescriptor, BackendKind, DeliveryBackend, DeliveryError};
pub use chain::{BackendChain, Fallback};
pub use orchestrator::{
    check_preconditions, DispatchOrchestrator, DEFAULT_MAX_SETTLE_DELAY, NO_BACKEND_AVAILABLE,
};
pub use progress::{percent_complete, ProgressSnapshot};
pub use report::{DispatchReport, DispatchStatus, PreconditionError, RecipientError};
