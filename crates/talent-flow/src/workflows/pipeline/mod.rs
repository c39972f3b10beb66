//! Workflow state machine driving candidate, job and hiring process pipelines.
//!
//! The core is a set of pure functions over plain data: a [`WorkflowDefinition`] is gated by
//! [`validate`] into a [`ValidatedDefinition`], instances move only through
//! [`apply_transition`], and the SLA and query projections are recomputed on every read.
//! [`WorkflowService`] wires the core to caller-supplied persistence, guard evaluation and
//! side-effect publishing.

pub mod blueprint;
pub mod domain;
pub mod engine;
pub mod history;
pub mod query;
pub mod repository;
pub mod service;
pub mod sla;
pub mod validator;

#[cfg(test)]
mod tests;

pub use blueprint::candidate_pipeline;
pub use domain::{
    ActorId, DefinitionId, HistoryEntry, InstanceError, InstanceId, State, StateId, StateKind,
    Transition, TransitionId, WorkflowDefinition, WorkflowInstance,
};
pub use engine::{apply_transition, apply_transition_at, TransitionError, TransitionRequest};
pub use history::{export_csv, verify_history, HistoryError};
pub use query::{
    available_transitions, state_groups, state_progress, was_visited, StateGroups,
    StateProgress, VisitStatus,
};
pub use repository::{
    GuardError, GuardEvaluator, PublishError, RepositoryError, StoredInstance, TransitionEvent,
    TransitionPublisher, WorkflowRepository,
};
pub use service::{WorkflowService, WorkflowServiceError};
pub use sla::{compute_overdue, sla_status, SlaStatus};
pub use validator::{
    validate, validate_revision, ValidatedDefinition, ValidationCode, ValidationError,
    ValidationReport,
};
