use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActorId, DefinitionId, InstanceId, StateId, TransitionId, WorkflowDefinition,
    WorkflowInstance,
};

/// Instance as held by the persistence layer, with its optimistic-concurrency revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredInstance {
    pub instance: WorkflowInstance,
    pub revision: u64,
}

/// Storage abstraction so the service can run against any persistence engine.
///
/// `update_instance` must be a compare-and-swap on `expected_revision`: when the stored
/// revision differs the write is refused with [`RepositoryError::RevisionConflict`].
pub trait WorkflowRepository: Send + Sync {
    fn fetch_definition(
        &self,
        id: &DefinitionId,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError>;
    fn save_definition(&self, definition: WorkflowDefinition) -> Result<(), RepositoryError>;
    fn count_instances(&self, definition: &DefinitionId) -> Result<usize, RepositoryError>;
    fn insert_instance(&self, instance: WorkflowInstance)
        -> Result<StoredInstance, RepositoryError>;
    fn fetch_instance(&self, id: &InstanceId) -> Result<Option<StoredInstance>, RepositoryError>;
    fn update_instance(
        &self,
        instance: WorkflowInstance,
        expected_revision: u64,
    ) -> Result<StoredInstance, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("revision conflict: expected {expected}, found {actual}")]
    RevisionConflict { expected: u64, actual: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Resolves named guards against domain data (roles, approvals) before a transition runs.
pub trait GuardEvaluator: Send + Sync {
    fn evaluate(
        &self,
        guard: &str,
        instance: &WorkflowInstance,
        actor: &ActorId,
    ) -> Result<bool, GuardError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("guard {0} is not known to the evaluator")]
    UnknownGuard(String),
    #[error("guard evaluation unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for transitions that declare a side effect (e-mail, onboarding, webhooks).
pub trait TransitionPublisher: Send + Sync {
    fn publish(&self, event: TransitionEvent) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub side_effect: String,
    pub definition_id: DefinitionId,
    pub instance_id: InstanceId,
    pub transition_id: TransitionId,
    pub from_state: StateId,
    pub to_state: StateId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publisher transport unavailable: {0}")]
    Transport(String),
}
