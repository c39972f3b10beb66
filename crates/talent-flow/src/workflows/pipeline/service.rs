use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::domain::{
    DefinitionId, HistoryEntry, InstanceError, InstanceId, StateId, Transition,
    WorkflowDefinition, WorkflowInstance,
};
use super::engine::{apply_transition_at, TransitionError, TransitionRequest};
use super::query::available_transitions;
use super::repository::{
    GuardError, GuardEvaluator, PublishError, RepositoryError, StoredInstance, TransitionEvent,
    TransitionPublisher, WorkflowRepository,
};
use super::sla::{sla_status, SlaStatus};
use super::validator::{
    validate, validate_revision, version_errors, ValidatedDefinition, ValidationReport,
};
use crate::config::WorkflowConfig;

/// Service composing the repository, guard evaluator and publisher around the pure core.
///
/// Writes to one instance are serialised through the repository's revision check: a
/// transition loads the instance, runs the engine and persists with compare-and-swap,
/// reloading and retrying when another writer got there first.
pub struct WorkflowService<R, G, P> {
    repository: Arc<R>,
    guards: Arc<G>,
    publisher: Arc<P>,
    max_conflict_retries: u32,
}

impl<R, G, P> WorkflowService<R, G, P>
where
    R: WorkflowRepository + 'static,
    G: GuardEvaluator + 'static,
    P: TransitionPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        guards: Arc<G>,
        publisher: Arc<P>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            repository,
            guards,
            publisher,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Validate and store a definition, enforcing additive-only changes once instances exist.
    pub fn register_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<ValidatedDefinition, WorkflowServiceError> {
        let validated = match self.repository.fetch_definition(&definition.id)? {
            None => validate(definition)?,
            Some(existing) => {
                let current = validate(existing)?;
                let bound = self.repository.count_instances(&current.id)?;
                if bound > 0 {
                    debug!(definition_id = %current.id, bound, "checking additive revision");
                    validate_revision(&current, definition)?
                } else {
                    let errors = version_errors(&current, &definition);
                    if !errors.is_empty() {
                        return Err(ValidationReport { errors }.into());
                    }
                    validate(definition)?
                }
            }
        };

        self.repository.save_definition(validated.clone().into_inner())?;
        info!(
            definition_id = %validated.id,
            version = validated.version,
            states = validated.states.len(),
            transitions = validated.transitions.len(),
            "workflow definition registered"
        );
        Ok(validated)
    }

    /// Fetch a stored definition and pass it through the validator gate.
    pub fn definition(
        &self,
        id: &DefinitionId,
    ) -> Result<ValidatedDefinition, WorkflowServiceError> {
        let definition = self
            .repository
            .fetch_definition(id)?
            .ok_or_else(|| WorkflowServiceError::DefinitionNotFound(id.clone()))?;
        Ok(validate(definition)?)
    }

    pub fn start_instance(
        &self,
        definition_id: &DefinitionId,
        instance_id: InstanceId,
        entry: Option<&StateId>,
        started_at: DateTime<Utc>,
    ) -> Result<StoredInstance, WorkflowServiceError> {
        let definition = self.definition(definition_id)?;
        let instance = match entry {
            Some(state) => WorkflowInstance::start_in(&definition, instance_id, state, started_at)?,
            None => WorkflowInstance::start(&definition, instance_id, started_at),
        };

        let stored = self.repository.insert_instance(instance)?;
        info!(
            instance_id = %stored.instance.id(),
            definition_id = %definition_id,
            state = %stored.instance.current_state(),
            "workflow instance started"
        );
        Ok(stored)
    }

    pub fn instance(&self, id: &InstanceId) -> Result<StoredInstance, WorkflowServiceError> {
        self.repository
            .fetch_instance(id)?
            .ok_or_else(|| WorkflowServiceError::InstanceNotFound(id.clone()))
    }

    /// Execute a transition with the current wall-clock time.
    pub fn transition(
        &self,
        instance_id: &InstanceId,
        request: TransitionRequest,
    ) -> Result<StoredInstance, WorkflowServiceError> {
        self.transition_at(instance_id, request, Utc::now())
    }

    /// Resolve the guard, run the engine and persist with a revision check.
    ///
    /// Any `guard_passed` on the incoming request is replaced by the evaluator's verdict.
    pub fn transition_at(
        &self,
        instance_id: &InstanceId,
        request: TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<StoredInstance, WorkflowServiceError> {
        let attempts = self.max_conflict_retries + 1;

        for attempt in 1..=attempts {
            let stored = self.instance(instance_id)?;
            let definition = self.definition(stored.instance.definition_id())?;

            let mut request = request.clone();
            request.guard_passed = self.resolve_guard(&definition, &stored.instance, &request)?;

            let outcome = apply_transition_at(&definition, &stored.instance, request.clone(), now);
            let next = match outcome {
                Ok(next) => next,
                Err(error) => {
                    debug!(
                        instance_id = %instance_id,
                        transition_id = %request.transition_id,
                        %error,
                        "transition refused"
                    );
                    return Err(error.into());
                }
            };

            match self.repository.update_instance(next, stored.revision) {
                Ok(saved) => {
                    info!(
                        instance_id = %instance_id,
                        transition_id = %request.transition_id,
                        actor = %request.actor,
                        state = %saved.instance.current_state(),
                        revision = saved.revision,
                        "workflow transition applied"
                    );
                    self.publish_side_effect(&definition, &saved.instance)?;
                    return Ok(saved);
                }
                Err(RepositoryError::RevisionConflict { expected, actual }) => {
                    warn!(
                        instance_id = %instance_id,
                        attempt,
                        expected,
                        actual,
                        "concurrent update detected, reloading instance"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(WorkflowServiceError::ConflictRetriesExhausted {
            instance_id: instance_id.clone(),
            attempts,
        })
    }

    pub fn available_transitions(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<Transition>, WorkflowServiceError> {
        let stored = self.instance(instance_id)?;
        let definition = self.definition(stored.instance.definition_id())?;
        Ok(available_transitions(&definition, &stored.instance)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn sla(
        &self,
        instance_id: &InstanceId,
        now: DateTime<Utc>,
    ) -> Result<SlaStatus, WorkflowServiceError> {
        let stored = self.instance(instance_id)?;
        let definition = self.definition(stored.instance.definition_id())?;
        Ok(sla_status(&definition, &stored.instance, now))
    }

    pub fn history(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<HistoryEntry>, WorkflowServiceError> {
        Ok(self.instance(instance_id)?.instance.history().to_vec())
    }

    fn resolve_guard(
        &self,
        definition: &ValidatedDefinition,
        instance: &WorkflowInstance,
        request: &TransitionRequest,
    ) -> Result<Option<bool>, GuardError> {
        let guard = definition
            .transition(&request.transition_id)
            .filter(|transition| &transition.from_state == instance.current_state())
            .and_then(|transition| transition.guard.as_deref());

        match guard {
            Some(guard) => {
                let passed = self.guards.evaluate(guard, instance, &request.actor)?;
                debug!(guard, passed, actor = %request.actor, "guard evaluated");
                Ok(Some(passed))
            }
            None => Ok(None),
        }
    }

    fn publish_side_effect(
        &self,
        definition: &ValidatedDefinition,
        instance: &WorkflowInstance,
    ) -> Result<(), PublishError> {
        let Some(entry) = instance.history().last() else {
            return Ok(());
        };
        let Some(side_effect) = definition
            .transition(&entry.transition_id)
            .and_then(|transition| transition.side_effect.clone())
        else {
            return Ok(());
        };

        self.publisher.publish(TransitionEvent {
            side_effect,
            definition_id: instance.definition_id().clone(),
            instance_id: instance.id().clone(),
            transition_id: entry.transition_id.clone(),
            from_state: entry.from_state.clone(),
            to_state: entry.to_state.clone(),
            actor: entry.actor.clone(),
            occurred_at: entry.occurred_at,
        })
    }
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationReport),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error("transition persisted but side effect could not be published: {0}")]
    Publish(#[from] PublishError),
    #[error("workflow definition {0} not found")]
    DefinitionNotFound(DefinitionId),
    #[error("workflow instance {0} not found")]
    InstanceNotFound(InstanceId),
    #[error("gave up on instance {instance_id} after {attempts} conflicting writes")]
    ConflictRetriesExhausted {
        instance_id: InstanceId,
        attempts: u32,
    },
}
