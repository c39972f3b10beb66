use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActorId, DefinitionId, HistoryEntry, InstanceError, InstanceId, StateId, StateKind,
    TransitionId, WorkflowInstance,
};
use super::history;
use super::validator::ValidatedDefinition;

/// Caller input for a single transition attempt.
///
/// `guard_passed` carries the caller's verdict for the transition's named guard. The engine
/// never evaluates business predicates; an unevaluated guard counts as a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub transition_id: TransitionId,
    pub actor: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard_passed: Option<bool>,
}

impl TransitionRequest {
    pub fn new(transition_id: impl Into<TransitionId>, actor: impl Into<ActorId>) -> Self {
        Self {
            transition_id: transition_id.into(),
            actor: actor.into(),
            note: None,
            guard_passed: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_guard_verdict(mut self, passed: bool) -> Self {
        self.guard_passed = Some(passed);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("instance belongs to definition {instance} but was run against {definition}")]
    DefinitionMismatch {
        instance: DefinitionId,
        definition: DefinitionId,
    },
    #[error("current state {0} is not part of the definition")]
    UnknownState(StateId),
    #[error("state {state} is terminal; transition {transition_id} cannot fire")]
    TerminalState {
        state: StateId,
        transition_id: TransitionId,
    },
    #[error("transition {0} is not defined")]
    UnknownTransition(TransitionId),
    #[error("transition {transition_id} leaves {expected} but the instance is in {current}")]
    IllegalTransition {
        transition_id: TransitionId,
        expected: StateId,
        current: StateId,
    },
    #[error("guard {guard} rejected transition {transition_id}")]
    GuardRejected {
        transition_id: TransitionId,
        guard: String,
    },
    #[error("transition at {requested_at} predates entry into the current state at {entered_at}")]
    ClockSkew {
        entered_at: DateTime<Utc>,
        requested_at: DateTime<Utc>,
    },
}

impl WorkflowInstance {
    /// Create an instance in the definition's designated initial state.
    pub fn start(
        definition: &ValidatedDefinition,
        id: impl Into<InstanceId>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let entry = definition.designated_initial().clone();
        Self::enter(definition, id.into(), entry, started_at)
    }

    /// Create an instance in an explicitly chosen entry state, which must have type `initial`.
    pub fn start_in(
        definition: &ValidatedDefinition,
        id: impl Into<InstanceId>,
        entry: &StateId,
        started_at: DateTime<Utc>,
    ) -> Result<Self, InstanceError> {
        let state = definition
            .state(entry)
            .ok_or_else(|| InstanceError::UnknownState(entry.clone()))?;
        if state.kind != StateKind::Initial {
            return Err(InstanceError::NotAnEntryState(entry.clone()));
        }
        Ok(Self::enter(definition, id.into(), entry.clone(), started_at))
    }

    fn enter(
        definition: &ValidatedDefinition,
        id: InstanceId,
        entry: StateId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            definition_id: definition.id.clone(),
            definition_version: definition.version,
            initial_state: entry.clone(),
            current_state: entry,
            started_at,
            history: Vec::new(),
        }
    }
}

/// Execute a transition, stamping the history entry with the current wall-clock time.
pub fn apply_transition(
    definition: &ValidatedDefinition,
    instance: &WorkflowInstance,
    request: TransitionRequest,
) -> Result<WorkflowInstance, TransitionError> {
    apply_transition_at(definition, instance, request, Utc::now())
}

/// Execute a transition at an explicit point in time.
///
/// The input instance is never modified: on success a new value is returned, on failure the
/// caller still holds the untouched original.
pub fn apply_transition_at(
    definition: &ValidatedDefinition,
    instance: &WorkflowInstance,
    request: TransitionRequest,
    now: DateTime<Utc>,
) -> Result<WorkflowInstance, TransitionError> {
    if instance.definition_id != definition.id {
        return Err(TransitionError::DefinitionMismatch {
            instance: instance.definition_id.clone(),
            definition: definition.id.clone(),
        });
    }

    let current = &instance.current_state;
    if definition.state(current).is_none() {
        return Err(TransitionError::UnknownState(current.clone()));
    }

    // Terminal absorption holds for every transition id, including unknown ones.
    if definition.is_terminal(current) {
        return Err(TransitionError::TerminalState {
            state: current.clone(),
            transition_id: request.transition_id,
        });
    }

    let transition = definition
        .transition(&request.transition_id)
        .ok_or_else(|| TransitionError::UnknownTransition(request.transition_id.clone()))?;

    if &transition.from_state != current {
        return Err(TransitionError::IllegalTransition {
            transition_id: transition.id.clone(),
            expected: transition.from_state.clone(),
            current: current.clone(),
        });
    }

    if let Some(guard) = &transition.guard {
        if request.guard_passed != Some(true) {
            return Err(TransitionError::GuardRejected {
                transition_id: transition.id.clone(),
                guard: guard.clone(),
            });
        }
    }

    let entered_at = instance.entered_current_state_at();
    if now < entered_at {
        return Err(TransitionError::ClockSkew {
            entered_at,
            requested_at: now,
        });
    }

    let entry = HistoryEntry {
        transition_id: transition.id.clone(),
        from_state: transition.from_state.clone(),
        to_state: transition.to_state.clone(),
        occurred_at: now,
        actor: request.actor,
        note: request.note,
    };

    Ok(history::record(instance, entry))
}
