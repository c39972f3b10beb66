use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Stable identifier of a workflow definition.
    DefinitionId
);
string_id!(
    /// Identifier of one tracked workflow execution.
    InstanceId
);
string_id!(
    /// Identifier of a state within a definition.
    StateId
);
string_id!(
    /// Identifier of a transition within a definition.
    TransitionId
);
string_id!(
    /// Identity of whoever executed a transition, as resolved by the caller's auth context.
    ActorId
);

/// Closed set of state roles. Presentation attributes are derived elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Initial,
    Intermediate,
    Final,
    Error,
}

impl StateKind {
    pub const fn ordered() -> [Self; 4] {
        [Self::Initial, Self::Intermediate, Self::Final, Self::Error]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Intermediate => "intermediate",
            Self::Final => "final",
            Self::Error => "error",
        }
    }

    /// Final and error states are absorbing regardless of the transitions declared on them.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Final | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: StateId,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: StateKind,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
}

/// Directed edge between two states, optionally gated by a caller-resolved guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub id: TransitionId,
    pub from_state: StateId,
    pub to_state: StateId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effect: Option<String>,
}

/// Template describing the legal states and transitions of one business process.
///
/// A raw definition is plain data. It must pass through
/// [`validate`](super::validator::validate) before any instance can run against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: DefinitionId,
    #[serde(default = "first_version")]
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<StateId>,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
}

fn first_version() -> u32 {
    1
}

impl WorkflowDefinition {
    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|state| &state.id == id)
    }

    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|transition| &transition.id == id)
    }

    pub fn outgoing<'a>(
        &'a self,
        from: &'a StateId,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions
            .iter()
            .filter(move |transition| &transition.from_state == from)
    }

    /// Explicit designation if present, otherwise the first `initial` state in declaration order.
    pub fn designated_initial(&self) -> Option<&StateId> {
        self.initial_state.as_ref().or_else(|| {
            self.states
                .iter()
                .find(|state| state.kind == StateKind::Initial)
                .map(|state| &state.id)
        })
    }

    /// A state is terminal when its type says so or when nothing leaves it.
    pub fn is_terminal(&self, id: &StateId) -> bool {
        match self.state(id) {
            Some(state) if state.kind.is_terminal() => true,
            _ => self.outgoing(id).next().is_none(),
        }
    }
}

/// Immutable audit record of one executed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub transition_id: TransitionId,
    pub from_state: StateId,
    pub to_state: StateId,
    pub occurred_at: DateTime<Utc>,
    pub actor: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One tracked execution of a definition, bound to a single business entity.
///
/// Fields are read-only from outside the pipeline: the current state and the history
/// only move through [`apply_transition`](super::engine::apply_transition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub(super) id: InstanceId,
    pub(super) definition_id: DefinitionId,
    pub(super) definition_version: u32,
    pub(super) initial_state: StateId,
    pub(super) current_state: StateId,
    pub(super) started_at: DateTime<Utc>,
    #[serde(default)]
    pub(super) history: Vec<HistoryEntry>,
}

impl WorkflowInstance {
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn definition_id(&self) -> &DefinitionId {
        &self.definition_id
    }

    pub fn definition_version(&self) -> u32 {
        self.definition_version
    }

    pub fn initial_state(&self) -> &StateId {
        &self.initial_state
    }

    pub fn current_state(&self) -> &StateId {
        &self.current_state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Timestamp of the last transition, or the start time if nothing has fired yet.
    pub fn entered_current_state_at(&self) -> DateTime<Utc> {
        self.history
            .last()
            .map(|entry| entry.occurred_at)
            .unwrap_or(self.started_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceError {
    #[error("state {0} does not exist in the definition")]
    UnknownState(StateId),
    #[error("state {0} is not an initial state and cannot be used as an entry point")]
    NotAnEntryState(StateId),
}
