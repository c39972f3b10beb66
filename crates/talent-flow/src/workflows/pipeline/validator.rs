use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Deref;

use serde::{Serialize, Serializer};

use super::domain::{StateId, StateKind, TransitionId, WorkflowDefinition};

/// Machine readable reason attached to each validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
    EmptyDefinition,
    DuplicateState,
    DuplicateTransition,
    UnknownFromState,
    UnknownToState,
    MissingInitialState,
    InitialStateNotInitial,
    NoTerminalState,
    DeadEndState,
    DefinitionIdChanged,
    StaleVersion,
    RemovedState,
    RemovedTransition,
    RewiredTransition,
    ChangedStateKind,
}

impl ValidationCode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmptyDefinition => "empty_definition",
            Self::DuplicateState => "duplicate_state",
            Self::DuplicateTransition => "duplicate_transition",
            Self::UnknownFromState => "unknown_from_state",
            Self::UnknownToState => "unknown_to_state",
            Self::MissingInitialState => "missing_initial_state",
            Self::InitialStateNotInitial => "initial_state_not_initial",
            Self::NoTerminalState => "no_terminal_state",
            Self::DeadEndState => "dead_end_state",
            Self::DefinitionIdChanged => "definition_id_changed",
            Self::StaleVersion => "stale_version",
            Self::RemovedState => "removed_state",
            Self::RemovedTransition => "removed_transition",
            Self::RewiredTransition => "rewired_transition",
            Self::ChangedStateKind => "changed_state_kind",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub code: ValidationCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<StateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_id: Option<TransitionId>,
    pub message: String,
}

impl ValidationError {
    fn definition(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            state_id: None,
            transition_id: None,
            message: message.into(),
        }
    }

    fn state(code: ValidationCode, state: &StateId, message: impl Into<String>) -> Self {
        Self {
            code,
            state_id: Some(state.clone()),
            transition_id: None,
            message: message.into(),
        }
    }

    fn transition(
        code: ValidationCode,
        transition: &TransitionId,
        state: Option<&StateId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            state_id: state.cloned(),
            transition_id: Some(transition.clone()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.label(), self.message)
    }
}

/// Every problem found in a definition; validation never stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("workflow definition is invalid ({} error(s)): {}", .errors.len(), summarize(.errors))]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationReport {
    pub fn has(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|error| error.code == code)
    }
}

/// A definition that passed [`validate`]. The engine only accepts this type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDefinition {
    definition: WorkflowDefinition,
    initial_state: StateId,
}

impl ValidatedDefinition {
    pub fn designated_initial(&self) -> &StateId {
        &self.initial_state
    }

    pub fn into_inner(self) -> WorkflowDefinition {
        self.definition
    }
}

impl Deref for ValidatedDefinition {
    type Target = WorkflowDefinition;

    fn deref(&self) -> &Self::Target {
        &self.definition
    }
}

impl Serialize for ValidatedDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.definition.serialize(serializer)
    }
}

impl TryFrom<WorkflowDefinition> for ValidatedDefinition {
    type Error = ValidationReport;

    fn try_from(definition: WorkflowDefinition) -> Result<Self, Self::Error> {
        validate(definition)
    }
}

/// Check structural soundness of a definition before it may drive any instance.
pub fn validate(definition: WorkflowDefinition) -> Result<ValidatedDefinition, ValidationReport> {
    let errors = structural_errors(&definition);
    if !errors.is_empty() {
        return Err(ValidationReport { errors });
    }

    match definition.designated_initial().cloned() {
        Some(initial_state) => Ok(ValidatedDefinition {
            definition,
            initial_state,
        }),
        None => Err(ValidationReport {
            errors: vec![ValidationError::definition(
                ValidationCode::MissingInitialState,
                "definition declares no initial state",
            )],
        }),
    }
}

/// Validate a replacement for a definition that may already have live instances bound to it.
///
/// Besides the structural checks, only additive changes are accepted: no state or transition
/// id may disappear, an existing state keeps its type and an existing transition keeps its
/// endpoints.
pub fn validate_revision(
    current: &ValidatedDefinition,
    proposed: WorkflowDefinition,
) -> Result<ValidatedDefinition, ValidationReport> {
    let mut errors = structural_errors(&proposed);
    errors.extend(version_errors(current, &proposed));

    for state in &current.states {
        match proposed.state(&state.id) {
            None => errors.push(ValidationError::state(
                ValidationCode::RemovedState,
                &state.id,
                format!("state {} is referenced by live instances and cannot be removed", state.id),
            )),
            Some(updated) if updated.kind != state.kind => {
                errors.push(ValidationError::state(
                    ValidationCode::ChangedStateKind,
                    &state.id,
                    format!(
                        "state {} changed type from {} to {} while instances are bound to it",
                        state.id,
                        state.kind.label(),
                        updated.kind.label()
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    for existing in &current.transitions {
        match proposed.transition(&existing.id) {
            None => errors.push(ValidationError::transition(
                ValidationCode::RemovedTransition,
                &existing.id,
                None,
                format!(
                    "transition {} is referenced by live instances and cannot be removed",
                    existing.id
                ),
            )),
            Some(updated)
                if updated.from_state != existing.from_state
                    || updated.to_state != existing.to_state =>
            {
                errors.push(ValidationError::transition(
                    ValidationCode::RewiredTransition,
                    &existing.id,
                    Some(&existing.from_state),
                    format!(
                        "transition {} changed from {} -> {} to {} -> {}",
                        existing.id,
                        existing.from_state,
                        existing.to_state,
                        updated.from_state,
                        updated.to_state
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        validate(proposed)
    } else {
        Err(ValidationReport { errors })
    }
}

/// Identity and version rules for replacing a stored definition.
pub(crate) fn version_errors(
    current: &ValidatedDefinition,
    proposed: &WorkflowDefinition,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if proposed.id != current.id {
        errors.push(ValidationError::definition(
            ValidationCode::DefinitionIdChanged,
            format!("definition id changed from {} to {}", current.id, proposed.id),
        ));
    }
    if proposed.version <= current.version {
        errors.push(ValidationError::definition(
            ValidationCode::StaleVersion,
            format!(
                "version {} must be greater than the current version {}",
                proposed.version, current.version
            ),
        ));
    }
    errors
}

fn structural_errors(definition: &WorkflowDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if definition.states.is_empty() {
        errors.push(ValidationError::definition(
            ValidationCode::EmptyDefinition,
            format!("definition {} declares no states", definition.id),
        ));
        return errors;
    }

    let mut states = BTreeMap::new();
    for state in &definition.states {
        if states.insert(&state.id, state.kind).is_some() {
            errors.push(ValidationError::state(
                ValidationCode::DuplicateState,
                &state.id,
                format!("state id {} is declared more than once", state.id),
            ));
        }
    }

    let mut transition_ids = HashSet::new();
    let mut has_outgoing = HashSet::new();
    for transition in &definition.transitions {
        if !transition_ids.insert(&transition.id) {
            errors.push(ValidationError::transition(
                ValidationCode::DuplicateTransition,
                &transition.id,
                None,
                format!("transition id {} is declared more than once", transition.id),
            ));
        }
        if !states.contains_key(&transition.from_state) {
            errors.push(ValidationError::transition(
                ValidationCode::UnknownFromState,
                &transition.id,
                Some(&transition.from_state),
                format!(
                    "transition {} leaves unknown state {}",
                    transition.id, transition.from_state
                ),
            ));
        }
        if !states.contains_key(&transition.to_state) {
            errors.push(ValidationError::transition(
                ValidationCode::UnknownToState,
                &transition.id,
                Some(&transition.to_state),
                format!(
                    "transition {} targets unknown state {}",
                    transition.id, transition.to_state
                ),
            ));
        }
        has_outgoing.insert(&transition.from_state);
    }

    let mut any_absorbing = false;
    for state in &definition.states {
        let leaves = has_outgoing.contains(&state.id);
        if !leaves {
            any_absorbing = true;
        }
        if !leaves && !state.kind.is_terminal() {
            errors.push(ValidationError::state(
                ValidationCode::DeadEndState,
                &state.id,
                format!(
                    "{} state {} has no outgoing transitions; instances entering it would be stuck",
                    state.kind.label(),
                    state.id
                ),
            ));
        }
    }
    if !any_absorbing {
        errors.push(ValidationError::definition(
            ValidationCode::NoTerminalState,
            "at least one state must have no outgoing transitions",
        ));
    }

    match definition.designated_initial() {
        None => errors.push(ValidationError::definition(
            ValidationCode::MissingInitialState,
            "definition declares no initial state",
        )),
        Some(initial) => match states.get(initial) {
            None => errors.push(ValidationError::state(
                ValidationCode::MissingInitialState,
                initial,
                format!("designated initial state {initial} does not exist"),
            )),
            Some(kind) if *kind != StateKind::Initial => errors.push(ValidationError::state(
                ValidationCode::InitialStateNotInitial,
                initial,
                format!(
                    "designated initial state {initial} has type {} instead of initial",
                    kind.label()
                ),
            )),
            Some(_) => {}
        },
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pipeline::domain::{DefinitionId, State, Transition};

    fn state(id: &str, kind: StateKind) -> State {
        State {
            id: StateId::from(id),
            label: id.to_string(),
            kind,
            color: String::new(),
            description: String::new(),
            sla_hours: None,
        }
    }

    fn edge(id: &str, from: &str, to: &str) -> Transition {
        Transition {
            id: TransitionId::from(id),
            from_state: StateId::from(from),
            to_state: StateId::from(to),
            label: id.to_string(),
            guard: None,
            side_effect: None,
        }
    }

    fn definition(states: Vec<State>, transitions: Vec<Transition>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: DefinitionId::from("hiring"),
            version: 1,
            name: "Hiring".to_string(),
            description: String::new(),
            initial_state: None,
            states,
            transitions,
        }
    }

    fn valid_definition() -> WorkflowDefinition {
        definition(
            vec![
                state("applied", StateKind::Initial),
                state("screening", StateKind::Intermediate),
                state("hired", StateKind::Final),
                state("rejected", StateKind::Final),
            ],
            vec![
                edge("screen", "applied", "screening"),
                edge("hire", "screening", "hired"),
                edge("reject", "screening", "rejected"),
            ],
        )
    }

    #[test]
    fn accepts_well_formed_definition() {
        let validated = validate(valid_definition()).expect("definition is valid");
        assert_eq!(validated.designated_initial(), &StateId::from("applied"));
    }

    #[test]
    fn rejects_empty_definition() {
        let report = validate(definition(Vec::new(), Vec::new())).expect_err("empty is invalid");
        assert!(report.has(ValidationCode::EmptyDefinition));
    }

    #[test]
    fn collects_every_error_instead_of_stopping_early() {
        let mut broken = valid_definition();
        broken.states.push(state("screening", StateKind::Intermediate));
        broken.transitions.push(edge("hire", "screening", "hired"));
        broken.transitions.push(edge("ghost", "nowhere", "limbo"));

        let report = validate(broken).expect_err("definition is invalid");
        assert!(report.has(ValidationCode::DuplicateState));
        assert!(report.has(ValidationCode::DuplicateTransition));
        assert!(report.has(ValidationCode::UnknownFromState));
        assert!(report.has(ValidationCode::UnknownToState));

        let unknown_from = report
            .errors
            .iter()
            .find(|error| error.code == ValidationCode::UnknownFromState)
            .expect("unknown from reported");
        assert_eq!(unknown_from.transition_id, Some(TransitionId::from("ghost")));
        assert_eq!(unknown_from.state_id, Some(StateId::from("nowhere")));
    }

    #[test]
    fn dead_end_intermediate_state_is_an_error() {
        let mut stuck = valid_definition();
        stuck
            .states
            .push(state("interview", StateKind::Intermediate));
        stuck.transitions.push(edge("interview", "screening", "interview"));

        let report = validate(stuck).expect_err("dead end rejected");
        let error = report
            .errors
            .iter()
            .find(|error| error.code == ValidationCode::DeadEndState)
            .expect("dead end reported");
        assert_eq!(error.state_id, Some(StateId::from("interview")));
    }

    #[test]
    fn cycle_without_absorbing_state_is_rejected() {
        let looping = definition(
            vec![
                state("open", StateKind::Initial),
                state("review", StateKind::Intermediate),
            ],
            vec![edge("submit", "open", "review"), edge("reopen", "review", "open")],
        );

        let report = validate(looping).expect_err("no terminal state");
        assert!(report.has(ValidationCode::NoTerminalState));
    }

    #[test]
    fn missing_initial_state_is_rejected() {
        let mut no_entry = valid_definition();
        no_entry.states[0].kind = StateKind::Intermediate;

        let report = validate(no_entry).expect_err("no initial state");
        assert!(report.has(ValidationCode::MissingInitialState));
    }

    #[test]
    fn designated_initial_must_have_initial_type() {
        let mut misdesignated = valid_definition();
        misdesignated.initial_state = Some(StateId::from("screening"));

        let report = validate(misdesignated).expect_err("designation rejected");
        assert!(report.has(ValidationCode::InitialStateNotInitial));
    }

    #[test]
    fn explicit_designation_picks_among_several_initial_states() {
        let mut referral = valid_definition();
        referral.states.push(state("referred", StateKind::Initial));
        referral.transitions.push(edge("fast_track", "referred", "screening"));
        referral.initial_state = Some(StateId::from("referred"));

        let validated = validate(referral).expect("valid");
        assert_eq!(validated.designated_initial(), &StateId::from("referred"));
    }

    #[test]
    fn revision_accepts_additive_changes() {
        let current = validate(valid_definition()).expect("valid");
        let mut proposed = valid_definition();
        proposed.version = 2;
        proposed.states.push(state("withdrawn", StateKind::Final));
        proposed.transitions.push(edge("withdraw", "screening", "withdrawn"));

        let revised = validate_revision(&current, proposed).expect("additive change accepted");
        assert_eq!(revised.version, 2);
        assert_eq!(revised.states.len(), 5);
    }

    #[test]
    fn revision_rejects_removed_and_rewired_ids() {
        let current = validate(valid_definition()).expect("valid");
        let mut proposed = valid_definition();
        proposed.version = 2;
        proposed.transitions.retain(|t| t.id.as_str() != "reject");
        proposed.states.retain(|s| s.id.as_str() != "rejected");
        proposed.transitions[1].to_state = StateId::from("applied");
        proposed.states.push(state("closed", StateKind::Final));
        proposed.transitions.push(edge("close", "applied", "closed"));

        let report = validate_revision(&current, proposed).expect_err("destructive change");
        assert!(report.has(ValidationCode::RemovedState));
        assert!(report.has(ValidationCode::RemovedTransition));
        assert!(report.has(ValidationCode::RewiredTransition));
    }

    #[test]
    fn revision_rejects_reopening_a_final_state() {
        let current = validate(valid_definition()).expect("valid");
        let mut proposed = valid_definition();
        proposed.version = 2;
        for state in proposed.states.iter_mut() {
            if state.id.as_str() == "hired" {
                state.kind = StateKind::Intermediate;
            }
        }
        proposed
            .transitions
            .push(edge("rehire_review", "hired", "rejected"));

        let report = validate_revision(&current, proposed).expect_err("type change rejected");
        assert!(report.has(ValidationCode::ChangedStateKind));
        let error = report
            .errors
            .iter()
            .find(|error| error.code == ValidationCode::ChangedStateKind)
            .expect("changed kind reported");
        assert_eq!(error.state_id, Some(StateId::from("hired")));
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn revision_requires_newer_version_and_same_id() {
        let current = validate(valid_definition()).expect("valid");
        let mut proposed = valid_definition();
        proposed.id = DefinitionId::from("other");

        let report = validate_revision(&current, proposed).expect_err("stale");
        assert!(report.has(ValidationCode::StaleVersion));
        assert!(report.has(ValidationCode::DefinitionIdChanged));
    }

    #[test]
    fn report_display_lists_codes() {
        let report = validate(definition(Vec::new(), Vec::new())).expect_err("invalid");
        let rendered = report.to_string();
        assert!(rendered.contains("1 error(s)"));
        assert!(rendered.contains("[empty_definition]"));
    }
}
