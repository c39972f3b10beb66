use serde::Serialize;

use super::domain::{State, StateId, StateKind, Transition, WorkflowInstance};
use super::validator::ValidatedDefinition;

/// Transitions the instance may attempt from its current state, in declaration order.
///
/// Terminal states (by type or by having nothing outgoing) offer no actions.
pub fn available_transitions<'a>(
    definition: &'a ValidatedDefinition,
    instance: &WorkflowInstance,
) -> Vec<&'a Transition> {
    let current = instance.current_state();
    if definition
        .state(current)
        .is_some_and(|state| state.kind.is_terminal())
    {
        return Vec::new();
    }

    definition
        .transitions
        .iter()
        .filter(|transition| &transition.from_state == current)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateGroups<'a> {
    pub initial: Vec<&'a State>,
    pub intermediate: Vec<&'a State>,
    #[serde(rename = "final")]
    pub final_states: Vec<&'a State>,
    pub error: Vec<&'a State>,
}

impl<'a> StateGroups<'a> {
    pub fn of(&self, kind: StateKind) -> &[&'a State] {
        match kind {
            StateKind::Initial => &self.initial,
            StateKind::Intermediate => &self.intermediate,
            StateKind::Final => &self.final_states,
            StateKind::Error => &self.error,
        }
    }
}

pub fn state_groups(definition: &ValidatedDefinition) -> StateGroups<'_> {
    let mut groups = StateGroups::default();
    for state in &definition.states {
        let bucket = match state.kind {
            StateKind::Initial => &mut groups.initial,
            StateKind::Intermediate => &mut groups.intermediate,
            StateKind::Final => &mut groups.final_states,
            StateKind::Error => &mut groups.error,
        };
        bucket.push(state);
    }
    groups
}

pub fn was_visited(instance: &WorkflowInstance, state: &StateId) -> bool {
    instance.current_state() == state
        || instance
            .history()
            .iter()
            .any(|entry| &entry.to_state == state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Current,
    Visited,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateProgress<'a> {
    pub state: &'a State,
    pub status: VisitStatus,
}

/// Every state in declaration order, tagged for rendering a pipeline overview.
pub fn state_progress<'a>(
    definition: &'a ValidatedDefinition,
    instance: &WorkflowInstance,
) -> Vec<StateProgress<'a>> {
    definition
        .states
        .iter()
        .map(|state| {
            let status = if instance.current_state() == &state.id {
                VisitStatus::Current
            } else if was_visited(instance, &state.id) || instance.initial_state() == &state.id {
                VisitStatus::Visited
            } else {
                VisitStatus::Pending
            };
            StateProgress { state, status }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pipeline::engine::{apply_transition_at, TransitionRequest};
    use crate::workflows::pipeline::tests::common::{
        at_hour, scenario_definition, scenario_instance,
    };

    #[test]
    fn lists_only_transitions_leaving_current_state() {
        let definition = scenario_definition();
        let instance = scenario_instance(&definition);
        let applied: Vec<&str> = available_transitions(&definition, &instance)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(applied, vec!["screen"]);

        let screening = apply_transition_at(
            &definition,
            &instance,
            TransitionRequest::new("screen", "recruiter"),
            at_hour(1),
        )
        .expect("screening");
        let options: Vec<&str> = available_transitions(&definition, &screening)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(options, vec!["hire", "reject"]);
    }

    #[test]
    fn groups_states_by_kind() {
        let definition = scenario_definition();
        let groups = state_groups(&definition);

        let ids = |states: &[&State]| -> Vec<String> {
            states.iter().map(|s| s.id.to_string()).collect()
        };
        assert_eq!(ids(groups.of(StateKind::Initial)), vec!["applied"]);
        assert_eq!(ids(groups.of(StateKind::Intermediate)), vec!["screening"]);
        assert_eq!(ids(groups.of(StateKind::Final)), vec!["hired", "rejected"]);
        assert!(groups.of(StateKind::Error).is_empty());
    }

    #[test]
    fn progress_marks_current_visited_and_pending() {
        let definition = scenario_definition();
        let instance = scenario_instance(&definition);
        let screening = apply_transition_at(
            &definition,
            &instance,
            TransitionRequest::new("screen", "recruiter"),
            at_hour(1),
        )
        .expect("screening");

        assert!(was_visited(&screening, &StateId::from("screening")));
        assert!(!was_visited(&screening, &StateId::from("hired")));

        let progress: Vec<(String, VisitStatus)> = state_progress(&definition, &screening)
            .into_iter()
            .map(|entry| (entry.state.id.to_string(), entry.status))
            .collect();
        assert_eq!(
            progress,
            vec![
                ("applied".to_string(), VisitStatus::Visited),
                ("screening".to_string(), VisitStatus::Current),
                ("hired".to_string(), VisitStatus::Pending),
                ("rejected".to_string(), VisitStatus::Pending),
            ]
        );
    }
}
