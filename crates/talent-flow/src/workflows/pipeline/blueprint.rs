use super::domain::{
    DefinitionId, State, StateId, StateKind, Transition, TransitionId, WorkflowDefinition,
};

pub const CANDIDATE_PIPELINE_ID: &str = "candidate-pipeline";
pub const OFFER_APPROVAL_GUARD: &str = "requires_hiring_manager_approval";

/// Standard recruiting pipeline for a single candidate application.
pub fn candidate_pipeline() -> WorkflowDefinition {
    WorkflowDefinition {
        id: DefinitionId::from(CANDIDATE_PIPELINE_ID),
        version: 1,
        name: "Candidate Pipeline".to_string(),
        description: "Tracks an application from submission through screening, interviews and offer."
            .to_string(),
        initial_state: Some(StateId::from("applied")),
        states: candidate_states(),
        transitions: candidate_transitions(),
    }
}

fn state(
    id: &str,
    label: &str,
    kind: StateKind,
    color: &str,
    description: &str,
    sla_hours: Option<u32>,
) -> State {
    State {
        id: StateId::from(id),
        label: label.to_string(),
        kind,
        color: color.to_string(),
        description: description.to_string(),
        sla_hours,
    }
}

fn candidate_states() -> Vec<State> {
    vec![
        state(
            "applied",
            "Applied",
            StateKind::Initial,
            "blue",
            "Application received through the careers page or a job board.",
            Some(24),
        ),
        state(
            "referred",
            "Referred",
            StateKind::Initial,
            "indigo",
            "Employee referral that skips the recruiter screen.",
            Some(24),
        ),
        state(
            "screening",
            "Screening",
            StateKind::Intermediate,
            "yellow",
            "Recruiter reviews CV and runs the phone screen.",
            Some(48),
        ),
        state(
            "interview",
            "Interview",
            StateKind::Intermediate,
            "orange",
            "Panel interviews with the hiring team.",
            Some(120),
        ),
        state(
            "offer",
            "Offer",
            StateKind::Intermediate,
            "purple",
            "Offer extended and awaiting the candidate's answer.",
            Some(72),
        ),
        state(
            "hired",
            "Hired",
            StateKind::Final,
            "green",
            "Offer accepted; onboarding takes over.",
            None,
        ),
        state(
            "rejected",
            "Rejected",
            StateKind::Final,
            "red",
            "Application closed by the hiring team.",
            None,
        ),
        state(
            "withdrawn",
            "Withdrawn",
            StateKind::Final,
            "gray",
            "Candidate left the process or declined the offer.",
            None,
        ),
    ]
}

fn edge(
    id: &str,
    from: &str,
    to: &str,
    label: &str,
    guard: Option<&str>,
    side_effect: Option<&str>,
) -> Transition {
    Transition {
        id: TransitionId::from(id),
        from_state: StateId::from(from),
        to_state: StateId::from(to),
        label: label.to_string(),
        guard: guard.map(str::to_string),
        side_effect: side_effect.map(str::to_string),
    }
}

fn candidate_transitions() -> Vec<Transition> {
    vec![
        edge("screen", "applied", "screening", "Start screening", None, None),
        edge(
            "withdraw_application",
            "applied",
            "withdrawn",
            "Withdraw",
            None,
            None,
        ),
        edge(
            "fast_track",
            "referred",
            "interview",
            "Fast-track referral",
            None,
            Some("notify_interview_panel"),
        ),
        edge(
            "schedule_interview",
            "screening",
            "interview",
            "Schedule interviews",
            None,
            Some("notify_interview_panel"),
        ),
        edge(
            "reject_after_screening",
            "screening",
            "rejected",
            "Reject",
            None,
            Some("send_rejection_email"),
        ),
        edge(
            "withdraw_from_screening",
            "screening",
            "withdrawn",
            "Withdraw",
            None,
            None,
        ),
        edge(
            "extend_offer",
            "interview",
            "offer",
            "Extend offer",
            Some(OFFER_APPROVAL_GUARD),
            Some("send_offer_letter"),
        ),
        edge(
            "reject_after_interview",
            "interview",
            "rejected",
            "Reject",
            None,
            Some("send_rejection_email"),
        ),
        edge(
            "accept_offer",
            "offer",
            "hired",
            "Offer accepted",
            None,
            Some("start_onboarding"),
        ),
        edge(
            "decline_offer",
            "offer",
            "withdrawn",
            "Offer declined",
            None,
            None,
        ),
    ]
}
