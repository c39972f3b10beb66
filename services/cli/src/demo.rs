use crate::infra::{
    parse_timestamp, write_json, InMemoryWorkflowRepository, RecordingPublisher,
    RoleGuardEvaluator,
};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use talent_flow::config::WorkflowConfig;
use talent_flow::error::AppError;
use talent_flow::workflows::pipeline::blueprint::OFFER_APPROVAL_GUARD;
use talent_flow::workflows::pipeline::{
    candidate_pipeline, export_csv, state_groups, InstanceId, SlaStatus, StateId, StateKind,
    StoredInstance, TransitionError, TransitionRequest, WorkflowService, WorkflowServiceError,
};

const RECRUITER: &str = "recruiter@acme.test";
const HIRING_MANAGER: &str = "hiring.manager@acme.test";
const CANDIDATE: &str = "candidate";

type DemoService =
    WorkflowService<InMemoryWorkflowRepository, RoleGuardEvaluator, RecordingPublisher>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Timestamp the first application arrives (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Hours after the start at which SLA status is evaluated.
    #[arg(long, default_value_t = 200)]
    pub(crate) report_after_hours: i64,
    /// Write the candidate pipeline definition to this file as JSON.
    #[arg(long)]
    pub(crate) export_definition: Option<PathBuf>,
    /// Skip the CSV audit trail at the end of the demo.
    #[arg(long)]
    pub(crate) skip_history: bool,
}

pub(crate) fn run_demo(args: DemoArgs, config: WorkflowConfig) -> Result<(), AppError> {
    let DemoArgs {
        start,
        report_after_hours,
        export_definition,
        skip_history,
    } = args;
    let start = start.unwrap_or_else(Utc::now);
    let at = |hours: i64| start + Duration::hours(hours);

    let publisher = Arc::new(RecordingPublisher::default());
    let service = WorkflowService::new(
        Arc::new(InMemoryWorkflowRepository::default()),
        Arc::new(RoleGuardEvaluator::default().allow(OFFER_APPROVAL_GUARD, HIRING_MANAGER)),
        Arc::clone(&publisher),
        config,
    );

    println!("Recruiting workflow demo");
    let definition = service.register_definition(candidate_pipeline())?;
    println!(
        "Registered {} v{} ({} states, {} transitions)",
        definition.name,
        definition.version,
        definition.states.len(),
        definition.transitions.len()
    );
    let groups = state_groups(&definition);
    for kind in StateKind::ordered() {
        let labels: Vec<&str> = groups
            .of(kind)
            .iter()
            .map(|state| state.label.as_str())
            .collect();
        if !labels.is_empty() {
            println!("  {:<13} {}", kind.label(), labels.join(", "));
        }
    }
    if let Some(path) = export_definition {
        write_json(&definition, Some(path.as_path()))?;
        println!("Definition written to {}", path.display());
    }

    let direct = InstanceId::from("application-001");
    let referral = InstanceId::from("application-002");
    service.start_instance(&definition.id, direct.clone(), None, start)?;
    service.start_instance(
        &definition.id,
        referral.clone(),
        Some(&StateId::from("referred")),
        at(1),
    )?;

    println!("\nApplication {direct}");
    step(&service, &direct, TransitionRequest::new("screen", RECRUITER), at(2))?;
    step(
        &service,
        &direct,
        TransitionRequest::new("schedule_interview", RECRUITER).with_note("Panel booked"),
        at(30),
    )?;
    step(&service, &direct, TransitionRequest::new("extend_offer", RECRUITER), at(100))?;
    step(
        &service,
        &direct,
        TransitionRequest::new("extend_offer", HIRING_MANAGER).with_note("Approved at band L4"),
        at(101),
    )?;
    step(&service, &direct, TransitionRequest::new("accept_offer", CANDIDATE), at(130))?;

    println!("\nApplication {referral}");
    step(&service, &referral, TransitionRequest::new("fast_track", RECRUITER), at(3))?;

    let report_at = at(report_after_hours);
    println!("\nSLA status at {}", report_at.to_rfc3339());
    for id in [&direct, &referral] {
        render_sla(id, &service.sla(id, report_at)?);
    }

    let events = publisher.events();
    println!("\nSide effects dispatched: {}", events.len());
    for event in &events {
        println!(
            "  - {} for {} ({} -> {})",
            event.side_effect, event.instance_id, event.from_state, event.to_state
        );
    }

    if !skip_history {
        println!("\nAudit trail for {direct}");
        let stored = service.instance(&direct)?;
        export_csv(&stored.instance, io::stdout().lock())?;
    }

    Ok(())
}

fn step(
    service: &DemoService,
    instance_id: &InstanceId,
    request: TransitionRequest,
    at: DateTime<Utc>,
) -> Result<Option<StoredInstance>, AppError> {
    let transition_id = request.transition_id.clone();
    let actor = request.actor.clone();
    match service.transition_at(instance_id, request, at) {
        Ok(stored) => {
            println!(
                "  {:<20} by {:<26} -> {} (rev {})",
                transition_id.as_str(),
                actor.as_str(),
                stored.instance.current_state(),
                stored.revision
            );
            Ok(Some(stored))
        }
        Err(WorkflowServiceError::Transition(error @ TransitionError::GuardRejected { .. })) => {
            println!(
                "  {:<20} by {:<26} refused: {}",
                transition_id.as_str(),
                actor.as_str(),
                error
            );
            Ok(None)
        }
        Err(other) => Err(other.into()),
    }
}

fn render_sla(instance_id: &InstanceId, status: &SlaStatus) {
    match (status.sla_hours, status.deadline) {
        (Some(hours), Some(deadline)) => println!(
            "  {instance_id}: {} for {}h of {}h (due {}){}",
            status.state,
            status.elapsed().num_hours(),
            hours,
            deadline.to_rfc3339(),
            if status.overdue { " OVERDUE" } else { "" }
        ),
        _ => println!(
            "  {instance_id}: {} (no SLA, {}h in state)",
            status.state,
            status.elapsed().num_hours()
        ),
    }
}
