use crate::infra::{parse_timestamp, read_json, write_json};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use talent_flow::config::WorkflowConfig;
use talent_flow::error::AppError;
use talent_flow::workflows::pipeline::{
    apply_transition_at, available_transitions, export_csv, sla_status, state_progress,
    validate, verify_history, InstanceId, SlaStatus, StateId, StateProgress, TransitionId,
    TransitionRequest, ValidatedDefinition, WorkflowDefinition, WorkflowInstance,
};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct DefinitionArg {
    /// Workflow definition JSON file (defaults to WORKFLOW_DEFINITION_PATH)
    #[arg(long)]
    pub(crate) definition: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ValidateArgs {
    #[command(flatten)]
    pub(crate) definition: DefinitionArg,
    /// Print the validation outcome as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct StartArgs {
    #[command(flatten)]
    pub(crate) definition: DefinitionArg,
    /// Identifier of the business entity the instance tracks
    #[arg(long)]
    pub(crate) id: String,
    /// Explicit entry state; must have type `initial`
    #[arg(long)]
    pub(crate) entry: Option<String>,
    /// Start timestamp (RFC 3339, defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Write the instance to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct InspectArgs {
    #[command(flatten)]
    pub(crate) definition: DefinitionArg,
    /// Workflow instance JSON file
    #[arg(long)]
    pub(crate) instance: PathBuf,
    /// Evaluation time for SLA checks (RFC 3339, defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Print the inspection as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct TransitionArgs {
    #[command(flatten)]
    pub(crate) definition: DefinitionArg,
    /// Workflow instance JSON file
    #[arg(long)]
    pub(crate) instance: PathBuf,
    /// Transition id to execute
    #[arg(long)]
    pub(crate) transition: String,
    /// Identity recorded in the audit trail
    #[arg(long)]
    pub(crate) actor: String,
    /// Optional note stored with the history entry
    #[arg(long)]
    pub(crate) note: Option<String>,
    /// Pre-evaluated verdict for the transition's guard, if it declares one
    #[arg(long)]
    pub(crate) guard_passed: Option<bool>,
    /// Transition timestamp (RFC 3339, defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Overwrite the instance file with the result
    #[arg(long, conflicts_with = "output")]
    pub(crate) in_place: bool,
    /// Write the updated instance to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum HistoryFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
pub(crate) struct HistoryArgs {
    /// Workflow instance JSON file
    #[arg(long)]
    pub(crate) instance: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = HistoryFormat::Csv)]
    pub(crate) format: HistoryFormat,
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionView {
    pub(crate) id: TransitionId,
    pub(crate) label: String,
    pub(crate) to_state: StateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) guard: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InspectView<'a> {
    pub(crate) instance_id: &'a InstanceId,
    pub(crate) definition: String,
    pub(crate) current_state: &'a StateId,
    pub(crate) terminal: bool,
    pub(crate) history_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) history_issue: Option<String>,
    pub(crate) available: Vec<ActionView>,
    pub(crate) progress: Vec<StateProgress<'a>>,
    pub(crate) sla: SlaStatus,
}

pub(crate) fn resolve_definition_path<'a>(
    arg: &'a DefinitionArg,
    config: &'a WorkflowConfig,
) -> Result<&'a Path, AppError> {
    arg.definition
        .as_deref()
        .or(config.definition_path.as_deref())
        .ok_or_else(|| {
            AppError::Usage(
                "no definition given; pass --definition or set WORKFLOW_DEFINITION_PATH"
                    .to_string(),
            )
        })
}

pub(crate) fn load_definition(
    arg: &DefinitionArg,
    config: &WorkflowConfig,
) -> Result<ValidatedDefinition, AppError> {
    let raw: WorkflowDefinition = read_json(resolve_definition_path(arg, config)?)?;
    Ok(validate(raw)?)
}

pub(crate) fn run_validate(args: ValidateArgs, config: &WorkflowConfig) -> Result<(), AppError> {
    let path = resolve_definition_path(&args.definition, config)?;
    let raw: WorkflowDefinition = read_json(path)?;

    match validate(raw) {
        Ok(definition) => {
            if args.json {
                write_json(&serde_json::json!({ "valid": true, "errors": [] }), None)?;
            } else {
                println!(
                    "{} v{} is valid: {} states, {} transitions, entry state {}",
                    definition.id,
                    definition.version,
                    definition.states.len(),
                    definition.transitions.len(),
                    definition.designated_initial()
                );
            }
            Ok(())
        }
        Err(report) => {
            if args.json {
                write_json(
                    &serde_json::json!({ "valid": false, "errors": &report.errors }),
                    None,
                )?;
            } else {
                println!("{} is invalid:", path.display());
                for error in &report.errors {
                    println!("  - {error}");
                }
            }
            Err(report.into())
        }
    }
}

pub(crate) fn run_start(args: StartArgs, config: &WorkflowConfig) -> Result<(), AppError> {
    let definition = load_definition(&args.definition, config)?;
    let started_at = args.at.unwrap_or_else(Utc::now);
    let instance = match &args.entry {
        Some(entry) => {
            let entry = StateId::from(entry.as_str());
            WorkflowInstance::start_in(&definition, args.id, &entry, started_at)?
        }
        None => WorkflowInstance::start(&definition, args.id, started_at),
    };

    info!(instance_id = %instance.id(), state = %instance.current_state(), "instance created");
    write_json(&instance, args.output.as_deref())
}

pub(crate) fn build_inspect_view<'a>(
    definition: &'a ValidatedDefinition,
    instance: &'a WorkflowInstance,
    now: DateTime<Utc>,
) -> InspectView<'a> {
    let available = available_transitions(definition, instance)
        .into_iter()
        .map(|transition| ActionView {
            id: transition.id.clone(),
            label: transition.label.clone(),
            to_state: transition.to_state.clone(),
            guard: transition.guard.clone(),
        })
        .collect();

    InspectView {
        instance_id: instance.id(),
        definition: format!("{} v{}", definition.id, definition.version),
        current_state: instance.current_state(),
        terminal: definition.is_terminal(instance.current_state()),
        history_entries: instance.history().len(),
        history_issue: verify_history(instance).err().map(|err| err.to_string()),
        available,
        progress: state_progress(definition, instance),
        sla: sla_status(definition, instance, now),
    }
}

pub(crate) fn run_inspect(args: InspectArgs, config: &WorkflowConfig) -> Result<(), AppError> {
    let definition = load_definition(&args.definition, config)?;
    let instance: WorkflowInstance = read_json(&args.instance)?;
    let now = args.now.unwrap_or_else(Utc::now);
    let view = build_inspect_view(&definition, &instance, now);

    if args.json {
        return write_json(&view, None);
    }

    println!("Instance {} ({})", view.instance_id, view.definition);
    println!(
        "Current state: {}{}",
        view.current_state,
        if view.terminal { " (terminal)" } else { "" }
    );
    match (view.sla.sla_hours, view.sla.deadline) {
        (Some(hours), Some(deadline)) => println!(
            "SLA: {}h, due {} -> {}",
            hours,
            deadline.to_rfc3339(),
            if view.sla.overdue { "OVERDUE" } else { "on track" }
        ),
        _ => println!("SLA: not tracked for this state"),
    }
    println!("History: {} entries", view.history_entries);
    if let Some(issue) = &view.history_issue {
        println!("  ! audit chain broken: {issue}");
    }
    println!("Progress:");
    for entry in &view.progress {
        println!("  - {:<20} {:?}", entry.state.label, entry.status);
    }
    if view.available.is_empty() {
        println!("No available transitions");
    } else {
        println!("Available transitions:");
        for action in &view.available {
            match &action.guard {
                Some(guard) => println!(
                    "  - {} -> {} ({}) [guard: {}]",
                    action.id, action.to_state, action.label, guard
                ),
                None => println!("  - {} -> {} ({})", action.id, action.to_state, action.label),
            }
        }
    }
    Ok(())
}

pub(crate) fn run_transition(
    args: TransitionArgs,
    config: &WorkflowConfig,
) -> Result<(), AppError> {
    let definition = load_definition(&args.definition, config)?;
    let instance: WorkflowInstance = read_json(&args.instance)?;
    verify_history(&instance)?;

    let request = TransitionRequest {
        transition_id: TransitionId::from(args.transition),
        actor: args.actor.into(),
        note: args.note,
        guard_passed: args.guard_passed,
    };
    let now = args.at.unwrap_or_else(Utc::now);
    let next = apply_transition_at(&definition, &instance, request, now)?;

    info!(
        instance_id = %next.id(),
        from = %instance.current_state(),
        to = %next.current_state(),
        "transition applied"
    );

    let target: Option<&Path> = if args.in_place {
        Some(args.instance.as_path())
    } else {
        args.output.as_deref()
    };
    write_json(&next, target)
}

pub(crate) fn run_history(args: HistoryArgs) -> Result<(), AppError> {
    let instance: WorkflowInstance = read_json(&args.instance)?;
    match args.format {
        HistoryFormat::Csv => export_csv(&instance, io::stdout().lock())?,
        HistoryFormat::Json => write_json(&instance.history(), None)?,
    }
    Ok(())
}
