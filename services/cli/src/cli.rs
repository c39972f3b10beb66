use crate::commands::{
    run_history, run_inspect, run_start, run_transition, run_validate, HistoryArgs, InspectArgs,
    StartArgs, TransitionArgs, ValidateArgs,
};
use crate::demo::{run_demo, DemoArgs};
use clap::{Parser, Subcommand};
use talent_flow::config::AppConfig;
use talent_flow::error::AppError;
use talent_flow::telemetry;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "talent-flow",
    about = "Validate, inspect and drive recruiting workflow pipelines from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a workflow definition file for structural errors
    Validate(ValidateArgs),
    /// Create a new instance file bound to a definition
    Start(StartArgs),
    /// Show current state, available actions and SLA status for an instance
    Inspect(InspectArgs),
    /// Apply a transition to an instance file
    Transition(TransitionArgs),
    /// Export the audit trail of an instance
    History(HistoryArgs),
    /// Run an end-to-end candidate pipeline demo against in-memory storage
    Demo(DemoArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    debug!(?config.environment, "configuration loaded");

    match cli.command {
        Command::Validate(args) => run_validate(args, &config.workflow),
        Command::Start(args) => run_start(args, &config.workflow),
        Command::Inspect(args) => run_inspect(args, &config.workflow),
        Command::Transition(args) => run_transition(args, &config.workflow),
        Command::History(args) => run_history(args),
        Command::Demo(args) => run_demo(args, config.workflow),
    }
}
