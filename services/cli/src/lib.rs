mod cli;
mod commands;
mod demo;
mod infra;

use talent_flow::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
