use crate::demo::{run_demo, run_report, run_trial, DemoArgs, ReportArgs, TrialArgs};
use clap::{Parser, Subcommand};
use smart_recruiter::config::AppConfig;
use smart_recruiter::error::AppError;
use smart_recruiter::telemetry;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "Smart Recruiter",
    about = "Exercise the assessment hiring workflow from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed an in-memory store and walk through invitation, submission and grading (default command)
    Demo(DemoArgs),
    /// Print qualification, gender and monthly analytics for a seed
    Report(ReportArgs),
    /// Print the fixed trial assessment
    Trial(TrialArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    debug!(?config.environment, "configuration loaded");

    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(DemoArgs::default()));

    match command {
        Command::Demo(args) => run_demo(args, config.workflow),
        Command::Report(args) => run_report(args, config.workflow),
        Command::Trial(args) => run_trial(args),
    }
}
