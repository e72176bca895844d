mod cli;
mod error;

use clap::Parser;
use cli::{Cli, Commands, InternalRunArgs, RunArgs};
use colored::Colorize;
use drover_core::model::{JobName, JobRecord};
use drover_core::{logging, Environment, LogDir, Mode, Pipeline, RunOptions};
use drover_manager::backend::Outcome;
use drover_manager::error::LockError;
use drover_manager::{run_pipeline, runner, ManagerError, RunSummary};
use error::CliError;
use std::io::{self, BufRead, Write};

fn main() {
    let cli = Cli::parse();
    logging::init_stderr_logger(cli.verbose);

    let code = match cli.command {
        Commands::Run(args) => run(args),
        Commands::InternalRun(args) => internal_run(args),
    };
    std::process::exit(code);
}

fn run(args: RunArgs) -> i32 {
    match try_run(args) {
        Ok(summary) => {
            print_summary(&summary);
            if summary.failed > 0 {
                1
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            2
        }
    }
}

fn try_run(args: RunArgs) -> Result<RunSummary, CliError> {
    let mode: Mode = args.mode.parse()?;
    let records: Vec<JobRecord> = serde_json::from_slice(&fs_err::read(&args.pipeline_file)?)?;
    let pipeline = Pipeline::from_records(records)?;
    let env = Environment::detect()?;

    let options = RunOptions {
        mode,
        max_queued: args.max_queued,
        time_between_checks: args.time_between_checks,
        nb_checks_per_point: args.nb_checks_per_point,
        max_buffer: args.max_buffer,
        shell_options: args.shell_options,
        qsub_options: args.qsub_options,
        restart: args.restart,
    };

    match run_pipeline(&pipeline, &args.logs, &options, &env, args.force_lock) {
        Err(ManagerError::Lock(LockError::Held { path, since })) if !args.force_lock => {
            eprintln!(
                "A manager already owns {} (locked since {}).",
                path.display(),
                since
            );
            if confirm("Treat the lock as stale and replace it? [y/N] ")? {
                run_pipeline(&pipeline, &args.logs, &options, &env, true).map_err(Into::into)
            } else {
                Err(ManagerError::Lock(LockError::Held { path, since }).into())
            }
        }
        other => other.map_err(Into::into),
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_summary(summary: &RunSummary) {
    if summary.failed > 0 {
        println!(
            "{} {}",
            "Pipeline completed with failures:".red().bold(),
            summary
        );
        if let Some(log) = &summary.first_failed_log {
            println!("First failed job log: {}", log.display());
        }
    } else {
        println!("{} {}", "Pipeline completed:".green().bold(), summary);
    }
}

fn internal_run(args: InternalRunArgs) -> i32 {
    let logs = LogDir::new(&args.logs);
    let job = JobName::from(args.job.as_str());

    let env = match Environment::detect() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return 2;
        }
    };

    match runner::run_job(&logs, &job, &env) {
        Ok(Outcome::Finished) => 0,
        Ok(Outcome::Failed) => 1,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            2
        }
    }
}
