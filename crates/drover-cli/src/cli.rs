use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "A pipeline manager for dependency-ordered batch jobs.",
    long_about = "Reads a pipeline declaration, derives the dependency graph from \
                  input/output file overlap, and drives every job to completion on \
                  the selected backend."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v for debug, -vv for trace)")]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run a pipeline to completion")]
    Run(RunArgs),

    #[command(hide = true)]
    InternalRun(InternalRunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(value_name = "PIPELINE_FILE", help = "JSON array of job declarations")]
    pub pipeline_file: PathBuf,

    #[arg(short, long, help = "Root log directory for this pipeline")]
    pub logs: PathBuf,

    #[arg(
        long,
        default_value = "session",
        help = "Backend: 'session', 'batch' or 'qsub'"
    )]
    pub mode: String,

    #[arg(long, help = "Maximum number of jobs in flight")]
    pub max_queued: Option<usize>,

    #[arg(long, help = "Seconds to sleep between scheduler iterations")]
    pub time_between_checks: Option<f64>,

    #[arg(long, help = "Idle iterations between liveness dots")]
    pub nb_checks_per_point: Option<u64>,

    #[arg(long, help = "Maximum jobs dispatched but not yet running")]
    pub max_buffer: Option<usize>,

    #[arg(
        long,
        default_value = "",
        allow_hyphen_values = true,
        help = "Shell prologue injected into generated backend scripts"
    )]
    pub shell_options: String,

    #[arg(
        long,
        default_value = "",
        allow_hyphen_values = true,
        help = "Extra options passed verbatim to qsub"
    )]
    pub qsub_options: String,

    #[arg(
        long,
        help = "Force-rerun jobs whose name contains this substring. Can be repeated."
    )]
    pub restart: Vec<String>,

    #[arg(long, help = "Replace an existing PIPE.lock without prompting")]
    pub force_lock: bool,
}

#[derive(Args)]
pub struct InternalRunArgs {
    #[arg(long)]
    pub logs: PathBuf,

    #[arg(long)]
    pub job: String,
}
