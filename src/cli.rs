//! CLI argument parsing for the reduction workflow.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "obpipe",
    version,
    about = "Calibration and reduction orchestration for imaging observation blocks",
    after_help = "Commands:\n  setup --manifest <file>     Stage raw inputs and write the calibration catalog\n  plan --run <name>           Show what reduce would do\n  reduce --run <name>         Run every step that is not done yet\n  step --run <name> <step>    Run exactly one step\n  zeropoints                  Aggregate zero points across runs\n  config                      Print the effective configuration\n\nExamples:\n  obpipe setup --manifest /data/ob1.json --run ob1\n  obpipe plan --run ob1 --json\n  obpipe reduce --run ob1 --from combine_jit\n  obpipe zeropoints --filter Ks --out zp.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Pipeline config file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root directory holding one working tree per run
    #[arg(long, global = true, value_name = "DIR")]
    pub work_root: Option<PathBuf>,

    /// Log at debug level unless OBPIPE_LOG says otherwise
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Setup(SetupArgs),
    Plan(PlanArgs),
    Reduce(ReduceArgs),
    Step(StepArgs),
    Zeropoints(ZeropointsArgs),
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Resolve the manifest and stage inputs into a run working tree")]
pub struct SetupArgs {
    /// Absolute path to the observation-block manifest
    #[arg(long, value_name = "PATH")]
    pub manifest: PathBuf,

    /// Run name (defaults to the manifest name, then its file stem)
    #[arg(long, value_name = "NAME")]
    pub run: Option<String>,

    /// Directory holding the raw files the manifest names
    #[arg(long, value_name = "DIR")]
    pub raw_dir: Option<PathBuf>,

    /// Directory holding default reference calibrations
    #[arg(long, value_name = "DIR")]
    pub calib_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Show each step's status without running anything")]
pub struct PlanArgs {
    #[arg(long, value_name = "NAME")]
    pub run: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Run the reduction, skipping steps that are already done")]
pub struct ReduceArgs {
    #[arg(long, value_name = "NAME")]
    pub run: String,

    /// Re-run this step and every later step even if done
    #[arg(long, value_name = "STEP")]
    pub from: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Run a single step now")]
pub struct StepArgs {
    #[arg(long, value_name = "NAME")]
    pub run: String,

    /// Step name, as listed by `obpipe plan`
    #[arg(value_name = "STEP")]
    pub step: String,
}

#[derive(Parser, Debug)]
#[command(about = "Aggregate per-segment zero points across runs")]
pub struct ZeropointsArgs {
    /// Keep only rows measured in this filter band
    #[arg(long, value_name = "BAND")]
    pub filter: Option<String>,

    /// Write the summary here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Print the effective configuration as JSON")]
pub struct ConfigArgs {}
