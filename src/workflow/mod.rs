//! Command workflows.
//!
//! Each command loads the effective settings, then calls into the library
//! modules; printing happens only here.
mod context;
mod reduce;
mod setup;

pub(crate) use reduce::{run_plan, run_reduce, run_step};
pub(crate) use setup::run_setup;

use crate::cli::{GlobalArgs, ZeropointsArgs};
use crate::config::render_config;
use crate::zeropoints;
use anyhow::Result;
use context::WorkflowContext;

pub(crate) fn run_zeropoints(global: &GlobalArgs, args: &ZeropointsArgs) -> Result<()> {
    let ctx = WorkflowContext::load(global)?;
    let summary = zeropoints::aggregate(&ctx.work_root, args.filter.as_deref())?;
    match &args.out {
        Some(out) => {
            zeropoints::write_summary(&summary, out)?;
            println!("wrote {} run(s) to {}", summary.len(), out.display());
        }
        None => print!("{}", zeropoints::render_summary(&summary)?),
    }
    Ok(())
}

pub(crate) fn run_config(global: &GlobalArgs) -> Result<()> {
    let mut ctx = WorkflowContext::load(global)?;
    ctx.config.work_root = Some(ctx.work_root.clone());
    print!("{}", render_config(&ctx.config)?);
    Ok(())
}
