//! Reduce, step, and plan commands over a set-up run.
use super::context::WorkflowContext;
use crate::cli::{GlobalArgs, PlanArgs, ReduceArgs, StepArgs};
use crate::pipeline::{self, PlanStatus, ReduceOptions, Sequencer};
use anyhow::{Context, Result};

pub(crate) fn run_reduce(global: &GlobalArgs, args: &ReduceArgs) -> Result<()> {
    let ctx = WorkflowContext::load(global)?;
    let run = ctx.load_run(&args.run)?;
    let runner = ctx.recipe_runner()?;
    let mut seq = Sequencer::new(run, &runner);
    let options = ReduceOptions {
        from: args.from.clone(),
    };
    let summary = pipeline::reduce(&mut seq, &options)
        .with_context(|| format!("reduce run `{}`", args.run))?;

    println!(
        "run {}: {} step(s) executed, {} already done, {} disabled",
        args.run,
        summary.executed.len(),
        summary.already_done.len(),
        summary.disabled.len()
    );
    println!("products in {}", seq.context().paths.products_dir().display());
    Ok(())
}

pub(crate) fn run_step(global: &GlobalArgs, args: &StepArgs) -> Result<()> {
    let ctx = WorkflowContext::load(global)?;
    let run = ctx.load_run(&args.run)?;
    let runner = ctx.recipe_runner()?;
    let mut seq = Sequencer::new(run, &runner);
    let report = seq
        .run_step(&args.step)
        .with_context(|| format!("run `{}`", args.run))?;

    for (key, paths) in &report.outputs {
        println!("{key}");
        for path in paths {
            println!("  {}", path.display());
        }
    }
    for role in &report.master_fallbacks {
        println!("note: {role} taken from the master calibration");
    }
    Ok(())
}

pub(crate) fn run_plan(global: &GlobalArgs, args: &PlanArgs) -> Result<()> {
    let ctx = WorkflowContext::load(global)?;
    let run = ctx.load_run(&args.run)?;
    let planned = pipeline::plan(&run);

    if args.json {
        let text = serde_json::to_string_pretty(&planned).context("serialize plan")?;
        println!("{text}");
        return Ok(());
    }
    for entry in &planned {
        print!(
            "{:<22} {:<24} {}",
            entry.step,
            entry.operation.as_str(),
            entry.status.as_str()
        );
        if entry.status == PlanStatus::Blocked {
            print!("  (missing {})", entry.missing.join(", "));
        }
        println!();
    }
    Ok(())
}
