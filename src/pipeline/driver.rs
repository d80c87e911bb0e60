use super::{Sequencer, StepError};

#[derive(Debug, Clone, Default)]
pub struct ReduceOptions {
    /// Re-execute this step and every later one even if already done.
    pub from: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReduceSummary {
    pub executed: Vec<String>,
    pub already_done: Vec<String>,
    pub disabled: Vec<String>,
}

/// Walk the DAG in order, skipping finished and disabled steps; the first
/// failure aborts the walk.
pub fn reduce(seq: &mut Sequencer<'_>, options: &ReduceOptions) -> Result<ReduceSummary, StepError> {
    if let Some(from) = &options.from {
        seq.descriptor(from)?;
    }
    let names: Vec<String> = seq.steps().iter().map(|step| step.name.clone()).collect();
    let mut forced = false;
    let mut summary = ReduceSummary::default();

    for name in names {
        if options.from.as_deref() == Some(name.as_str()) {
            forced = true;
        }
        let step = seq.descriptor(&name)?;
        if !seq.is_enabled(step) {
            tracing::debug!(step = %name, "step disabled for this run");
            summary.disabled.push(name);
            continue;
        }
        if !forced && seq.is_done(step) {
            tracing::debug!(step = %name, state = %seq.state(&name), "skipping");
            summary.already_done.push(name);
            continue;
        }
        seq.run_step(&name)?;
        summary.executed.push(name);
    }

    tracing::info!(
        executed = summary.executed.len(),
        already_done = summary.already_done.len(),
        disabled = summary.disabled.len(),
        "reduction complete"
    );
    Ok(summary)
}
