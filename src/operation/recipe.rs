//! Operation backend that shells out to an external recipe executable.
//!
//! Each invocation becomes a set-of-frames file (`{step}.sof`) and a declared
//! outputs file (`{step}.out`), both `path ROLE` per line, passed to
//! `<program> <args...> <recipe> <sof> <out>` run inside the work directory.
use super::{Artifacts, Invocation, Operation, OperationKind};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

const STDERR_TAIL_BYTES: usize = 2000;

#[derive(Debug, Clone)]
pub struct RecipeRunner {
    program: String,
    args: Vec<String>,
    recipes: BTreeMap<OperationKind, String>,
}

impl RecipeRunner {
    /// Build a runner from a split command line and per-kind recipe overrides.
    pub fn new(command: &[String], recipes: BTreeMap<OperationKind, String>) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("recipe command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            recipes,
        })
    }

    /// Resolve the recipe program on PATH.
    pub fn locate(&self) -> Result<PathBuf> {
        which::which(&self.program)
            .with_context(|| format!("recipe program `{}` not found", self.program))
    }

    pub fn recipe_for(&self, kind: OperationKind) -> &str {
        self.recipes
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_recipe())
    }
}

impl Operation for RecipeRunner {
    fn invoke(&self, invocation: &Invocation) -> Result<Artifacts> {
        let workdir = &invocation.workdir;
        let sof_path = workdir.join(format!("{}.sof", invocation.step));
        let out_path = workdir.join(format!("{}.out", invocation.step));
        let log_path = workdir.join(format!("{}.log", invocation.step));

        let mut sof = frame_lines(&invocation.inputs);
        sof.push_str(&frame_lines(&invocation.calibrations));
        write_text(&sof_path, &sof)?;
        write_text(&out_path, &frame_lines(&invocation.outputs))?;

        let recipe = self.recipe_for(invocation.kind);
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(recipe)
            .arg(&sof_path)
            .arg(&out_path)
            .current_dir(workdir)
            .output()
            .with_context(|| format!("spawn recipe command: {}", self.program))?;
        let elapsed_ms = start.elapsed().as_millis();

        let mut log = output.stdout.clone();
        log.extend_from_slice(&output.stderr);
        fs::write(&log_path, &log).with_context(|| format!("write {}", log_path.display()))?;

        tracing::info!(
            step = %invocation.step,
            recipe,
            elapsed_ms,
            status = %output.status,
            "recipe finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "recipe {recipe} failed with status {}: {} (log: {})",
                output.status,
                tail(stderr.trim(), STDERR_TAIL_BYTES),
                log_path.display()
            ));
        }
        Ok(invocation.outputs.clone())
    }
}

fn frame_lines(artifacts: &Artifacts) -> String {
    let mut text = String::new();
    for (role, paths) in artifacts {
        let role = role.to_uppercase();
        for path in paths {
            let _ = writeln!(text, "{} {role}", path.display());
        }
    }
    text
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))
}

fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
