use super::{Artifacts, Invocation, Operation};
use anyhow::{anyhow, Context, Result};
use std::cell::RefCell;
use std::fs;

/// Backend that writes every declared output and records each invocation.
#[derive(Debug, Default)]
pub(crate) struct TouchOperation {
    pub(crate) calls: RefCell<Vec<Invocation>>,
    fail_step: Option<String>,
}

impl TouchOperation {
    pub(crate) fn failing_at(step: &str) -> Self {
        Self {
            calls: RefCell::default(),
            fail_step: Some(step.to_string()),
        }
    }

    pub(crate) fn steps_called(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|call| call.step.clone())
            .collect()
    }
}

impl Operation for TouchOperation {
    fn invoke(&self, invocation: &Invocation) -> Result<Artifacts> {
        self.calls.borrow_mut().push(invocation.clone());
        if self.fail_step.as_deref() == Some(invocation.step.as_str()) {
            return Err(anyhow!("recipe crashed"));
        }
        for path in invocation.outputs.values().flatten() {
            fs::write(path, invocation.step.as_bytes())
                .with_context(|| format!("write {}", path.display()))?;
        }
        Ok(invocation.outputs.clone())
    }
}
