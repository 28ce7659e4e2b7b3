//! Captured subprocess execution for samplers that shell out to vendor tools.
//!
//! Children are spawned with `kill_on_drop`, so a sampler future cancelled by
//! the hub's timeout does not leave the tool running.

use std::io;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Builder for running external commands and capturing their output.
pub struct SubprocessBuilder {
    program: String,
    args: Vec<String>,
}

impl SubprocessBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion and collect stdout/stderr.
    /// A missing binary surfaces as `io::ErrorKind::NotFound`.
    pub async fn output(&self) -> io::Result<Output> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
    }
}
