//! Child process spawning.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn spawn_impl(&self, program: &Path, args: &[String]) -> Result<i32> {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to spawn {:?}", program))?;

        debug!("{:?} exited with {}", program, status);
        Ok(status.code().unwrap_or(1))
    }
}
