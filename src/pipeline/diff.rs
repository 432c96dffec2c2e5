use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::db::ConnectionDescriptor;
use crate::error::{AppError, AppResult};

pub const DEFAULT_MIGRA_PROGRAM: &str = "migra";

/// Structural diff between two reachable schemas.
#[async_trait]
pub trait DiffEngine: Send + Sync {
    /// DDL that turns `from` into `to`. An empty string means no changes.
    ///
    /// With `unsafe_mode` the engine may emit destructive statements (drops,
    /// type narrowing) without confirmation.
    async fn compute_diff(
        &self,
        from: &ConnectionDescriptor,
        to: &ConnectionDescriptor,
        unsafe_mode: bool,
    ) -> AppResult<String>;

    /// Reject endpoint pairs the engine cannot compare. Called before the
    /// reference is rebuilt, so nothing has been dropped yet.
    fn check_endpoints(
        &self,
        _from: &ConnectionDescriptor,
        _to: &ConnectionDescriptor,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Shells out to `migra`.
///
/// Anything on stderr fails the diff; the exit status is ignored because
/// `migra` exits non-zero whenever a diff exists.
#[derive(Debug, Clone)]
pub struct MigraDiffEngine {
    pub program: String,
}

impl Default for MigraDiffEngine {
    fn default() -> Self {
        Self {
            program: DEFAULT_MIGRA_PROGRAM.to_string(),
        }
    }
}

impl MigraDiffEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn arguments(
        from: &ConnectionDescriptor,
        to: &ConnectionDescriptor,
        unsafe_mode: bool,
    ) -> AppResult<Vec<String>> {
        same_schema(from, to)?;

        let mut args = Vec::new();
        if unsafe_mode {
            args.push("--unsafe".to_string());
        }
        args.push("--schema".to_string());
        args.push(from.schema.clone());
        args.push(from.to_url().map_err(|err| AppError::diff(err.message))?);
        args.push(to.to_url().map_err(|err| AppError::diff(err.message))?);
        Ok(args)
    }
}

/// migra compares one schema name on both sides.
fn same_schema(from: &ConnectionDescriptor, to: &ConnectionDescriptor) -> AppResult<()> {
    if from.schema != to.schema {
        return Err(AppError::diff(format!(
            "migra cannot compare schema '{}' against differently named schema '{}'; use database isolation",
            from.schema, to.schema
        )));
    }
    Ok(())
}

#[async_trait]
impl DiffEngine for MigraDiffEngine {
    fn check_endpoints(
        &self,
        from: &ConnectionDescriptor,
        to: &ConnectionDescriptor,
    ) -> AppResult<()> {
        same_schema(from, to)
    }

    async fn compute_diff(
        &self,
        from: &ConnectionDescriptor,
        to: &ConnectionDescriptor,
        unsafe_mode: bool,
    ) -> AppResult<String> {
        let args = Self::arguments(from, to, unsafe_mode)?;
        debug!(
            program = %self.program,
            from = %from.redacted_url(),
            to = %to.redacted_url(),
            "computing diff"
        );

        let program = which::which(&self.program).map_err(|err| {
            AppError::diff(format!(
                "{} not found ({}); install migra or put it on the PATH",
                self.program, err
            ))
        })?;

        let output = Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|err| AppError::diff(format!("Failed to run {}: {}", self.program, err)))?;

        if !output.stderr.is_empty() {
            return Err(AppError::diff(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        debug!(status = %output.status, bytes = output.stdout.len(), "diff computed");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
