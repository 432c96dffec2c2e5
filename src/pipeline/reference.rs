use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::model::CompiledModel;
use crate::config::IsolationStrategy;
use crate::db::{Batch, ConnectionDescriptor, ReferenceTarget, Session, SqlExecutor, quote_ident};
use crate::error::{AppError, AppResult};

/// Sessions that rebuild the reference target from scratch and load the model.
///
/// The reference is never reused: every plan starts with a cascading drop.
pub fn plan_reference(
    target: &ConnectionDescriptor,
    reference: &ReferenceTarget,
    model: &CompiledModel,
) -> Vec<Session> {
    let schema = quote_ident(&reference.endpoint.schema);
    let populate = Session::new(reference.endpoint.clone())
        .batch(Batch::plain(format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            schema
        )))
        .batch(Batch::plain(format!("CREATE SCHEMA {}", schema)))
        .batch(Batch::plain(format!("SET search_path TO {}", schema)))
        .batch(Batch::plain(model.script()));

    match reference.strategy {
        IsolationStrategy::Schema => vec![populate],
        IsolationStrategy::Database => {
            // DROP/CREATE DATABASE refuse to run inside a multi-statement batch.
            let database = quote_ident(&reference.name);
            let maintenance = Session::new(target.clone())
                .batch(Batch::plain(format!(
                    "DROP DATABASE IF EXISTS {}",
                    database
                )))
                .batch(Batch::plain(format!("CREATE DATABASE {}", database)));
            vec![maintenance, populate]
        }
    }
}

/// Rebuild the reference target and populate it with the compiled model.
///
/// A failure part way leaves the reference half built; the next run drops it anyway.
pub async fn build_reference(
    executor: &dyn SqlExecutor,
    target: &ConnectionDescriptor,
    reference: &ReferenceTarget,
    model: &CompiledModel,
    dump_to: Option<&Path>,
) -> AppResult<()> {
    let sessions = plan_reference(target, reference, model);

    if let Some(path) = dump_to {
        write_script(path, &sessions)?;
        debug!(file = %path.display(), "reference script written");
    }

    for session in &sessions {
        executor.run(session).await?;
    }

    info!(
        strategy = reference.strategy.as_str(),
        reference = %reference.name,
        statements = model.statements.len(),
        "reference updated"
    );
    Ok(())
}

fn write_script(path: &Path, sessions: &[Session]) -> AppResult<()> {
    let write_err = |err: std::io::Error| {
        AppError::config(format!(
            "Failed to write reference script {}: {}",
            path.display(),
            err
        ))
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let script = sessions
        .iter()
        .map(|session| {
            format!(
                "-- database: {}\n{}\n",
                session.endpoint.database,
                session.script()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, script).map_err(write_err)
}
