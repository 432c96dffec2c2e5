//! Row-level data reconciliation after the schema has been migrated.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use super::model::CompiledModel;
use crate::db::{Batch, ConnectionDescriptor, Session, SqlExecutor, quote_ident, quote_literal};
use crate::error::{AppError, AppResult, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMode {
    /// Replace all rows of every loaded table.
    FullLoad,
    /// Insert rows that are not present yet.
    DeltaLoad,
}

impl MigrationMode {
    pub fn from_delta_flag(delta: bool) -> Self {
        if delta {
            MigrationMode::DeltaLoad
        } else {
            MigrationMode::FullLoad
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationMode::FullLoad => "full-load",
            MigrationMode::DeltaLoad => "delta-load",
        }
    }
}

#[async_trait]
pub trait DataReconciler: Send + Sync {
    async fn reconcile(
        &self,
        model: &CompiledModel,
        mode: MigrationMode,
        target: &ConnectionDescriptor,
    ) -> AppResult<()>;
}

/// Used when the service declares no data directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReconciler;

#[async_trait]
impl DataReconciler for NoopReconciler {
    async fn reconcile(
        &self,
        _model: &CompiledModel,
        mode: MigrationMode,
        _target: &ConnectionDescriptor,
    ) -> AppResult<()> {
        debug!(mode = mode.as_str(), "no data directories configured");
        Ok(())
    }
}

/// Loads `<namespace>-<Entity>.csv` files into `<namespace>_<entity>` tables.
///
/// Only tables the model creates are loaded. Every table is written in a
/// single transaction.
pub struct CsvDataLoader {
    data_paths: Vec<PathBuf>,
    executor: Arc<dyn SqlExecutor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableData {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl CsvDataLoader {
    pub fn new(data_paths: Vec<PathBuf>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            data_paths,
            executor,
        }
    }

    fn collect(&self, model: &CompiledModel) -> AppResult<Vec<TableData>> {
        let known = model_tables(model);
        let mut tables = Vec::new();

        for dir in &self.data_paths {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "data directory not found, skipping");
                continue;
            }
            let mut files: Vec<PathBuf> = fs::read_dir(dir)
                .map_err(|err| {
                    AppError::reconciliation(format!("Failed to list {}: {}", dir.display(), err))
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
                })
                .collect();
            files.sort();

            for file in files {
                let Some(table) = table_for_file(&file) else {
                    continue;
                };
                if !known.contains(&table) {
                    warn!(file = %file.display(), table = %table, "no such table in model, skipping");
                    continue;
                }
                tables.push(read_csv(&file, table)?);
            }
        }

        Ok(tables)
    }
}

#[async_trait]
impl DataReconciler for CsvDataLoader {
    async fn reconcile(
        &self,
        model: &CompiledModel,
        mode: MigrationMode,
        target: &ConnectionDescriptor,
    ) -> AppResult<()> {
        let tables = self.collect(model)?;
        if tables.is_empty() {
            debug!(mode = mode.as_str(), "no data files to load");
            return Ok(());
        }

        let script = load_script(&tables, mode);
        let session = Session::new(target.clone())
            .batch(Batch::plain(format!(
                "SET search_path TO {}",
                quote_ident(&target.schema)
            )))
            .batch(Batch::transactional(script));
        self.executor
            .run(&session)
            .await
            .map_err(|err| err.in_stage(ErrorKind::Reconciliation))?;

        info!(
            mode = mode.as_str(),
            tables = tables.len(),
            rows = tables.iter().map(|t| t.rows.len()).sum::<usize>(),
            "data loaded"
        );
        Ok(())
    }
}

fn create_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([\w."]+)"#)
            .expect("valid regex")
    })
}

/// Lowercased, unqualified names of the tables the model creates.
fn model_tables(model: &CompiledModel) -> HashSet<String> {
    model
        .statements
        .iter()
        .filter_map(|stmt| create_table_re().captures(stmt))
        .filter_map(|caps| caps.get(1))
        .filter_map(|name| name.as_str().rsplit('.').next().map(str::to_string))
        .map(|name| name.trim_matches('"').to_lowercase())
        .collect()
}

fn table_for_file(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace(['-', '.'], "_").to_lowercase())
}

fn read_csv(path: &Path, table: String) -> AppResult<TableData> {
    let content = fs::read_to_string(path).map_err(|err| {
        AppError::reconciliation(format!("Failed to read {}: {}", path.display(), err))
    })?;
    let header = content.lines().next().unwrap_or_default();
    let delimiter = if header.contains(';') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let csv_err = |err: csv::Error| {
        AppError::reconciliation(format!("Invalid CSV in {}: {}", path.display(), err))
    };

    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    if columns.is_empty() {
        return Err(AppError::reconciliation(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(
            record
                .iter()
                .map(|value| (!value.is_empty()).then(|| value.to_string()))
                .collect(),
        );
    }

    Ok(TableData {
        table,
        columns,
        rows,
    })
}

fn load_script(tables: &[TableData], mode: MigrationMode) -> String {
    let mut script = Vec::new();
    for data in tables {
        let table = quote_ident(&data.table);
        if mode == MigrationMode::FullLoad {
            script.push(format!("DELETE FROM {};", table));
        }
        if data.rows.is_empty() {
            continue;
        }
        let columns = data
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let values = data
            .rows
            .iter()
            .map(|row| {
                let literals = row
                    .iter()
                    .map(|value| value.as_deref().map_or("NULL".to_string(), quote_literal))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", literals)
            })
            .collect::<Vec<_>>()
            .join(",\n  ");
        let conflict = match mode {
            MigrationMode::FullLoad => "",
            MigrationMode::DeltaLoad => "\nON CONFLICT DO NOTHING",
        };
        script.push(format!(
            "INSERT INTO {} ({}) VALUES\n  {}{};",
            table, columns, values, conflict
        ));
    }
    script.join("\n")
}
