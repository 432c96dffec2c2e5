//! Model compilation: declarative model paths in, PostgreSQL DDL out.
//!
//! Compilers produce statements in their own dialect; a [`DialectTranslator`]
//! owned by the database adapter rewrites each statement for PostgreSQL.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use tokio::process::Command;
use tracing::debug;

use super::statements::split_statements;
use crate::error::{AppError, AppResult};

const MODEL_PLACEHOLDER: &str = "{model}";

/// Compiled, translated DDL for one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledModel {
    pub sources: Vec<PathBuf>,
    pub statements: Vec<String>,
}

impl CompiledModel {
    /// All statements as one batch.
    pub fn script(&self) -> String {
        self.statements
            .iter()
            .map(|stmt| format!("{};", stmt))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
pub trait ModelCompiler: Send + Sync {
    /// Statements in the compiler's native dialect, in dependency order.
    async fn compile(&self, model: &[PathBuf]) -> AppResult<Vec<String>>;
}

pub trait DialectTranslator: Send + Sync {
    fn translate(&self, statement: &str) -> String;
}

/// Reads `.sql` files. Directories contribute their `*.sql` files sorted by name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlFileCompiler;

#[async_trait]
impl ModelCompiler for SqlFileCompiler {
    async fn compile(&self, model: &[PathBuf]) -> AppResult<Vec<String>> {
        let mut statements = Vec::new();
        for file in expand_sources(model)? {
            let content = fs::read_to_string(&file).map_err(|err| {
                AppError::compilation(format!("Failed to read {}: {}", file.display(), err))
            })?;
            debug!(file = %file.display(), "compiling model source");
            statements.extend(split_statements(&content));
        }
        Ok(statements)
    }
}

fn expand_sources(model: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in model {
        if path.is_dir() {
            let entries = fs::read_dir(path).map_err(|err| {
                AppError::compilation(format!("Failed to list {}: {}", path.display(), err))
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_sql_extension(p))
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(AppError::config(format!(
                "Model path not found: {}",
                path.display()
            )));
        }
    }
    Ok(files)
}

fn has_sql_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}

/// Runs an external compiler and splits its stdout into statements.
///
/// `{model}` in the arguments expands to every model path; without it the
/// paths are appended.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    pub command: Vec<String>,
}

impl CommandCompiler {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn arguments(&self, model: &[PathBuf]) -> Vec<String> {
        let paths: Vec<String> = model.iter().map(|p| p.display().to_string()).collect();
        let mut args = Vec::new();
        let mut substituted = false;
        for arg in self.command.iter().skip(1) {
            if arg == MODEL_PLACEHOLDER {
                args.extend(paths.iter().cloned());
                substituted = true;
            } else {
                args.push(arg.clone());
            }
        }
        if !substituted {
            args.extend(paths);
        }
        args
    }
}

#[async_trait]
impl ModelCompiler for CommandCompiler {
    async fn compile(&self, model: &[PathBuf]) -> AppResult<Vec<String>> {
        let program = self
            .command
            .first()
            .ok_or_else(|| AppError::config("compiler.command must not be empty"))?;
        let args = self.arguments(model);
        debug!(program = %program, ?args, "running model compiler");

        let output = Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|err| AppError::compilation(format!("Failed to run {}: {}", program, err)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::compilation(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(split_statements(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Statements already in PostgreSQL dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl DialectTranslator for Passthrough {
    fn translate(&self, statement: &str) -> String {
        statement.to_string()
    }
}

/// Rewrites the generic types emitted by CDS-style compilers into PostgreSQL types.
///
/// Quoted identifiers and string literals are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct CdsToPostgres;

impl DialectTranslator for CdsToPostgres {
    fn translate(&self, statement: &str) -> String {
        quoted_segments(statement)
            .into_iter()
            .map(|(segment, quoted)| {
                if quoted {
                    segment.to_string()
                } else {
                    rewrite_types(segment)
                }
            })
            .collect()
    }
}

fn rewrite_types(sql: &str) -> String {
    type_rules()
        .iter()
        .fold(sql.to_string(), |sql, (re, replacement)| {
            // A match with group 1 set is already valid PostgreSQL (`DOUBLE PRECISION`).
            re.replace_all(&sql, |caps: &Captures| match caps.get(1) {
                Some(_) => caps[0].to_string(),
                None => (*replacement).to_string(),
            })
            .into_owned()
        })
}

fn type_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r"(?i)\bNVARCHAR\b", "VARCHAR"),
            (r"(?i)\bN?CLOB\b", "TEXT"),
            (r"(?i)\b(?:BLOB|BINARY|LARGEBINARY)\b", "BYTEA"),
            (r"(?i)\bDOUBLE\b(\s+PRECISION\b)?", "NUMERIC(30, 15)"),
            (r"(?i)\bTIMESTAMP_TEXT\b", "TIMESTAMP"),
            (r"(?i)\bDATE_TEXT\b", "DATE"),
            (r"(?i)\bTIME_TEXT\b", "TIME"),
            (r"(?i)\bDATETIME\b", "TIMESTAMP"),
            (r"(?i)\bTINYINT\b", "SMALLINT"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid regex"), replacement))
        .collect()
    })
}

/// Split a statement into `(text, quoted)` runs. `'...'` and `"..."` runs,
/// doubled quotes included, are returned whole.
fn quoted_segments(sql: &str) -> Vec<(&str, bool)> {
    let bytes = sql.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let quote = bytes[i];
        if quote != b'\'' && quote != b'"' {
            i += 1;
            continue;
        }
        if start < i {
            segments.push((&sql[start..i], false));
        }
        let mut end = i + 1;
        while end < bytes.len() {
            if bytes[end] == quote {
                if bytes.get(end + 1) == Some(&quote) {
                    end += 2;
                    continue;
                }
                end += 1;
                break;
            }
            end += 1;
        }
        let end = end.min(bytes.len());
        segments.push((&sql[i..end], true));
        start = end;
        i = end;
    }

    if start < bytes.len() {
        segments.push((&sql[start..], false));
    }
    segments
}

/// The translator for a service's declared source dialect. Without a
/// dialect the model is taken to be PostgreSQL already.
pub fn translator_for(dialect: Option<&str>) -> Box<dyn DialectTranslator> {
    match dialect.map(|d| d.trim().to_lowercase()).as_deref() {
        None | Some("" | "postgres" | "postgresql" | "plain") => Box::new(Passthrough),
        _ => Box::new(CdsToPostgres),
    }
}

/// The compiler for a service: the configured command, or plain SQL files.
pub fn compiler_for(command: &[String]) -> Box<dyn ModelCompiler> {
    if command.is_empty() {
        Box::new(SqlFileCompiler)
    } else {
        Box::new(CommandCompiler::new(command.to_vec()))
    }
}

/// Compile and translate a model. An empty statement list is a compilation failure.
pub async fn compile_model(
    compiler: &dyn ModelCompiler,
    translator: &dyn DialectTranslator,
    model: &[PathBuf],
) -> AppResult<CompiledModel> {
    if model.is_empty() {
        return Err(AppError::config(
            "No model configured; set services.<name>.model in the config file",
        ));
    }

    let statements: Vec<String> = compiler
        .compile(model)
        .await?
        .iter()
        .map(|stmt| translator.translate(stmt))
        .collect();

    if statements.is_empty() {
        return Err(AppError::compilation(format!(
            "Model compiled to no statements: {}",
            model
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok(CompiledModel {
        sources: model.to_vec(),
        statements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn cds_types_become_postgres_types() {
        let sql = "CREATE TABLE b_Books (ID NVARCHAR(36), descr NCLOB, price DOUBLE, cover BLOB, at TIMESTAMP_TEXT, n TINYINT)";
        let translated = CdsToPostgres.translate(sql);
        assert_eq!(
            translated,
            "CREATE TABLE b_Books (ID VARCHAR(36), descr TEXT, price NUMERIC(30, 15), cover BYTEA, at TIMESTAMP, n SMALLINT)"
        );
    }

    #[test]
    fn translation_respects_word_boundaries() {
        let sql = "CREATE TABLE doubles (doubled INTEGER)";
        assert_eq!(CdsToPostgres.translate(sql), sql);
    }

    #[test]
    fn double_precision_is_kept() {
        let sql = "CREATE TABLE m (v double precision, w DOUBLE)";
        assert_eq!(
            CdsToPostgres.translate(sql),
            "CREATE TABLE m (v double precision, w NUMERIC(30, 15))"
        );
    }

    #[test]
    fn quoted_identifiers_and_literals_are_not_rewritten() {
        let sql = "CREATE TABLE m (\"datetime\" text DEFAULT 'DOUBLE', \"it\"\"s blob\" BLOB, blob_binary int)";
        assert_eq!(
            CdsToPostgres.translate(sql),
            "CREATE TABLE m (\"datetime\" text DEFAULT 'DOUBLE', \"it\"\"s blob\" BYTEA, blob_binary int)"
        );
    }

    #[test]
    fn missing_dialect_means_postgres() {
        let sql = "CREATE TABLE m (v double precision, \"datetime\" text)";
        assert_eq!(translator_for(None).translate(sql), sql);
        assert_eq!(translator_for(Some(" ")).translate(sql), sql);
        assert_eq!(
            translator_for(Some("cds")).translate("x DATETIME"),
            "x TIMESTAMP"
        );
    }

    #[test]
    fn postgres_dialect_is_untouched() {
        let translator = translator_for(Some("PostgreSQL"));
        assert_eq!(translator.translate("x DOUBLE"), "x DOUBLE");
    }

    #[test]
    fn command_arguments_expand_model_placeholder() {
        let compiler = CommandCompiler::new(vec![
            "cds".to_string(),
            "compile".to_string(),
            "{model}".to_string(),
            "--to".to_string(),
            "sql".to_string(),
        ]);
        let args = compiler.arguments(&[PathBuf::from("db"), PathBuf::from("srv")]);
        assert_eq!(args, vec!["compile", "db", "srv", "--to", "sql"]);

        let compiler = CommandCompiler::new(vec!["cat".to_string()]);
        assert_eq!(compiler.arguments(&[PathBuf::from("a.sql")]), vec!["a.sql"]);
    }

    #[tokio::test]
    async fn sql_files_compile_in_name_order() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("02_b.sql"), "CREATE TABLE b (id int);").expect("write");
        fs::write(dir.path().join("01_a.sql"), "CREATE TABLE a (id int);").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored;").expect("write");

        let compiled = compile_model(
            &SqlFileCompiler,
            &Passthrough,
            &[dir.path().to_path_buf()],
        )
        .await
        .expect("compile");
        assert_eq!(
            compiled.statements,
            vec!["CREATE TABLE a (id int)", "CREATE TABLE b (id int)"]
        );
        assert_eq!(
            compiled.script(),
            "CREATE TABLE a (id int);\nCREATE TABLE b (id int);"
        );
    }

    #[tokio::test]
    async fn empty_model_is_a_config_error() {
        let err = compile_model(&SqlFileCompiler, &Passthrough, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[tokio::test]
    async fn model_without_statements_fails_compilation() {
        let dir = TempDir::new().expect("temp dir");
        let file = dir.path().join("empty.sql");
        fs::write(&file, "-- nothing yet\n").expect("write");
        let err = compile_model(&SqlFileCompiler, &Passthrough, &[file])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compilation);
    }

    #[tokio::test]
    async fn missing_model_path_is_a_config_error() {
        let err = compile_model(
            &SqlFileCompiler,
            &Passthrough,
            &[PathBuf::from("/nonexistent/model.sql")],
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_compiler_command_is_a_compilation_error() {
        let compiler = CommandCompiler::new(vec!["false".to_string()]);
        let err = compiler.compile(&[PathBuf::from("db")]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compilation);
    }
}
