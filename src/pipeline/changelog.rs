use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::error::{AppError, AppResult, ErrorKind};

const CHANGELOG_SUFFIX: &str = "sql";

/// Writes each non-empty diff to `<root>/<database>/<unix-ms>.sql`.
#[derive(Debug, Clone)]
pub struct ChangelogWriter {
    root: PathBuf,
}

impl ChangelogWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist `diff` verbatim. Returns `None` without touching the disk when
    /// the diff is empty. Existing files are never overwritten.
    pub fn write(&self, database: &str, diff: &str) -> AppResult<Option<PathBuf>> {
        if diff.is_empty() {
            return Ok(None);
        }

        let dir = self.root.join(database_component(database)?);
        fs::create_dir_all(&dir).map_err(|err| {
            AppError::new(
                ErrorKind::Internal,
                format!("Failed to create changelog directory {}: {}", dir.display(), err),
            )
        })?;

        let mut stamp = chrono::Utc::now().timestamp_millis();
        loop {
            let path = dir.join(format!("{}.{}", stamp, CHANGELOG_SUFFIX));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let written = file.write_all(diff.as_bytes()).and_then(|_| file.sync_all());
                    drop(file);
                    discard_on_failure(&path, written)?;
                    info!(file = %path.display(), "changelog written");
                    return Ok(Some(path));
                }
                Err(err) if err.kind() == IoErrorKind::AlreadyExists => stamp += 1,
                Err(err) => return Err(write_error(&path, err)),
            }
        }
    }
}

/// The database name must stay a single directory below the root.
fn database_component(database: &str) -> AppResult<&str> {
    let mut components = Path::new(database).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || database.contains(['/', '\\']) {
        return Err(AppError::config(format!(
            "Database name '{}' cannot be used as a changelog directory",
            database
        )));
    }
    Ok(database)
}

/// A changelog is either complete or absent.
fn discard_on_failure(path: &Path, written: std::io::Result<()>) -> AppResult<()> {
    written.map_err(|err| {
        let _ = fs::remove_file(path);
        write_error(path, err)
    })
}

fn write_error(path: &Path, err: std::io::Error) -> AppError {
    AppError::new(
        ErrorKind::Internal,
        format!("Failed to write changelog {}: {}", path.display(), err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_diff_writes_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let writer = ChangelogWriter::new(dir.path().join("db_changelogs"));
        assert_eq!(writer.write("app", "").unwrap(), None);
        assert!(!dir.path().join("db_changelogs").exists());
    }

    #[test]
    fn diff_is_written_verbatim_under_database_dir() {
        let dir = TempDir::new().expect("temp dir");
        let writer = ChangelogWriter::new(dir.path());
        let diff = "create table \"public\".\"t\" (\"id\" integer);\n\n";
        let path = writer.write("app", diff).unwrap().expect("path");

        assert_eq!(path.parent().unwrap(), dir.path().join("app"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".sql"));
        assert!(name.trim_end_matches(".sql").parse::<i64>().is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), diff);
    }

    #[test]
    fn database_names_cannot_leave_the_root() {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path().join("db_changelogs");
        let writer = ChangelogWriter::new(&root);

        for name in ["", ".", "..", "../escape", "a/b", "/tmp/abs", "a\\b"] {
            let err = writer.write(name, "select 1;").unwrap_err();
            assert_eq!(err.kind, ErrorKind::Config, "name {:?}", name);
        }
        assert!(!root.exists());
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("1.sql");
        fs::write(&path, "create ta").unwrap();

        let err = discard_on_failure(&path, Err(std::io::Error::other("disk full"))).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.contains("disk full"));
        assert!(!path.exists());
    }

    #[test]
    fn same_millisecond_never_overwrites() {
        let dir = TempDir::new().expect("temp dir");
        let writer = ChangelogWriter::new(dir.path());
        let first = writer.write("app", "one;").unwrap().unwrap();
        let second = writer.write("app", "two;").unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(first).unwrap(), "one;");
        assert_eq!(fs::read_to_string(second).unwrap(), "two;");
    }
}
