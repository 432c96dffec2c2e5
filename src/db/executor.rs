use async_trait::async_trait;
use tracing::{debug, warn};

use crate::db::client;
use crate::db::connection::ConnectionDescriptor;
use crate::error::{AppError, AppResult};

/// One simple-query round trip. Multiple statements are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub sql: String,
    /// Run inside `BEGIN`/`COMMIT`, rolled back on failure.
    pub transactional: bool,
}

impl Batch {
    pub fn plain(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            transactional: false,
        }
    }

    pub fn transactional(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            transactional: true,
        }
    }
}

/// Ordered batches issued on a single connection that is closed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub endpoint: ConnectionDescriptor,
    pub batches: Vec<Batch>,
}

impl Session {
    pub fn new(endpoint: ConnectionDescriptor) -> Self {
        Self {
            endpoint,
            batches: Vec::new(),
        }
    }

    pub fn batch(mut self, batch: Batch) -> Self {
        self.batches.push(batch);
        self
    }

    /// Every batch joined in issue order, for dumps and dry runs.
    pub fn script(&self) -> String {
        self.batches
            .iter()
            .map(|batch| batch.sql.trim_end().trim_end_matches(';').to_string())
            .filter(|sql| !sql.trim().is_empty())
            .map(|sql| format!("{};", sql))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Executes SQL sessions. The PostgreSQL implementation is [`PgExecutor`].
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run every batch of the session in order, stopping at the first failure.
    ///
    /// Connection problems surface as `ConnectionError`, rejected SQL as
    /// `ApplicationError`.
    async fn run(&self, session: &Session) -> AppResult<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PgExecutor;

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn run(&self, session: &Session) -> AppResult<()> {
        let mut client = client::connect(&session.endpoint).await?;

        for (idx, batch) in session.batches.iter().enumerate() {
            debug!(
                index = idx + 1,
                transactional = batch.transactional,
                database = %session.endpoint.database,
                "executing batch:\n{}",
                batch.sql
            );

            if !batch.transactional {
                client
                    .batch_execute(&batch.sql)
                    .await
                    .map_err(|err| statement_error(&err))?;
                continue;
            }

            let tx = client
                .transaction()
                .await
                .map_err(|err| statement_error(&err))?;
            if let Err(err) = tx.batch_execute(&batch.sql).await {
                let failure = statement_error(&err);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("rollback failed: {}", rollback_err);
                }
                return Err(failure);
            }
            tx.commit().await.map_err(|err| statement_error(&err))?;
        }

        Ok(())
    }
}

/// Prefer the server's message (with detail) over the driver's generic "db error".
fn statement_error(err: &tokio_postgres::Error) -> AppError {
    match err.as_db_error() {
        Some(db) => {
            let mut message = format!("{}: {}", db.severity(), db.message());
            if let Some(detail) = db.detail() {
                message.push_str(&format!(" ({})", detail));
            }
            AppError::application(message)
        }
        None if err.is_closed() => AppError::connection(err.to_string()),
        None => AppError::application(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tls::TlsPolicy;

    fn endpoint() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            database: "app".to_string(),
            schema: "public".to_string(),
            tls: TlsPolicy::Disabled,
            ssl_cert: None,
            connect_timeout_ms: 1000,
        }
    }

    #[test]
    fn script_joins_batches_and_skips_empty() {
        let session = Session::new(endpoint())
            .batch(Batch::plain("SET search_path TO \"public\""))
            .batch(Batch::transactional(""))
            .batch(Batch::transactional("CREATE TABLE t (id int);"));
        assert_eq!(
            session.script(),
            "SET search_path TO \"public\";\nCREATE TABLE t (id int);"
        );
    }

    #[test]
    fn batch_constructors_set_mode() {
        assert!(Batch::transactional("x").transactional);
        assert!(!Batch::plain("x").transactional);
    }
}
