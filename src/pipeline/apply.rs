use tracing::info;

use crate::db::{Batch, ConnectionDescriptor, Session, SqlExecutor, quote_ident};
use crate::error::{AppResult, ErrorKind};

/// The session that applies `diff` to the target: explicit search path, then
/// the whole diff in one transaction. An empty diff still produces the
/// transactional batch so the round trip is verified.
pub fn plan_apply(target: &ConnectionDescriptor, diff: &str) -> Session {
    Session::new(target.clone())
        .batch(Batch::plain(format!(
            "SET search_path TO {}",
            quote_ident(&target.schema)
        )))
        .batch(Batch::transactional(diff))
}

pub async fn apply_diff(
    executor: &dyn SqlExecutor,
    target: &ConnectionDescriptor,
    diff: &str,
) -> AppResult<()> {
    executor
        .run(&plan_apply(target, diff))
        .await
        .map_err(|err| err.in_stage(ErrorKind::Application))?;
    info!(
        database = %target.database,
        schema = %target.schema,
        empty = diff.is_empty(),
        "target migrated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TlsPolicy;

    #[test]
    fn apply_sets_target_search_path_before_diff() {
        let target = ConnectionDescriptor {
            host: "db".to_string(),
            port: 5432,
            user: "svc".to_string(),
            password: None,
            database: "app".to_string(),
            schema: "sales".to_string(),
            tls: TlsPolicy::Disabled,
            ssl_cert: None,
            connect_timeout_ms: 1000,
        };
        let session = plan_apply(&target, "alter table t add column x int;");
        assert_eq!(session.endpoint.schema, "sales");
        assert_eq!(session.batches[0], Batch::plain("SET search_path TO \"sales\""));
        assert_eq!(
            session.batches[1],
            Batch::transactional("alter table t add column x int;")
        );

        let empty = plan_apply(&target, "");
        assert_eq!(empty.batches[1], Batch::transactional(""));
    }
}
