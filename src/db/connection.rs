use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::config::{ConnectionSettings, IsolationStrategy, MigrationSettings};
use crate::db::tls::TlsPolicy;
use crate::error::{AppError, AppResult};

const APPLICATION_NAME: &str = "pg-migra";
const REFERENCE_SUFFIX: &str = "_ref";

/// One fully resolved PostgreSQL endpoint: server, credentials, database and
/// the schema every session on it must resolve unqualified names against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub schema: String,
    pub tls: TlsPolicy,
    pub ssl_cert: Option<PathBuf>,
    pub connect_timeout_ms: u64,
}

impl ConnectionDescriptor {
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    pub fn with_schema(&self, schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..self.clone()
        }
    }

    /// `postgresql://` URL with the schema encoded as a `search_path` option.
    pub fn to_url(&self) -> AppResult<String> {
        self.build_url(true)
    }

    /// Same as [`to_url`](Self::to_url) with the password masked, for logs and output.
    pub fn redacted_url(&self) -> String {
        self.build_url(false)
            .unwrap_or_else(|_| format!("postgresql://{}/{}", self.host, self.database))
    }

    fn build_url(&self, with_password: bool) -> AppResult<String> {
        let invalid = |what: &str| {
            AppError::config(format!(
                "Cannot encode {} into a connection URL for host '{}'",
                what, self.host
            ))
        };

        let mut url = Url::parse("postgresql://localhost").map_err(|_| invalid("base URL"))?;
        url.set_host(Some(&self.host)).map_err(|_| invalid("host"))?;
        url.set_port(Some(self.port)).map_err(|_| invalid("port"))?;
        url.set_username(&self.user).map_err(|_| invalid("user"))?;
        match (&self.password, with_password) {
            (Some(password), true) => url
                .set_password(Some(password))
                .map_err(|_| invalid("password"))?,
            (Some(_), false) => url
                .set_password(Some("***"))
                .map_err(|_| invalid("password"))?,
            (None, _) => {}
        }
        url.set_path(&format!("/{}", self.database));

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("options", &format!("-csearch_path={}", self.schema));
            query.append_pair("sslmode", self.tls.libpq_mode());
            if let TlsPolicy::VerifiedWithCa(ca) = &self.tls {
                query.append_pair("sslrootcert", &ca.display().to_string());
            }
            if let Some(cert) = &self.ssl_cert {
                query.append_pair("sslcert", &cert.display().to_string());
            }
            query.append_pair("application_name", APPLICATION_NAME);
        }

        Ok(url.to_string())
    }

    /// Driver configuration for an in-process session on this endpoint.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.database)
            .options(format!("-c search_path={}", quote_ident(&self.schema)))
            .application_name(APPLICATION_NAME)
            .ssl_mode(self.tls.ssl_mode());
        if let Some(password) = &self.password {
            config.password(password);
        }
        if self.connect_timeout_ms > 0 {
            config.connect_timeout(Duration::from_millis(self.connect_timeout_ms));
        }
        config
    }
}

/// The disposable schema or database the model is materialized into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTarget {
    pub strategy: IsolationStrategy,
    /// Name of the reference schema (schema strategy) or database (database strategy).
    pub name: String,
    pub endpoint: ConnectionDescriptor,
}

/// Build the target endpoint from layered credentials.
pub fn resolve_target(
    connection: &ConnectionSettings,
    migrations: &MigrationSettings,
) -> AppResult<ConnectionDescriptor> {
    let database = migrations
        .target_database
        .clone()
        .or_else(|| connection.database.clone());

    let mut missing = Vec::new();
    if connection.host.as_deref().is_none_or(str::is_empty) {
        missing.push("host");
    }
    if database.as_deref().is_none_or(str::is_empty) {
        missing.push("database");
    }
    if connection.user.as_deref().is_none_or(str::is_empty) {
        missing.push("user");
    }
    if !missing.is_empty() {
        return Err(AppError::config(format!(
            "Missing required credential field(s): {}",
            missing.join(", ")
        )));
    }

    let tls = TlsPolicy::resolve(
        connection.ssl_mode.as_deref(),
        connection.ssl_root_cert.as_deref(),
    )?;

    Ok(ConnectionDescriptor {
        host: connection.host.clone().unwrap_or_default(),
        port: connection.port,
        user: connection.user.clone().unwrap_or_default(),
        password: connection.password.clone(),
        database: database.unwrap_or_default(),
        schema: migrations.target_schema.clone(),
        tls,
        ssl_cert: connection.ssl_cert.clone(),
        connect_timeout_ms: connection.timeout_ms,
    })
}

/// Derive the reference endpoint from the target. The reference never shares
/// the target's identifier: same server and credentials, different schema or
/// database depending on the isolation strategy.
pub fn resolve_reference(
    target: &ConnectionDescriptor,
    migrations: &MigrationSettings,
) -> AppResult<ReferenceTarget> {
    let strategy = migrations.isolation;
    let (name, endpoint) = match strategy {
        IsolationStrategy::Schema => {
            let name = migrations
                .reference_schema
                .clone()
                .unwrap_or_else(|| format!("{}{}", target.schema, REFERENCE_SUFFIX));
            if name == target.schema {
                return Err(AppError::config(format!(
                    "Reference schema '{}' must differ from the target schema",
                    name
                )));
            }
            (name.clone(), target.with_schema(name))
        }
        IsolationStrategy::Database => {
            let name = migrations
                .reference_database
                .clone()
                .unwrap_or_else(|| format!("{}{}", target.database, REFERENCE_SUFFIX));
            if name == target.database {
                return Err(AppError::config(format!(
                    "Reference database '{}' must differ from the target database",
                    name
                )));
            }
            (name.clone(), target.with_database(name))
        }
    };

    if name.trim().is_empty() {
        return Err(AppError::config("Reference name must not be empty"));
    }

    Ok(ReferenceTarget {
        strategy,
        name,
        endpoint,
    })
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal for PostgreSQL.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            host: Some("db".to_string()),
            database: Some("app".to_string()),
            user: Some("svc".to_string()),
            password: Some("p@ss word".to_string()),
            ..ConnectionSettings::default()
        }
    }

    fn migrations(strategy: IsolationStrategy) -> MigrationSettings {
        MigrationSettings {
            isolation: strategy,
            reference_schema: Some("_ref".to_string()),
            reference_database: Some("_ref".to_string()),
            ..MigrationSettings::default()
        }
    }

    #[test]
    fn resolves_target_descriptor() {
        let target = resolve_target(&settings(), &migrations(IsolationStrategy::Schema)).unwrap();
        assert_eq!(target.host, "db");
        assert_eq!(target.port, 5432);
        assert_eq!(target.database, "app");
        assert_eq!(target.schema, "public");
        assert_eq!(target.tls, TlsPolicy::Insecure);
    }

    #[test]
    fn migrations_database_overrides_credentials() {
        let mut m = migrations(IsolationStrategy::Database);
        m.target_database = Some("sales".to_string());
        let target = resolve_target(&settings(), &m).unwrap();
        assert_eq!(target.database, "sales");
    }

    #[test]
    fn missing_credentials_are_reported_together() {
        let err = resolve_target(
            &ConnectionSettings::default(),
            &MigrationSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.message.contains("host"));
        assert!(err.message.contains("database"));
        assert!(err.message.contains("user"));
    }

    #[test]
    fn reference_schema_never_targets_live_schema() {
        let target = resolve_target(&settings(), &migrations(IsolationStrategy::Schema)).unwrap();
        let reference = resolve_reference(&target, &migrations(IsolationStrategy::Schema)).unwrap();
        assert_eq!(reference.name, "_ref");
        assert_eq!(reference.endpoint.schema, "_ref");
        assert_eq!(reference.endpoint.database, "app");

        let sales = target.with_schema("sales");
        let reference = resolve_reference(&sales, &migrations(IsolationStrategy::Schema)).unwrap();
        assert_eq!(reference.endpoint.schema, "_ref");
    }

    #[test]
    fn reference_database_keeps_target_schema() {
        let target = resolve_target(&settings(), &migrations(IsolationStrategy::Database)).unwrap();
        let reference =
            resolve_reference(&target, &migrations(IsolationStrategy::Database)).unwrap();
        assert_eq!(reference.endpoint.database, "_ref");
        assert_eq!(reference.endpoint.schema, "public");
    }

    #[test]
    fn reference_defaults_to_suffix() {
        let target = resolve_target(&settings(), &MigrationSettings::default()).unwrap();
        let reference = resolve_reference(&target, &MigrationSettings::default()).unwrap();
        assert_eq!(reference.strategy, IsolationStrategy::Database);
        assert_eq!(reference.name, "app_ref");

        let schema_only = MigrationSettings {
            isolation: IsolationStrategy::Schema,
            ..MigrationSettings::default()
        };
        let reference = resolve_reference(&target, &schema_only).unwrap();
        assert_eq!(reference.name, "public_ref");
    }

    #[test]
    fn reference_equal_to_target_is_rejected() {
        let target = resolve_target(&settings(), &MigrationSettings::default()).unwrap();
        let m = MigrationSettings {
            isolation: IsolationStrategy::Schema,
            reference_schema: Some("public".to_string()),
            ..MigrationSettings::default()
        };
        let err = resolve_reference(&target, &m).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn url_encodes_search_path_and_credentials() {
        let target = resolve_target(&settings(), &migrations(IsolationStrategy::Schema)).unwrap();
        let url = target.with_schema("_ref").to_url().unwrap();
        assert!(url.starts_with("postgresql://svc:p%40ss%20word@db:5432/app?"));
        assert!(url.contains("options=-csearch_path%3D_ref"));
        assert!(url.contains("sslmode=prefer"));
    }

    #[test]
    fn ca_certificate_requests_full_verification_from_migra() {
        let with_ca = ConnectionSettings {
            ssl_root_cert: Some(PathBuf::from("/etc/ssl/db-ca.pem")),
            ..settings()
        };
        let target = resolve_target(&with_ca, &migrations(IsolationStrategy::Database)).unwrap();
        let url = target.to_url().unwrap();
        assert!(url.contains("sslmode=verify-full"), "url: {}", url);
        assert!(url.contains("sslrootcert=%2Fetc%2Fssl%2Fdb-ca.pem"), "url: {}", url);
    }

    #[test]
    fn redacted_url_hides_password() {
        let target = resolve_target(&settings(), &migrations(IsolationStrategy::Schema)).unwrap();
        let url = target.redacted_url();
        assert!(!url.contains("p%40ss"));
        assert!(url.contains("***"));
    }

    #[test]
    fn quotes_identifiers_and_literals() {
        assert_eq!(quote_ident("my\"schema"), "\"my\"\"schema\"");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
