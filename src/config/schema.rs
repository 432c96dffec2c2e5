use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub default_service: Option<String>,
    pub settings: Option<Settings>,
    #[serde(default)]
    pub services: HashMap<String, Service>,
    #[serde(default)]
    pub migrations: HashMap<String, MigrationsBlock>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub output: Option<OutputSettings>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutputSettings {
    pub default_format: Option<OutputFormat>,
    pub json: Option<JsonSettings>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JsonSettings {
    pub pretty: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub kind: Option<String>,
    pub dialect: Option<String>,
    #[serde(default)]
    pub model: Vec<PathBuf>,
    pub compiler: Option<CompilerSettings>,
    pub data: Option<DataSettings>,
    #[serde(default)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompilerSettings {
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataSettings {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Credential block; accepts both the libpq-style and the long spellings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(alias = "hostname")]
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(alias = "dbname")]
    pub database: Option<String>,
    #[serde(alias = "username")]
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "sslcert")]
    pub ssl_cert: Option<PathBuf>,
    #[serde(alias = "sslrootcert")]
    pub ssl_root_cert: Option<PathBuf>,
    #[serde(alias = "sslmode")]
    pub ssl_mode: Option<String>,
    pub url: Option<String>,
    pub connect_timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MigrationsBlock {
    pub multitenant: Option<bool>,
    pub isolation: Option<IsolationStrategy>,
    pub schema: Option<SchemaNames>,
    pub database: Option<DatabaseNames>,
    pub deploy: Option<DeploySettings>,
    pub migrations: Option<ChangelogSettings>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNames {
    pub default: Option<String>,
    pub clone: Option<String>,
    pub reference: Option<String>,
    #[serde(default)]
    pub tenants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseNames {
    pub default: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeploySettings {
    pub tmp_file: Option<PathBuf>,
    pub undeploy_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogSettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationStrategy {
    /// Reference lives in its own schema of the target database.
    Schema,
    /// Reference lives in its own database on the target server.
    Database,
}

impl IsolationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationStrategy::Schema => "schema",
            IsolationStrategy::Database => "database",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pretty,
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pretty => "pretty",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_accept_aliases() {
        let yaml = "hostname: db\ndbname: app\nusername: svc\nsslrootcert: ca.pem\n";
        let creds: Credentials = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(creds.host.as_deref(), Some("db"));
        assert_eq!(creds.database.as_deref(), Some("app"));
        assert_eq!(creds.user.as_deref(), Some("svc"));
        assert_eq!(creds.ssl_root_cert, Some(PathBuf::from("ca.pem")));
    }

    #[test]
    fn migrations_block_parses_nested_names() {
        let yaml = r#"
multitenant: true
isolation: schema
schema:
  default: public
  clone: _clone
  reference: _ref
  tenants: [t1, t2]
deploy:
  tmpFile: tmp/ref.sql
  undeployFile: undeploy.json
migrations:
  path: changelogs
"#;
        let block: MigrationsBlock = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(block.isolation, Some(IsolationStrategy::Schema));
        let schema = block.schema.expect("schema");
        assert_eq!(schema.reference.as_deref(), Some("_ref"));
        assert_eq!(schema.tenants, vec!["t1", "t2"]);
        assert_eq!(
            block.deploy.and_then(|d| d.tmp_file),
            Some(PathBuf::from("tmp/ref.sql"))
        );
    }
}
