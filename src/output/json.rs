use serde_json::json;

use crate::config::ResolvedConfig;
use crate::pipeline::{DiffReport, RunReport};

pub fn emit_json_value(value: &serde_json::Value, pretty: bool) -> anyhow::Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

pub fn error_json(message: &str, kind: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "kind": kind,
        }
    })
}

pub fn config_to_json(resolved: &ResolvedConfig) -> serde_json::Value {
    let migrations = &resolved.migrations;
    json!({
        "configPath": resolved.config_path.as_ref().map(|p| p.display().to_string()),
        "serviceName": resolved.service_name,
        "service": {
            "dialect": resolved.service.dialect,
            "model": resolved.service.model.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "compilerCommand": resolved.service.compiler_command,
            "dataPaths": resolved.service.data_paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        },
        "connection": {
            "host": resolved.connection.host,
            "port": resolved.connection.port,
            "database": resolved.connection.database,
            "user": resolved.connection.user,
            "password": resolved.connection.password,
            "sslMode": resolved.connection.ssl_mode,
            "sslRootCert": resolved.connection.ssl_root_cert.as_ref().map(|p| p.display().to_string()),
            "sslCert": resolved.connection.ssl_cert.as_ref().map(|p| p.display().to_string()),
            "timeoutMs": resolved.connection.timeout_ms,
        },
        "migrations": {
            "isolation": migrations.isolation.as_str(),
            "targetSchema": migrations.target_schema,
            "targetDatabase": migrations.target_database,
            "referenceSchema": migrations.reference_schema,
            "referenceDatabase": migrations.reference_database,
            "cloneSchema": migrations.clone_schema,
            "multitenant": migrations.multitenant,
            "tenants": migrations.tenants,
            "changelogDir": migrations.changelog_dir.display().to_string(),
            "tmpFile": migrations.tmp_file.as_ref().map(|p| p.display().to_string()),
            "undeployFile": migrations.undeploy_file.as_ref().map(|p| p.display().to_string()),
        },
        "settings": {
            "output": {
                "defaultFormat": resolved.settings.output.default_format.as_str(),
                "json": {
                    "pretty": resolved.settings.output.json_pretty,
                },
            }
        }
    })
}

pub fn run_report_to_json(report: &RunReport) -> serde_json::Value {
    json!({
        "target": {
            "database": report.target.database,
            "schema": report.target.schema,
            "tls": report.target.tls.as_str(),
        },
        "reference": {
            "strategy": report.reference.strategy.as_str(),
            "name": report.reference.name,
        },
        "changed": !report.diff.is_empty(),
        "diff": report.diff,
        "changelog": report.changelog.as_ref().map(|p| p.display().to_string()),
        "mode": report.mode.as_str(),
        "stages": report.states.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
    })
}

pub fn diff_report_to_json(report: &DiffReport) -> serde_json::Value {
    json!({
        "target": {
            "database": report.target.database,
            "schema": report.target.schema,
        },
        "reference": {
            "strategy": report.reference.strategy.as_str(),
            "name": report.reference.name,
        },
        "changed": !report.diff.is_empty(),
        "diff": report.diff,
    })
}
