//! TLS policy for PostgreSQL sessions.
//!
//! With a CA certificate configured the server certificate is validated
//! against it. Without one, TLS is attempted but not validated so that
//! self-signed deployments keep working; this is never upgraded silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::pem::PemObject;
use tokio_postgres::config::SslMode;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Plain TCP.
    Disabled,
    /// TLS when the server offers it, certificate not validated.
    Insecure,
    /// TLS required and validated against the given CA bundle.
    VerifiedWithCa(PathBuf),
}

impl TlsPolicy {
    /// Derive the policy from an optional `sslmode` and an optional CA path.
    pub fn resolve(ssl_mode: Option<&str>, root_cert: Option<&Path>) -> AppResult<Self> {
        let mode = ssl_mode.map(|m| m.trim().to_lowercase()).unwrap_or_default();
        match (mode.as_str(), root_cert) {
            ("disable", _) => Ok(TlsPolicy::Disabled),
            ("" | "allow" | "prefer" | "require" | "verify-ca" | "verify-full", Some(ca)) => {
                Ok(TlsPolicy::VerifiedWithCa(ca.to_path_buf()))
            }
            ("" | "allow" | "prefer" | "require", None) => Ok(TlsPolicy::Insecure),
            ("verify-ca" | "verify-full", None) => Err(AppError::config(format!(
                "sslmode={} requires sslrootcert to be configured",
                mode
            ))),
            (other, _) => Err(AppError::config(format!(
                "Invalid sslmode '{}'. Valid values: disable, allow, prefer, require, verify-ca, verify-full",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsPolicy::Disabled => "none",
            TlsPolicy::Insecure => "insecure",
            TlsPolicy::VerifiedWithCa(_) => "verified-with-ca",
        }
    }

    /// libpq `sslmode` equivalent, used when handing URLs to external tools.
    /// The CA case matches the in-process connector, which checks host names.
    pub fn libpq_mode(&self) -> &'static str {
        match self {
            TlsPolicy::Disabled => "disable",
            TlsPolicy::Insecure => "prefer",
            TlsPolicy::VerifiedWithCa(_) => "verify-full",
        }
    }

    pub fn ssl_mode(&self) -> SslMode {
        match self {
            TlsPolicy::Disabled => SslMode::Disable,
            TlsPolicy::Insecure => SslMode::Prefer,
            TlsPolicy::VerifiedWithCa(_) => SslMode::Require,
        }
    }

    /// Build the rustls connector, or `None` for plain connections.
    pub fn connector(&self) -> AppResult<Option<MakeRustlsConnect>> {
        let config = match self {
            TlsPolicy::Disabled => return Ok(None),
            TlsPolicy::Insecure => {
                warn!(
                    "TLS server certificate is not validated; configure sslrootcert to enable validation"
                );
                ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoVerifier))
                    .with_no_client_auth()
            }
            TlsPolicy::VerifiedWithCa(path) => {
                let roots = load_root_store(path)?;
                debug!(ca = %path.display(), "validating server certificate against CA");
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth()
            }
        };
        Ok(Some(MakeRustlsConnect::new(config)))
    }
}

fn load_root_store(path: &Path) -> AppResult<rustls::RootCertStore> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|err| {
            AppError::config(format!(
                "Failed to read sslrootcert {}: {}",
                path.display(),
                err
            ))
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            AppError::config(format!("Invalid PEM in sslrootcert {}: {}", path.display(), err))
        })?;

    if certs.is_empty() {
        return Err(AppError::config(format!(
            "sslrootcert {} contains no certificates",
            path.display()
        )));
    }

    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(AppError::config(format!(
            "sslrootcert {}: none of {} certificate(s) could be parsed",
            path.display(),
            ignored
        )));
    }
    Ok(store)
}

/// Accepts any server certificate. Only reachable through `TlsPolicy::Insecure`.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
