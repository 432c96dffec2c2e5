pub mod client;
pub mod connection;
pub mod executor;
pub mod tls;

pub use connection::{
    ConnectionDescriptor, ReferenceTarget, quote_ident, quote_literal, resolve_reference,
    resolve_target,
};
pub use executor::{Batch, PgExecutor, Session, SqlExecutor};
pub use tls::TlsPolicy;
