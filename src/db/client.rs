use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use crate::db::connection::ConnectionDescriptor;
use crate::error::{AppError, AppResult};

/// Connect to PostgreSQL using a resolved descriptor.
///
/// The connection future is driven on a background task; dropping the
/// returned client closes the session.
///
/// # Errors
///
/// Returns a `ConnectionError` if TLS setup, TCP connect, the handshake or
/// authentication fails, or if the configured connect timeout elapses.
pub async fn connect(descriptor: &ConnectionDescriptor) -> AppResult<Client> {
    let config = descriptor.pg_config();
    let target = descriptor.redacted_url();
    debug!(endpoint = %target, tls = descriptor.tls.as_str(), "connecting");

    let connect_err = |err: tokio_postgres::Error| {
        AppError::connection(format!("Cannot connect to {}: {}", target, err))
    };

    let client = match descriptor.tls.connector()? {
        None => {
            let (client, connection) = config.connect(NoTls).await.map_err(connect_err)?;
            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    error!("database connection error: {}", err);
                }
            });
            client
        }
        Some(tls) => {
            let (client, connection) = config.connect(tls).await.map_err(connect_err)?;
            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    error!("database connection error: {}", err);
                }
            });
            client
        }
    };

    Ok(client)
}
