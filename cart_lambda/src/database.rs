use std::fmt;
use std::future::Future;

use lambda_http::tracing;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::ConnectOptions as _;

use crate::error::{BoxError, Error, Result};
use crate::secrets::Credentials;

/// Connection parameters, taken verbatim from a [`Credentials`] bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl From<&Credentials> for ConnectOptions {
    fn from(credentials: &Credentials) -> Self {
        Self {
            host: credentials.host.clone(),
            port: credentials.port,
            database: credentials.dbname.clone(),
            user: credentials.username.clone(),
            password: credentials.password.clone(),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens connections to the downstream database.
pub trait Connector: Send + Sync + 'static {
    type Connection: DbConnection;

    fn connect(
        &self,
        options: &ConnectOptions,
    ) -> impl Future<Output = std::result::Result<Self::Connection, BoxError>> + Send;
}

/// An open connection.
pub trait DbConnection: Send {
    /// Runs a trivial liveness query.
    fn ping(&mut self) -> impl Future<Output = std::result::Result<(), BoxError>> + Send;

    /// Releases the connection.
    fn close(self) -> impl Future<Output = std::result::Result<(), BoxError>> + Send;
}

/// Postgres over `sqlx`, TLS preferred.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> std::result::Result<PgConnection, BoxError> {
        let connection = PgConnectOptions::new()
            .host(&options.host)
            .port(options.port)
            .database(&options.database)
            .username(&options.user)
            .password(&options.password)
            .connect()
            .await?;
        Ok(connection)
    }
}

impl DbConnection for PgConnection {
    async fn ping(&mut self) -> std::result::Result<(), BoxError> {
        sqlx::Connection::ping(self).await?;
        Ok(())
    }

    async fn close(self) -> std::result::Result<(), BoxError> {
        sqlx::Connection::close(self).await?;
        Ok(())
    }
}

fn connection_error(options: &ConnectOptions, source: BoxError) -> Error {
    Error::Connection {
        host: options.host.clone(),
        port: options.port,
        source,
    }
}

/// Opens a connection with `options`.
pub(crate) async fn open_connection<C: Connector>(
    connector: &C,
    options: &ConnectOptions,
) -> Result<C::Connection> {
    tracing::debug!(
        host = %options.host,
        port = options.port,
        database = %options.database,
        "opening database connection"
    );
    connector
        .connect(options)
        .await
        .map_err(|source| connection_error(options, source))
}

/// Opens a connection, runs the liveness query and releases the connection,
/// whether or not the query succeeded.
pub(crate) async fn check_connection<C: Connector>(
    connector: &C,
    options: &ConnectOptions,
) -> Result<()> {
    let mut connection = open_connection(connector, options).await?;
    let outcome = connection
        .ping()
        .await
        .map_err(|source| connection_error(options, source));

    if let Err(err) = connection.close().await {
        tracing::warn!(host = %options.host, error = %err, "failed to close database connection");
    }

    if let Err(err) = &outcome {
        tracing::error!(host = %options.host, port = options.port, error = %err, "database liveness check failed");
    }
    outcome
}
