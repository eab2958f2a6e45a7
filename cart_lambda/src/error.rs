use thiserror::Error;

/// Boxed error used at the trait seams and at the Lambda boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A specialised Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between an invocation arriving and a response
/// leaving. Messages name the identifier or endpoint involved, never a
/// credential value.
#[derive(Debug, Error)]
pub enum Error {
    /// A required environment value is missing or unparseable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The secret store was unreachable, denied access, or has no such secret.
    #[error("failed to retrieve secret `{secret_id}`")]
    SecretRetrieval {
        secret_id: String,
        #[source]
        source: Box<aws_sdk_secretsmanager::Error>,
    },

    /// The secret payload is not a credential bundle.
    #[error("secret `{secret_id}` is malformed: {reason}")]
    MalformedSecret { secret_id: String, reason: String },

    /// The database is unreachable or rejected the credentials.
    #[error("database connection to {host}:{port} failed")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: BoxError,
    },

    /// The application could not be constructed.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// Translating between the Lambda event and the application failed.
    #[error("request adaptation failed: {0}")]
    Handler(String),
}
