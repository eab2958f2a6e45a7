use std::fmt;

use aws_sdk_secretsmanager::Client as SecretsClient;
use lambda_http::tracing;
use serde::Deserialize;
use serde_json::error::Category;

use crate::error::{Error, Result};

/// Database credential bundle as stored by RDS in Secrets Manager.
///
/// Other fields of the secret (`engine`, `dbInstanceIdentifier`, ...) are
/// ignored.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Describes a parse failure by position only: serde's own message quotes the
/// offending value, which may be the password.
fn parse_failure(err: &serde_json::Error) -> String {
    let kind = match err.classify() {
        Category::Syntax => "invalid JSON",
        Category::Eof => "truncated JSON",
        Category::Data => "unexpected credential shape",
        Category::Io => "unreadable payload",
    };
    format!("{kind} at line {} column {}", err.line(), err.column())
}

/// Looks up `secret_id` in Secrets Manager and parses it as [`Credentials`].
///
/// The store is not called when no identifier is configured.
pub(crate) async fn resolve_credentials(
    client: &SecretsClient,
    secret_id: Option<&str>,
) -> Result<Credentials> {
    let secret_id = secret_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            Error::Configuration("SECRET_ARN or SECRET_NAME must name the database secret".into())
        })?;

    tracing::info!(secret_id, "resolving database credentials");
    let output = client
        .get_secret_value()
        .secret_id(secret_id)
        .send()
        .await
        .map_err(|err| {
            let source = Box::new(aws_sdk_secretsmanager::Error::from(err));
            tracing::error!(secret_id, error = %source, "secret lookup failed");
            Error::SecretRetrieval {
                secret_id: secret_id.to_string(),
                source,
            }
        })?;

    let payload = output.secret_string().ok_or_else(|| Error::MalformedSecret {
        secret_id: secret_id.to_string(),
        reason: "secret has no string value".into(),
    })?;

    let credentials: Credentials =
        serde_json::from_str(payload).map_err(|err| Error::MalformedSecret {
            secret_id: secret_id.to_string(),
            reason: parse_failure(&err),
        })?;

    tracing::info!(
        secret_id,
        host = %credentials.host,
        port = credentials.port,
        "database credentials resolved"
    );
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_secretsmanager::operation::get_secret_value::{
        GetSecretValueError, GetSecretValueOutput,
    };
    use aws_sdk_secretsmanager::types::error::ResourceNotFoundException;
    use aws_smithy_mocks::{mock, mock_client};

    const PROD_SECRET: &str = r#"{"host":"db.example","port":5432,"dbname":"mydb","username":"u","password":"p"}"#;

    #[tokio::test]
    async fn test_resolves_credentials() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value)
            .match_requests(|req| req.secret_id() == Some("db/prod"))
            .then_output(|| {
                GetSecretValueOutput::builder()
                    .name("db/prod")
                    .secret_string(PROD_SECRET)
                    .build()
            });
        let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

        let credentials = resolve_credentials(&client, Some("db/prod")).await.unwrap();

        assert_eq!(rule.num_calls(), 1);
        assert_eq!(
            credentials,
            Credentials {
                host: "db.example".into(),
                port: 5432,
                dbname: "mydb".into(),
                username: "u".into(),
                password: "p".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_ignores_extra_rds_fields() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value).then_output(|| {
            GetSecretValueOutput::builder()
                .secret_string(
                    r#"{"engine":"postgres","dbInstanceIdentifier":"cart","host":"h","port":5432,"dbname":"mydb","username":"postgres","password":"pw"}"#,
                )
                .build()
        });
        let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

        let credentials = resolve_credentials(&client, Some("db/prod")).await.unwrap();
        assert_eq!(credentials.username, "postgres");
    }

    #[tokio::test]
    async fn test_missing_identifier_never_calls_store() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value)
            .then_output(|| GetSecretValueOutput::builder().secret_string(PROD_SECRET).build());
        let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

        let err = resolve_credentials(&client, None).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = resolve_credentials(&client, Some("  ")).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        assert_eq!(rule.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_a_retrieval_error() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value).then_error(|| {
            GetSecretValueError::ResourceNotFoundException(
                ResourceNotFoundException::builder()
                    .message("Secrets Manager can't find the specified secret.")
                    .build(),
            )
        });
        let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

        let err = resolve_credentials(&client, Some("db/missing")).await.unwrap_err();
        match err {
            Error::SecretRetrieval { secret_id, .. } => assert_eq!(secret_id, "db/missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_payload_is_malformed() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value)
            .then_output(|| GetSecretValueOutput::builder().secret_string("hunter2").build());
        let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

        let err = resolve_credentials(&client, Some("db/prod")).await.unwrap_err();
        assert!(matches!(err, Error::MalformedSecret { .. }));
        assert!(!err.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value).then_output(|| {
            GetSecretValueOutput::builder()
                .secret_string(r#"{"host":"db.example","port":"not-a-port"}"#)
                .build()
        });
        let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

        let err = resolve_credentials(&client, Some("db/prod")).await.unwrap_err();
        assert!(matches!(err, Error::MalformedSecret { .. }));
    }

    #[tokio::test]
    async fn test_malformed_error_never_echoes_secret_values() {
        let payloads = [
            r#""s3cr3t-P4ss""#,
            r#"{"host":"db.example","port":5432,"dbname":"mydb","username":"u","password":987654321}"#,
            r#"{"host":"db.example","port":5432,"dbname":"mydb","username":"u","password":"s3cr3t-P4ss""#,
        ];

        for payload in payloads {
            let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value)
                .then_output(move || GetSecretValueOutput::builder().secret_string(payload).build());
            let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

            let err = resolve_credentials(&client, Some("db/prod")).await.unwrap_err();
            let rendered = format!("{err} {err:?}");

            assert!(matches!(err, Error::MalformedSecret { .. }), "{rendered}");
            assert!(!rendered.contains("s3cr3t-P4ss"), "{rendered}");
            assert!(!rendered.contains("987654321"), "{rendered}");
        }
    }

    #[tokio::test]
    async fn test_binary_secret_is_malformed() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value)
            .then_output(|| GetSecretValueOutput::builder().name("db/prod").build());
        let client = mock_client!(aws_sdk_secretsmanager, [&rule]);

        let err = resolve_credentials(&client, Some("db/prod")).await.unwrap_err();
        assert!(matches!(err, Error::MalformedSecret { .. }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let credentials: Credentials = serde_json::from_str(PROD_SECRET).unwrap();
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("db.example"));
        assert!(!rendered.contains("\"p\""));
        assert!(rendered.contains("<redacted>"));
    }
}
