use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::Client as SecretsClient;
use cart_lambda::app::AppFactory;
use cart_lambda::bootstrap::Bootstrap;
use cart_lambda::config::Config;
use cart_lambda::database::PgConnector;
use cart_lambda::event_handler::function_handler;
use lambda_http::{run, service_fn, tracing, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::subscriber::fmt()
        .json()
        .with_env_filter(tracing::subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let shared_config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
    let secrets_client = SecretsClient::new(&shared_config);
    let bootstrap = Bootstrap::new(AppFactory::new(config, secrets_client, Arc::new(PgConnector)));
    run(service_fn(|event| function_handler(event, &bootstrap))).await
}
