use std::sync::Arc;

use aws_sdk_secretsmanager::Client as SecretsClient;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use lambda_http::tracing;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::bootstrap::Factory;
use crate::config::Config;
use crate::database::{self, ConnectOptions, Connector};
use crate::error::{Error, Result};
use crate::middleware::{
    cors_layer, propagate_invocation_context, security_headers, InvocationContext,
};
use crate::secrets;

/// State shared by the route handlers. The connect options are resolved once
/// per cold start and live as long as the handle.
pub struct AppState<C> {
    connector: Arc<C>,
    options: Arc<ConnectOptions>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            options: Arc::clone(&self.options),
        }
    }
}

impl<C: Connector> AppState<C> {
    pub fn new(connector: Arc<C>, options: ConnectOptions) -> Self {
        Self {
            connector,
            options: Arc::new(options),
        }
    }
}

/// A ready-to-serve application instance.
#[derive(Clone)]
pub struct AppHandle {
    router: Router,
}

impl AppHandle {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Builds [`AppHandle`]s: resolves credentials, checks the database and
/// assembles the router.
pub struct AppFactory<C> {
    config: Config,
    secrets: SecretsClient,
    connector: Arc<C>,
}

impl<C: Connector> AppFactory<C> {
    pub fn new(config: Config, secrets: SecretsClient, connector: Arc<C>) -> Self {
        Self {
            config,
            secrets,
            connector,
        }
    }
}

impl<C: Connector> Factory for AppFactory<C> {
    type Handle = AppHandle;

    async fn build(&self) -> Result<AppHandle> {
        let credentials =
            secrets::resolve_credentials(&self.secrets, self.config.secret_id.as_deref()).await?;
        let options = ConnectOptions::from(&credentials);
        database::check_connection(self.connector.as_ref(), &options).await?;

        let state = AppState::new(Arc::clone(&self.connector), options);
        let router = router(&self.config, state)?;
        Ok(AppHandle::new(router))
    }
}

fn route_prefix(prefix: &str) -> Result<Option<String>> {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return Ok(None);
    }

    let valid = prefix.split('/').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    });
    if !valid {
        return Err(Error::Bootstrap(format!("invalid route prefix `{prefix}`")));
    }
    Ok(Some(format!("/{prefix}")))
}

/// Assembles the application router with its middleware stack.
pub fn router<C: Connector>(config: &Config, state: AppState<C>) -> Result<Router> {
    let api = Router::new()
        .route("/health", get(health))
        .route("/health/db", get(database_health::<C>))
        .with_state(state);

    let mut app = match route_prefix(&config.route_prefix)? {
        Some(prefix) => Router::new().nest(&prefix, api),
        None => api,
    };

    if config.propagate_context {
        app = app.layer(middleware::from_fn(propagate_invocation_context));
    }

    Ok(app
        .layer(middleware::map_response(security_headers))
        .layer(cors_layer(&config.cors)?)
        .layer(TraceLayer::new_for_http()))
}

async fn health(invocation: Option<Extension<InvocationContext>>) -> impl IntoResponse {
    let request_id = invocation.map(|Extension(invocation)| invocation.request_id);
    Json(json!({ "status": "ok", "requestId": request_id }))
}

async fn database_health<C: Connector>(State(state): State<AppState<C>>) -> impl IntoResponse {
    match database::check_connection(state.connector.as_ref(), &state.options).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => {
            tracing::warn!(error = %err, "database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
