use axum::body::{to_bytes, Body};
use lambda_http::http::Uri;
use lambda_http::request::RequestContext;
use lambda_http::{tracing, Error, Request, RequestExt, Response};
use tower::ServiceExt;

use crate::app::AppHandle;
use crate::bootstrap::{Bootstrap, Factory};
use crate::error;

/// Synchronous invocation payload limit.
const MAX_RESPONSE_BYTES: usize = 6 * 1024 * 1024;

fn stage(event: &Request) -> Option<&str> {
    match event.request_context_ref()? {
        RequestContext::ApiGatewayV1(context) => context.stage.as_deref(),
        RequestContext::ApiGatewayV2(context) => context.stage.as_deref(),
        _ => None,
    }
}

/// Removes a leading `/{stage}` segment, which `lambda_http` prepends to
/// API Gateway paths. Returns `None` when there is nothing to remove.
fn strip_stage(uri: &Uri, stage: &str) -> Option<Uri> {
    if stage.is_empty() || stage == "$default" {
        return None;
    }
    let rest = uri.path().strip_prefix('/')?.strip_prefix(stage)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let path = if rest.is_empty() { "/" } else { rest };
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}

/// Serves one API Gateway invocation with the cached application, building it
/// first on a cold start.
pub async fn function_handler<F>(mut event: Request, bootstrap: &Bootstrap<F>) -> Result<Response<Body>, Error>
where
    F: Factory<Handle = AppHandle>,
{
    let request_id = event
        .lambda_context_ref()
        .map(|context| context.request_id.clone())
        .unwrap_or_default();

    let unstaged = stage(&event).and_then(|stage| strip_stage(event.uri(), stage));
    if let Some(uri) = unstaged {
        *event.uri_mut() = uri;
    }
    tracing::debug!(
        request_id = %request_id,
        method = %event.method(),
        path = %event.uri().path(),
        "invocation received"
    );

    let handle = bootstrap.get_or_create().await?;
    let response = handle
        .router()
        .oneshot(event)
        .await
        .map_err(|err| error::Error::Handler(err.to_string()))?;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_RESPONSE_BYTES).await.map_err(|err| {
        tracing::error!(request_id = %request_id, error = %err, "failed to buffer response body");
        error::Error::Handler(format!("failed to buffer response body: {err}"))
    })?;
    tracing::debug!(request_id = %request_id, status = parts.status.as_u16(), "invocation complete");
    Ok(Response::from_parts(parts, Body::from(bytes)))
}
