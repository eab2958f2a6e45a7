use axum::extract::Request;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use lambda_http::RequestExt;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsPolicy;
use crate::error::{Error, Result};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self';base-uri 'self';\
font-src 'self' https: data:;form-action 'self';frame-ancestors 'self';\
img-src 'self' data:;object-src 'none';script-src 'self';script-src-attr 'none';\
style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests";

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

const FINGERPRINT_HEADERS: &[&str] = &["x-powered-by", "server"];

/// Sets the hardening headers and strips headers that identify the stack.
pub async fn security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for &(name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    for name in FINGERPRINT_HEADERS {
        headers.remove(*name);
    }
    response
}

/// Builds the CORS layer for `policy`.
///
/// Fails when an allow-listed origin is not a valid header value.
pub fn cors_layer(policy: &CorsPolicy) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(Any);

    match policy {
        CorsPolicy::AllowAll => Ok(layer.allow_origin(Any)),
        CorsPolicy::AllowList(origins) => {
            let origins = origins
                .iter()
                .map(|origin| {
                    HeaderValue::from_str(origin).map_err(|_| {
                        Error::Bootstrap(format!("invalid CORS origin `{origin}`"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(layer.allow_origin(AllowOrigin::list(origins)))
        }
    }
}

/// Lambda invocation metadata made available to route handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    pub request_id: String,
    pub function_arn: String,
    /// Invocation deadline, milliseconds since the Unix epoch.
    pub deadline_ms: u64,
}

impl From<&lambda_http::Context> for InvocationContext {
    fn from(context: &lambda_http::Context) -> Self {
        Self {
            request_id: context.request_id.clone(),
            function_arn: context.invoked_function_arn.clone(),
            deadline_ms: context.deadline,
        }
    }
}

/// Copies the Lambda context into an [`InvocationContext`] extension.
pub async fn propagate_invocation_context(mut request: Request, next: Next) -> Response {
    let invocation = request.lambda_context_ref().map(InvocationContext::from);
    if let Some(invocation) = invocation {
        request.extensions_mut().insert(invocation);
    }
    next.run(request).await
}
