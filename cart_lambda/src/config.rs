use crate::error::{Error, Result};

const DEFAULT_ROUTE_PREFIX: &str = "cart";

/// Cross-origin policy applied to every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Any origin, method and header.
    AllowAll,
    /// Only the listed origins.
    AllowList(Vec<String>),
}

impl CorsPolicy {
    fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            CorsPolicy::AllowAll
        } else {
            CorsPolicy::AllowList(origins)
        }
    }
}

/// Process-wide configuration, immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Identifier of the credential bundle in Secrets Manager.
    pub secret_id: Option<String>,
    /// Global route prefix, without slashes.
    pub route_prefix: String,
    pub cors: CorsPolicy,
    /// Whether the invocation-context shim is attached.
    pub propagate_context: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_id: None,
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
            cors: CorsPolicy::AllowAll,
            propagate_context: true,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// A missing secret identifier is not an error here; it is reported when
    /// credentials are first resolved.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let secret_id = non_empty("SECRET_ARN").or_else(|| non_empty("SECRET_NAME"));

        let route_prefix = non_empty("ROUTE_PREFIX")
            .map(|prefix| prefix.trim().trim_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ROUTE_PREFIX.to_string());

        let cors = non_empty("CORS_ALLOWED_ORIGINS")
            .map(|raw| CorsPolicy::parse(&raw))
            .unwrap_or(CorsPolicy::AllowAll);

        let propagate_context = match non_empty("PROPAGATE_INVOCATION_CONTEXT") {
            Some(raw) => parse_bool("PROPAGATE_INVOCATION_CONTEXT", &raw)?,
            None => true,
        };

        Ok(Self {
            secret_id,
            route_prefix,
            cors,
            propagate_context,
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Configuration(format!(
            "{key} must be a boolean, got `{other}`"
        ))),
    }
}
