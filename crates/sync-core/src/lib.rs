//! Core GraphQL wire model, error taxonomy and transport trait used by CORSA clients

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, marker::PhantomData, sync::Arc, time::Duration};
use tracing::{info, warn};

use corsa_model::LatLng;

pub mod queries;

/// A GraphQL document plus its bound variables.
///
/// The document is `&'static str`: request text is fixed at compile time and
/// route values only ever travel through `variables`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphQlRequest {
    pub query: &'static str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

impl GraphQlRequest {
    pub fn new(query: &'static str) -> Self {
        Self { query, variables: Map::new() }
    }

    pub fn var(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub path: Option<Vec<Value>>,
    #[serde(default)]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("configuration: {0}")]
    Config(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("graphql: {}", messages(.0))]
    GraphQl(Vec<GraphQlError>),
    #[error("response carried no `{field}` data")]
    MissingData { field: &'static str },
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

fn messages(errors: &[GraphQlError]) -> String {
    errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; ")
}

/// Anything that can deliver a GraphQL request and hand back the raw JSON body.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, FetchError>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, FetchError> {
        (**self).execute(request).await
    }
}

/// A request paired with the `data` field its result lives under.
pub struct Operation<T> {
    pub request: GraphQlRequest,
    pub field: &'static str,
    _out: PhantomData<fn() -> T>,
}

impl<T> Operation<T> {
    pub fn new(request: GraphQlRequest, field: &'static str) -> Self {
        Self { request, field, _out: PhantomData }
    }
}

impl<T> Clone for Operation<T> {
    fn clone(&self) -> Self {
        Self::new(self.request.clone(), self.field)
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("field", &self.field)
            .field("variables", &self.request.variables)
            .finish()
    }
}

/// Executes `op` and pulls `data.<field>` out of the response.
/// A `null` field is `Ok(None)`; see [`require`] for the not-found case.
pub async fn run<T, X>(transport: &X, op: &Operation<T>) -> Result<Option<T>, FetchError>
where
    T: DeserializeOwned,
    X: Transport + ?Sized,
{
    let body = transport.execute(&op.request).await?;
    extract(body, op.field)
}

pub fn extract<T: DeserializeOwned>(body: Value, field: &'static str) -> Result<Option<T>, FetchError> {
    let resp: GraphQlResponse =
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let errors = resp.errors.unwrap_or_default();

    let mut data = match resp.data {
        Some(Value::Object(d)) => d,
        Some(Value::Null) | None if !errors.is_empty() => return Err(FetchError::GraphQl(errors)),
        Some(Value::Null) | None => return Err(FetchError::MissingData { field }),
        Some(other) => return Err(FetchError::Decode(format!("`data` is not an object: {other}"))),
    };
    if !errors.is_empty() {
        warn!(field, errors = %messages(&errors), "partial graphql response");
    }

    match data.remove(field) {
        None => Err(FetchError::MissingData { field }),
        Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|e| FetchError::Decode(format!("{field}: {e}"))),
    }
}

pub fn require<T>(found: Option<T>, entity: &'static str, key: &str) -> Result<T, FetchError> {
    found.ok_or_else(|| FetchError::NotFound { entity, key: key.to_string() })
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppSyncConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub default_center: LatLng,
}

impl fmt::Debug for AppSyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSyncConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("default_center", &self.default_center)
            .finish()
    }
}

impl AppSyncConfig {
    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Endpoint and key are mandatory; there are no built-in credentials.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FetchError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| FetchError::Config(format!("{key} must be set")))
        };
        let endpoint = required("APPSYNC_ENDPOINT")?;
        let api_key = required("APPSYNC_API_KEY")?;
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(FetchError::Config(format!("APPSYNC_ENDPOINT is not an http(s) url: {endpoint}")));
        }

        let secs = |key: &str, default: Duration| -> Result<Duration, FetchError> {
            match lookup(key) {
                None => Ok(default),
                Some(v) => match v.trim().parse::<u64>() {
                    Ok(0) | Err(_) => Err(FetchError::Config(format!("{key} must be a positive number of seconds, got `{v}`"))),
                    Ok(n) => Ok(Duration::from_secs(n)),
                },
            }
        };
        let poll_interval = secs("CORSA_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?;
        let timeout = secs("CORSA_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT)?;

        let default_center = match (lookup("CORSA_DEFAULT_LAT"), lookup("CORSA_DEFAULT_LNG")) {
            (Some(lat), Some(lng)) => match (lat.trim().parse(), lng.trim().parse()) {
                (Ok(lat), Ok(lng)) => LatLng::new(lat, lng),
                _ => {
                    warn!("CORSA_DEFAULT_LAT/LNG unparsable, centering on 0,0");
                    LatLng::default()
                }
            },
            _ => LatLng::default(),
        };

        let cfg = Self {
            endpoint,
            api_key,
            timeout,
            poll_interval,
            default_center,
        };
        info!(endpoint = %cfg.endpoint, poll_secs = cfg.poll_interval.as_secs(), "appsync config loaded");
        Ok(cfg)
    }
}
