//! AppSync transport: GraphQL over HTTPS with API-key auth.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use corsa_sync_core::{AppSyncConfig, FetchError, GraphQlRequest, Transport};

const API_KEY_HEADER: &str = "x-api-key";

/// AppSync over HTTPS with static API-key auth. One POST per request, no retries.
#[derive(Clone)]
pub struct AppSyncClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: HeaderValue,
}

impl AppSyncClient {
    pub fn new(cfg: &AppSyncConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("corsa/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Config(format!("http client: {e}")))?;
        let mut api_key = HeaderValue::from_str(&cfg.api_key)
            .map_err(|_| FetchError::Config("APPSYNC_API_KEY is not a valid header value".into()))?;
        api_key.set_sensitive(true);
        Ok(Self { http, endpoint: cfg.endpoint.clone(), api_key })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build_request(&self, request: &GraphQlRequest) -> Result<reqwest::Request, FetchError> {
        self.http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, self.api_key.clone())
            .json(request)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for AppSyncClient {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, FetchError> {
        let request_id = Uuid::new_v4();
        let req = self.build_request(request)?;
        debug!(%request_id, variables = ?request.variables, "appsync request");

        let response = self.http.execute(req).await.map_err(|e| {
            warn!(%request_id, error = %e, "appsync unreachable");
            FetchError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            warn!(%request_id, %status, "appsync returned error status");
            return Err(FetchError::Status { status: status.as_u16(), body });
        }

        let body: Value = response.json().await.map_err(|e| {
            warn!(%request_id, error = %e, "appsync body is not json");
            FetchError::Decode(e.to_string())
        })?;
        debug!(%request_id, %status, "appsync response");
        Ok(body)
    }
}
