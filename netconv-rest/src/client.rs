//! Shared HTTP client for the manager.

use std::time::Duration;

use netconv_core::{ApiFlavor, Reply, Status, TransportError};
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Statuses worth another attempt on an idempotent request.
const RETRY_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Connection settings for one manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Base URL, e.g. `https://nsx.example.com`.
    pub manager: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Accept invalid TLS certificates.
    pub insecure: bool,
    pub timeout: Duration,
    /// Extra attempts for GET, PUT and DELETE. POST is never retried.
    pub max_retries: u32,
    /// First retry delay; doubles on every further attempt.
    pub retry_backoff: Duration,
    pub page_size: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            manager: String::new(),
            username: None,
            password: None,
            insecure: false,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            page_size: 1000,
        }
    }
}

/// Error body the manager sends with every non-2xx answer.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    module_name: Option<String>,
}

pub struct ManagerClient {
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    max_retries: u32,
    retry_backoff: Duration,
    page_size: u32,
}

impl ManagerClient {
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let base_url = config.manager.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(config.manager));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .user_agent(concat!("netconv/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: config.username,
            password: config.password,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            page_size: config.page_size.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn api_root(&self, api: ApiFlavor) -> String {
        match api {
            ApiFlavor::Manager => format!("{}/api/v1", self.base_url),
            ApiFlavor::Policy => format!("{}/policy/api/v1", self.base_url),
        }
    }

    pub fn collection_url(&self, api: ApiFlavor, collection: &str) -> String {
        format!("{}/{}", self.api_root(api), collection)
    }

    pub fn object_url(&self, api: ApiFlavor, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.api_root(api), collection, id)
    }

    /// Send one request. GET, PUT and DELETE are retried on connection
    /// failures, timeouts and throttling; POST goes out exactly once.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> std::result::Result<Response, TransportError> {
        let idempotent = method != Method::POST;
        let mut attempt = 0;

        loop {
            let mut request = self.http.request(method.clone(), url).query(query);
            if let Some(username) = &self.username {
                request = request.basic_auth(username, self.password.as_deref());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!("{} {}", method, url);
            let result = request.send().await;
            let retryable = match &result {
                Ok(response) => RETRY_STATUSES.contains(&response.status().as_u16()),
                Err(e) => e.is_connect() || e.is_timeout(),
            };

            if idempotent && retryable && attempt < self.max_retries {
                let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
                warn!(
                    "{} {} failed on attempt {}, retrying in {:?}",
                    method,
                    url,
                    attempt + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return result.map_err(transport_error);
        }
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Connect(e.to_string())
    }
}

/// Turn an error response body into an API error. Bodies that are not the
/// manager's error shape are kept verbatim as the message.
pub(crate) fn api_error(status: Status, body: &str) -> TransportError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            error_code,
            error_message: Some(message),
            module_name,
        }) => TransportError::Api {
            status,
            code: error_code,
            message: match module_name {
                Some(module) => format!("{}: {}", module, message),
                None => message,
            },
        },
        _ => TransportError::Api {
            status,
            code: None,
            message: if body.trim().is_empty() {
                "empty error body".to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

/// Status and raw body of a response, or why there is none.
async fn read_body(
    result: std::result::Result<Response, TransportError>,
) -> std::result::Result<(Status, String), (Option<Status>, TransportError)> {
    let response = result.map_err(|e| (None, e))?;
    let status = Status(response.status().as_u16());
    let text = response
        .text()
        .await
        .map_err(|e| (Some(status), transport_error(e)))?;
    Ok((status, text))
}

/// Decode a response carrying an object.
pub(crate) async fn read_reply<T: DeserializeOwned>(
    result: std::result::Result<Response, TransportError>,
) -> Reply<T> {
    let (status, text) = match read_body(result).await {
        Ok(body) => body,
        Err((status, e)) => return Reply::failed(status, e),
    };
    if !status.is_success() {
        return Reply::failed(Some(status), api_error(status, &text));
    }
    match serde_json::from_str(&text) {
        Ok(body) => Reply::ok(status, body),
        Err(e) => Reply::failed(Some(status), TransportError::Decode(e.to_string())),
    }
}

/// Decode a response whose body does not matter on success.
pub(crate) async fn read_empty(result: std::result::Result<Response, TransportError>) -> Reply<()> {
    match read_body(result).await {
        Ok((status, _)) if status.is_success() => Reply::ok(status, ()),
        Ok((status, text)) => Reply::failed(Some(status), api_error(status, &text)),
        Err((status, e)) => Reply::failed(status, e),
    }
}
