/// Session context passed into every operation that talks to the server
use crate::config::Config;
use crate::endpoint::{ApiRequest, Endpoint};
use crate::error::{FeedError, Result};
use crate::http::HttpEndpoint;
use bytes::Bytes;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest response body echoed into a `Status` error
const MAX_ERROR_BODY: usize = 256;

/// Endpoint handle plus device identity.
///
/// Data entities never hold one of these; callers pass it in.
/// Cloning is cheap and shares the endpoint.
#[derive(Clone)]
pub struct Session {
    endpoint: Arc<dyn Endpoint>,
    config: Arc<Config>,
}

impl Session {
    pub fn new(config: Config, endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            endpoint,
            config: Arc::new(config),
        }
    }

    /// Session over plain HTTP to `config.base_url`
    pub fn http(config: Config) -> Result<Self> {
        config.validate()?;
        let endpoint = HttpEndpoint::new(&config);
        Ok(Self::new(config, Arc::new(endpoint)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute a request, rejecting non-2xx statuses
    pub async fn call(&self, request: ApiRequest) -> Result<Bytes> {
        let endpoint = request.endpoint.clone();
        let resp = self.endpoint.execute(request).await?;
        if !resp.is_success() {
            let body = String::from_utf8_lossy(&resp.body);
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            warn!("{} answered with status {}", endpoint, resp.status);
            return Err(FeedError::Status {
                status: resp.status,
                body,
            });
        }
        debug!("{} -> {} bytes", endpoint, resp.body.len());
        Ok(resp.body)
    }

    /// Execute a request and decode its JSON body
    pub async fn call_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.call(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

pub(crate) fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// `n` random decimal digits, first one non-zero
pub(crate) fn random_digits(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|i| {
            let low = if i == 0 { 1 } else { 0 };
            char::from(b'0' + rng.gen_range(low..10u8))
        })
        .collect()
}

/// Client context token for direct-message writes
pub(crate) fn client_context() -> String {
    format!("68{}", random_digits(17))
}
