//! KuCoin Session Bootstrap
//!
//! Retrieves the short-lived public token and the WebSocket server list from
//! the `bullet-public` REST endpoint.

use std::time::Duration;

use super::messages::{BulletResponse, InstanceServer, KUCOIN_SUCCESS_CODE};
use crate::application::ports::SetupError;

/// Default KuCoin bootstrap endpoint.
pub const DEFAULT_BOOTSTRAP_URL: &str = "https://api.kucoin.com/api/v1/bullet-public";

/// HTTP timeout for the bootstrap request.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Token and server obtained from the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    /// Session token.
    pub token: String,
    /// First advertised server.
    pub server: InstanceServer,
}

/// HTTP client for the bootstrap endpoint.
#[derive(Debug, Clone)]
pub struct BootstrapClient {
    http: reqwest::Client,
    url: String,
}

impl BootstrapClient {
    /// Create a client for a bootstrap URL.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Bootstrap`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, SetupError> {
        let http = reqwest::Client::builder()
            .timeout(BOOTSTRAP_TIMEOUT)
            .build()
            .map_err(|e| SetupError::Bootstrap(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Bootstrap URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request a session token and server.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::BootstrapStatus`] on a non-success HTTP status,
    /// [`SetupError::MissingToken`] or [`SetupError::NoInstanceServer`] when
    /// the response lacks them, and [`SetupError::Bootstrap`] otherwise.
    pub async fn request_grant(&self) -> Result<SessionGrant, SetupError> {
        tracing::debug!(url = %self.url, "Requesting KuCoin session token");

        let response = self
            .http
            .post(&self.url)
            .send()
            .await
            .map_err(|e| SetupError::Bootstrap(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SetupError::BootstrapStatus(status.as_u16()));
        }

        let body: BulletResponse = response
            .json()
            .await
            .map_err(|e| SetupError::Bootstrap(e.to_string()))?;

        grant_from_response(body)
    }
}

/// Extract the session grant from a decoded bootstrap response.
///
/// # Errors
///
/// See [`BootstrapClient::request_grant`].
pub fn grant_from_response(body: BulletResponse) -> Result<SessionGrant, SetupError> {
    if !body.code.is_empty() && body.code != KUCOIN_SUCCESS_CODE {
        tracing::warn!(code = %body.code, "Unexpected bootstrap response code");
    }

    let data = body.data.ok_or(SetupError::MissingToken)?;
    if data.token.is_empty() {
        return Err(SetupError::MissingToken);
    }

    let server = data
        .instance_servers
        .into_iter()
        .next()
        .ok_or(SetupError::NoInstanceServer)?;

    Ok(SessionGrant {
        token: data.token,
        server,
    })
}
