//! Session provisioning against the exchange REST endpoint.

use serde::{Deserialize, Serialize};
use wsprobe_shared::{error_body_message, ProbeError};

/// Opaque session credential paired with the username that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub username: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildupRequest<'a> {
    username: &'a str,
    api_key: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildupResponse {
    session_token: Option<String>,
}

/// Exchanges a username/API-key pair for a short-lived session token via
/// `POST {rest_base_url}/buildup`.
#[derive(Clone)]
pub struct SessionProvisioner {
    client: reqwest::Client,
}

impl SessionProvisioner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// One POST, no retries. The caller is responsible for writing the token
    /// into the config record's `sessionId` and for not issuing concurrent
    /// calls.
    pub async fn provision(
        &self,
        rest_base_url: &str,
        username: &str,
        api_key: &str,
    ) -> Result<SessionToken, ProbeError> {
        if rest_base_url.trim().is_empty() {
            return Err(ProbeError::validation("restBaseUrl"));
        }
        if username.trim().is_empty() {
            return Err(ProbeError::validation("username"));
        }
        if api_key.trim().is_empty() {
            return Err(ProbeError::validation("apiKey"));
        }

        let url = format!("{}/buildup", rest_base_url.trim_end_matches('/'));
        tracing::info!("provisioning session for {username} via {url}");

        let resp = self
            .client
            .post(&url)
            .json(&BuildupRequest { username, api_key })
            .send()
            .await
            .map_err(|e| ProbeError::Provisioning {
                status: 0,
                message: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProbeError::Provisioning {
                status: status.as_u16(),
                message: error_body_message(&text),
            });
        }

        let body: BuildupResponse =
            serde_json::from_str(&text).map_err(|_| ProbeError::MalformedProvisioning)?;
        let token = body
            .session_token
            .filter(|t| !t.is_empty())
            .ok_or(ProbeError::MalformedProvisioning)?;

        tracing::info!("session provisioned for {username}");
        Ok(SessionToken {
            token,
            username: username.to_string(),
        })
    }
}

impl Default for SessionProvisioner {
    fn default() -> Self {
        Self::new()
    }
}
