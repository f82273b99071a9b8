//! BotMailRoom API client: outbound email for the send-email tool.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

const PROVIDER: &str = "botmailroom";

/// Outbound email request, as accepted by the send-email endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub inbox_id: String,
    pub to_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc_addresses: Vec<String>,
    pub subject: String,
    pub content: String,
    #[serde(default = "default_is_html")]
    pub is_html: bool,
    /// Thread the message as a reply to this email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_email_id: Option<String>,
}

fn default_is_html() -> bool {
    true
}

/// Thin HTTP client for the BotMailRoom REST API.
#[derive(Clone)]
pub struct BotMailRoomClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for BotMailRoomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotMailRoomClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BotMailRoomClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Send an email. Returns the provider's response body verbatim.
    pub async fn send_email(&self, request: &SendEmailRequest) -> Result<String, ToolError> {
        let url = format!("{}/api/v1/send-email", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("BotMailRoom request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("BotMailRoom read failed: {e}")))?;

        if !status.is_success() {
            return Err(ToolError::Provider {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            to = %request.to_addresses.join(", "),
            inbox = %request.inbox_id,
            "Email sent"
        );
        Ok(body)
    }
}
