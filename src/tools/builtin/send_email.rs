//! Send-email tool: replies to the user through BotMailRoom.
//!
//! The user can only talk to the agent over email, so a successful send
//! is the signal that the agent has finished its turn.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::channels::email::{BotMailRoomClient, SendEmailRequest};
use crate::context::ToolContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

pub const SEND_EMAIL_TOOL_NAME: &str = "botmailroom_send_email";

pub struct SendEmailTool {
    client: Arc<BotMailRoomClient>,
}

impl SendEmailTool {
    pub fn new(client: Arc<BotMailRoomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        SEND_EMAIL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Send an email from a BotMailRoom inbox. To reply within an existing thread, \
         set reply_to_email_id to the id of the email being answered."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "inbox_id": {
                    "type": "string",
                    "description": "The id of the inbox to send the email from"
                },
                "to_addresses": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Recipient email addresses"
                },
                "cc_addresses": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "CC email addresses"
                },
                "bcc_addresses": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "BCC email addresses"
                },
                "subject": {
                    "type": "string",
                    "description": "Subject line of the email"
                },
                "content": {
                    "type": "string",
                    "description": "Body of the email"
                },
                "is_html": {
                    "type": "boolean",
                    "description": "Whether the content is HTML (default: true)"
                },
                "reply_to_email_id": {
                    "type": "string",
                    "description": "The id of the email this message replies to"
                }
            },
            "required": ["inbox_id", "to_addresses", "subject", "content"]
        })
    }

    fn ends_conversation(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let request: SendEmailRequest = serde_json::from_value(params)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;
        if request.to_addresses.is_empty() {
            return Err(ToolError::InvalidParameters(
                "to_addresses must not be empty".into(),
            ));
        }

        tracing::debug!(chat_id = %ctx.chat_id, subject = %request.subject, "Sending email");
        let body = self.client.send_email(&request).await?;
        Ok(ToolOutput::text(body, start.elapsed()))
    }
}
