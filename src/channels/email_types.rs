//! Email-specific types: the inbound webhook payload and its addresses.

use serde::{Deserialize, Serialize};

/// A mailbox address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An earlier email in the same thread, as referenced by the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousEmail {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Inbound email event delivered by the mailroom webhook.
///
/// Only the fields the agent reads are modeled; anything else in the body
/// is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub id: String,
    #[serde(default)]
    pub inbox_id: Option<String>,
    pub from_address: EmailAddress,
    #[serde(default)]
    pub to_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub cc_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Provider-rendered prompt for the whole thread, fed to the model as the user turn.
    pub thread_prompt: String,
    #[serde(default)]
    pub previous_emails: Option<Vec<PreviousEmail>>,
}

impl EmailPayload {
    /// Conversation key: the first email of the thread, or this email when it starts one.
    pub fn thread_key(&self) -> &str {
        match self.previous_emails.as_deref() {
            Some([first, ..]) => &first.id,
            _ => &self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> EmailPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn thread_key_uses_own_id_without_history() {
        let p = payload(serde_json::json!({
            "id": "email-2",
            "from_address": {"address": "alice@example.com"},
            "thread_prompt": "hello"
        }));
        assert_eq!(p.thread_key(), "email-2");
    }

    #[test]
    fn thread_key_uses_own_id_with_empty_history() {
        let p = payload(serde_json::json!({
            "id": "email-2",
            "from_address": {"address": "alice@example.com"},
            "thread_prompt": "hello",
            "previous_emails": []
        }));
        assert_eq!(p.thread_key(), "email-2");
    }

    #[test]
    fn thread_key_uses_first_previous_email() {
        let p = payload(serde_json::json!({
            "id": "email-3",
            "from_address": {"address": "alice@example.com"},
            "thread_prompt": "hello",
            "previous_emails": [{"id": "email-1"}, {"id": "email-2"}]
        }));
        assert_eq!(p.thread_key(), "email-1");
    }

    #[test]
    fn unknown_fields_ignored() {
        let p = payload(serde_json::json!({
            "id": "email-1",
            "inbox_id": "inbox-9",
            "from_address": {"address": "alice@example.com", "name": "Alice"},
            "to_addresses": [{"address": "bot@botmailroom.com"}],
            "subject": "Question",
            "thread_prompt": "What's the weather?",
            "attachments": [],
            "date": "2026-01-01T00:00:00Z"
        }));
        assert_eq!(p.inbox_id.as_deref(), Some("inbox-9"));
        assert_eq!(p.from_address.name.as_deref(), Some("Alice"));
        assert_eq!(p.to_addresses.len(), 1);
        assert!(p.cc_addresses.is_empty());
    }

    #[test]
    fn missing_thread_prompt_is_rejected() {
        let result = serde_json::from_value::<EmailPayload>(serde_json::json!({
            "id": "email-1",
            "from_address": {"address": "alice@example.com"}
        }));
        assert!(result.is_err());
    }
}
