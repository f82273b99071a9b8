//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BOTMAILROOM_BASE_URL: &str = "https://api.botmailroom.com";
pub const DEFAULT_EXA_BASE_URL: &str = "https://api.exa.ai";
pub const DEFAULT_DATABASE_URL: &str = "./sql_app.db";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_RESPONSE_CYCLES: u32 = 10;

/// Runtime settings, read from the environment (and `.env`) at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared secret for webhook signatures. Verification is skipped when unset.
    pub botmailroom_webhook_secret: Option<SecretString>,
    pub botmailroom_api_key: SecretString,
    pub botmailroom_base_url: String,
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub model: String,
    /// Enables the `web_search` tool when present.
    pub exa_api_key: Option<SecretString>,
    pub exa_base_url: String,
    /// Upper bound on model invocations per inbound email.
    pub max_response_cycles: u32,
    pub database_url: String,
    pub bind_address: SocketAddr,
}

impl Settings {
    /// Load `.env` (if any) and read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key)
                .map(SecretString::from)
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let max_response_cycles = match get("MAX_RESPONSE_CYCLES") {
            Some(raw) => {
                let cycles: u32 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    key: "MAX_RESPONSE_CYCLES".into(),
                    message: format!("{e}"),
                })?;
                if cycles == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "MAX_RESPONSE_CYCLES".into(),
                        message: "must be at least 1".into(),
                    });
                }
                cycles
            }
            None => DEFAULT_MAX_RESPONSE_CYCLES,
        };

        let bind_raw = get("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "BIND_ADDRESS".into(),
                message: format!("{e}"),
            })?;

        Ok(Self {
            botmailroom_webhook_secret: get("BOTMAILROOM_WEBHOOK_SECRET").map(SecretString::from),
            botmailroom_api_key: required("BOTMAILROOM_API_KEY")?,
            botmailroom_base_url: get("BOTMAILROOM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BOTMAILROOM_BASE_URL.to_string()),
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            exa_api_key: get("EXA_API_KEY").map(SecretString::from),
            exa_base_url: get("EXA_BASE_URL").unwrap_or_else(|| DEFAULT_EXA_BASE_URL.to_string()),
            max_response_cycles,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_address,
        })
    }

    /// Filesystem path of the database.
    ///
    /// Accepts bare paths as well as URL forms like `sqlite+aiosqlite:///./sql_app.db`.
    pub fn database_path(&self) -> PathBuf {
        let path = match self.database_url.split_once(":///") {
            Some((_scheme, rest)) => rest,
            None => self.database_url.as_str(),
        };
        PathBuf::from(path)
    }
}

/// Build the system prompt, listing the tools the model is allowed to call.
pub fn system_prompt(tool_names: &[String]) -> String {
    let valid_tool_names = tool_names.join(", ");
    format!(
        "\n- Respond to the user's instructions carefully\n\
         - The user is only able to respond to emails, so if you have a message to send, use the `botmailroom_send_email` tool.\n\
         - Email content should be formatted as email compliant html.\n\
         - When sending emails, prefer responding to an existing email thread over starting a new one.\n\
         - Only use one tool at a time\n\
         - Always respond with a tool call - the only valid tool names are {valid_tool_names}\n"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("BOTMAILROOM_API_KEY", "bmr-key"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn defaults_applied() {
        let settings = Settings::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(settings.max_response_cycles, 10);
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.bind_address.port(), 8000);
        assert!(settings.botmailroom_webhook_secret.is_none());
        assert!(settings.exa_api_key.is_none());
        assert_eq!(settings.openai_api_key.expose_secret(), "sk-test");
    }

    #[test]
    fn missing_required_key() {
        let err = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BOTMAILROOM_API_KEY"));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let err = Settings::from_lookup(lookup(&[
            ("BOTMAILROOM_API_KEY", "bmr-key"),
            ("OPENAI_API_KEY", "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENAI_API_KEY"));
    }

    #[test]
    fn zero_cycles_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_RESPONSE_CYCLES", "0"));
        let err = Settings::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn non_numeric_cycles_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_RESPONSE_CYCLES", "many"));
        assert!(Settings::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn optional_keys_read() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("EXA_API_KEY", "exa"));
        pairs.push(("BOTMAILROOM_WEBHOOK_SECRET", "whsec"));
        pairs.push(("MAX_RESPONSE_CYCLES", "3"));
        pairs.push(("BIND_ADDRESS", "127.0.0.1:9000"));
        let settings = Settings::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(settings.max_response_cycles, 3);
        assert_eq!(settings.exa_api_key.unwrap().expose_secret(), "exa");
        assert_eq!(settings.bind_address.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn database_path_strips_url_scheme() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DATABASE_URL", "sqlite+aiosqlite:///./sql_app.db"));
        let settings = Settings::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(settings.database_path(), PathBuf::from("./sql_app.db"));
    }

    #[test]
    fn database_path_accepts_bare_path() {
        let settings = Settings::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(settings.database_path(), PathBuf::from("./sql_app.db"));
    }

    #[test]
    fn system_prompt_lists_tools() {
        let prompt = system_prompt(&["botmailroom_send_email".into(), "web_search".into()]);
        assert!(prompt.contains("the only valid tool names are botmailroom_send_email, web_search"));
        assert!(prompt.contains("Only use one tool at a time"));
    }
}
