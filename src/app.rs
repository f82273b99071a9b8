//! Startup wiring: settings in, router out.

use std::sync::Arc;

use axum::Router;

use crate::agent::ResponseLoop;
use crate::channels::{BotMailRoomClient, webhook_routes};
use crate::config::{Settings, system_prompt};
use crate::error::Error;
use crate::llm::{LlmConfig, create_provider};
use crate::store::{ChatStore, LibSqlBackend};
use crate::tools::ToolRegistry;
use crate::tools::builtin::{ExaClient, SendEmailTool, WebSearchTool};

/// A fully wired service.
pub struct App {
    pub router: Router,
    pub agent: Arc<ResponseLoop>,
    pub store: Arc<dyn ChatStore>,
}

/// Register the tools enabled by `settings`.
pub fn build_tools(settings: &Settings) -> ToolRegistry {
    let mut tools = ToolRegistry::new();

    let mailroom = Arc::new(BotMailRoomClient::new(
        &settings.botmailroom_base_url,
        settings.botmailroom_api_key.clone(),
    ));
    tools.register(Arc::new(SendEmailTool::new(mailroom)));

    match settings.exa_api_key {
        Some(ref key) => {
            let exa = Arc::new(ExaClient::new(&settings.exa_base_url, key.clone()));
            tools.register(Arc::new(WebSearchTool::new(exa)));
        }
        None => tracing::info!("EXA_API_KEY not set, web_search disabled"),
    }

    tools
}

/// Open the store, create clients and tools, and build the router.
pub async fn build(settings: &Settings) -> Result<App, Error> {
    let store: Arc<dyn ChatStore> =
        Arc::new(LibSqlBackend::new_local(&settings.database_path()).await?);

    let llm = create_provider(&LlmConfig {
        api_key: settings.openai_api_key.clone(),
        api_base: settings.openai_base_url.clone(),
        model: settings.model.clone(),
    })?;

    let tools = Arc::new(build_tools(settings));
    let tool_names = tools.list();
    tracing::info!(tools = %tool_names.join(", "), "Tools registered");

    let agent = Arc::new(ResponseLoop::new(
        llm,
        tools,
        Arc::clone(&store),
        system_prompt(&tool_names),
        settings.max_response_cycles,
    ));

    let router = webhook_routes(
        Arc::clone(&agent),
        settings.botmailroom_webhook_secret.clone(),
    );

    Ok(App {
        router,
        agent,
        store,
    })
}
