//! Tool-calling response loop.
//!
//! One inbound email becomes a bounded series of model calls. Each cycle
//! either executes the tools the model asked for, or nudges the model back
//! toward tool use. A successful call to a terminal tool (sending the reply
//! email) finishes the loop; otherwise it stops after `max_cycles`.
//!
//! Emails on the same thread are handled one at a time, so each run sees
//! the history written by the previous one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::channels::EmailPayload;
use crate::context::ToolContext;
use crate::error::{Error, ToolError};
use crate::llm::{ChatMessage, LlmProvider, ToolCall, ToolCompletionRequest};
use crate::store::ChatStore;
use crate::tools::ToolRegistry;

/// Appended when the model answers without calling a tool.
pub const TOOL_CALL_NUDGE: &str = "Please respond with a tool call";

/// How a response loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// A terminal tool ran successfully.
    Completed { cycles: u32 },
    /// The cycle limit was reached first.
    Exhausted { cycles: u32 },
}

impl LoopOutcome {
    pub fn cycles(&self) -> u32 {
        match self {
            Self::Completed { cycles } | Self::Exhausted { cycles } => *cycles,
        }
    }
}

/// Dependencies and limits for running response loops.
pub struct ResponseLoop {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ChatStore>,
    system_prompt: String,
    max_cycles: u32,
    /// One lock per thread key with a run in flight.
    thread_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResponseLoop {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ChatStore>,
        system_prompt: impl Into<String>,
        max_cycles: u32,
    ) -> Self {
        Self {
            llm,
            tools,
            store,
            system_prompt: system_prompt.into(),
            max_cycles,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_cycles(&self) -> u32 {
        self.max_cycles
    }

    /// Handle one inbound email end to end.
    pub async fn handle_email(&self, payload: &EmailPayload) -> Result<LoopOutcome, Error> {
        tracing::info!(
            from = %payload.from_address.address,
            email_id = %payload.id,
            "Received email"
        );

        let chat_id = payload.thread_key();
        let lock = self.thread_lock(chat_id).await;
        let guard = lock.lock().await;
        let result = self.handle_locked(chat_id, payload).await;
        drop(guard);
        self.release_thread_lock(chat_id, lock).await;
        result
    }

    async fn handle_locked(
        &self,
        chat_id: &str,
        payload: &EmailPayload,
    ) -> Result<LoopOutcome, Error> {
        let mut thread = match self.store.load_thread(chat_id).await? {
            Some(thread) => thread,
            None => vec![ChatMessage::system(&self.system_prompt)],
        };
        thread.push(ChatMessage::user(&payload.thread_prompt));
        self.store.save_thread(chat_id, &thread).await?;

        let outcome = self.run(chat_id, &mut thread).await?;
        match outcome {
            LoopOutcome::Completed { cycles } => {
                tracing::info!(chat_id, cycles, "Response loop completed")
            }
            LoopOutcome::Exhausted { cycles } => {
                tracing::warn!(chat_id, cycles, "Response loop hit the cycle limit")
            }
        }
        Ok(outcome)
    }

    async fn thread_lock(&self, chat_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().await;
        Arc::clone(locks.entry(chat_id.to_string()).or_default())
    }

    /// Drop the map entry once no other run holds or waits on it.
    async fn release_thread_lock(&self, chat_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.thread_locks.lock().await;
        // The map and `lock` are the only owners when nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(chat_id);
        }
    }

    /// Drive the model over `thread` until a terminal tool succeeds or cycles run out.
    ///
    /// The thread is persisted after every cycle.
    pub async fn run(
        &self,
        chat_id: &str,
        thread: &mut Vec<ChatMessage>,
    ) -> Result<LoopOutcome, Error> {
        let tool_defs = self.tools.tool_definitions();

        for cycle in 1..=self.max_cycles {
            let request = ToolCompletionRequest::new(thread.clone(), tool_defs.clone());
            let response = self.llm.complete_with_tools(request).await?;

            let mut ended = false;
            if response.tool_calls.is_empty() {
                tracing::warn!(
                    chat_id,
                    cycle,
                    content = response.content.as_deref().unwrap_or(""),
                    "Invalid response from model: no tool call"
                );
                thread.push(ChatMessage::user(TOOL_CALL_NUDGE));
            } else {
                thread.push(response.to_message());
                for call in &response.tool_calls {
                    let ctx = ToolContext::new(chat_id, cycle, &call.id);
                    let (content, terminal) = self.execute_tool_call(call, &ctx).await;
                    ended |= terminal;
                    thread.push(ChatMessage::tool_result(
                        &call.id,
                        &call.function.name,
                        content,
                    ));
                }
            }

            self.store.save_thread(chat_id, thread).await?;

            if ended {
                return Ok(LoopOutcome::Completed { cycles: cycle });
            }
        }

        Ok(LoopOutcome::Exhausted {
            cycles: self.max_cycles,
        })
    }

    /// Run one tool call. Returns the tool message content and whether it ended the loop.
    ///
    /// Failures become the tool message so the model can correct itself.
    async fn execute_tool_call(&self, call: &ToolCall, ctx: &ToolContext) -> (String, bool) {
        let name = call.function.name.as_str();
        tracing::info!(
            tool = name,
            args = %call.function.arguments,
            chat_id = %ctx.chat_id,
            cycle = ctx.cycle,
            call_id = %ctx.tool_call_id,
            "Tool call"
        );

        let result = match self.tools.get(name) {
            None => Err(ToolError::NotFound {
                name: name.to_string(),
            }),
            Some(tool) => match parse_arguments(&call.function.arguments) {
                Ok(params) => tool
                    .execute(params, ctx)
                    .await
                    .map(|output| (output, tool.ends_conversation())),
                Err(e) => Err(e),
            },
        };

        match result {
            Ok((output, terminal)) => {
                tracing::info!(
                    tool = name,
                    elapsed_ms = output.duration.as_millis() as u64,
                    output = %output.content,
                    "Tool output"
                );
                (output.content, terminal)
            }
            Err(e) => {
                tracing::warn!(
                    tool = name,
                    call_id = %ctx.tool_call_id,
                    elapsed_ms = ctx.elapsed_ms(),
                    error = %e,
                    "Tool call failed"
                );
                (format!("Error: {e}"), false)
            }
        }
    }
}

/// Parse model-produced arguments. An empty string means no arguments.
fn parse_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::InvalidParameters(format!("arguments are not valid JSON: {e}")))
}
