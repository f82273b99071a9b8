//! Built-in tools for replying by email and searching the web.

pub mod send_email;
pub mod web_search;

pub use send_email::{SEND_EMAIL_TOOL_NAME, SendEmailTool};
pub use web_search::{ExaClient, WEB_SEARCH_TOOL_NAME, WebSearchTool};
