//! Mailroom agent: email-triggered tool-calling assistant.

pub mod agent;
pub mod app;
pub mod channels;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod store;
pub mod tools;
