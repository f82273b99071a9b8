//! Mail provider I/O: inbound webhook, payload types, outbound client.

pub mod email;
pub mod email_types;
pub mod signature;
pub mod webhook;

pub use email::{BotMailRoomClient, SendEmailRequest};
pub use email_types::{EmailAddress, EmailPayload, PreviousEmail};
pub use webhook::webhook_routes;
