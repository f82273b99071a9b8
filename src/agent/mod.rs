//! Agent module: the tool-calling response loop.

pub mod response_loop;

pub use response_loop::{LoopOutcome, ResponseLoop, TOOL_CALL_NUDGE};
