//! Conversational-agent integration.
//!
//! The agent's natural-language understanding lives in an external service;
//! this module owns only the contract: the four typed function declarations,
//! the dispatcher that maps function calls onto invoice mutations, and the
//! bounded resolve-then-reply chat loop.

pub mod chat;
pub mod gemini;
pub mod tools;

pub use chat::{AgentClient, AgentTurn, ChatSession, FunctionCall, system_instruction};
pub use gemini::{GeminiClient, ObservationLanguage, generate_invoice_observation};
pub use tools::{FunctionDeclaration, ToolDispatcher, tool_declarations};
