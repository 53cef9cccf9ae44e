//! Bounded chat loop over an external conversational agent.
//!
//! The agent replies with either text or function calls; the session
//! resolves one call per model turn and feeds the structured result back
//! until a text reply arrives. A misbehaving agent cannot spin forever: the
//! per-message round bound cuts the loop.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::invoice::format_calendar_date;

use super::gemini::GeminiClient;
use super::tools::ToolDispatcher;

/// A function-call request emitted by the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Value,
}

/// One model turn: free text, function calls, or both.
#[derive(Debug, Clone, Default)]
pub struct AgentTurn {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
}

/// Transport to the external agent. Implementations keep the conversation
/// history; the session only drives turns.
#[async_trait]
pub trait AgentClient: Send {
    async fn send_user_text(&mut self, text: &str) -> Result<AgentTurn, AgentError>;
    async fn send_tool_result(&mut self, name: &str, result: Value)
    -> Result<AgentTurn, AgentError>;
}

/// System instruction given to the agent, mirroring the app's chatbot rules.
pub fn system_instruction(today: NaiveDate) -> String {
    format!(
        "You are a highly capable assistant for an invoice management app called NotaFacil.\n\
         Your primary purpose is to help users manage their invoices. You can create, update, \
         delete, or provide details about invoices.\n\
         Use the provided tools to perform invoice actions when requested by the user.\n\
         For destructive actions like deleting an invoice, you MUST ask for user confirmation \
         before calling the 'deleteInvoice' function.\n\
         The current date is {}.\n\
         Always respond in the user's language.\n\
         When creating an invoice, the issue date is always today; you only need to ask for \
         the due date.",
        format_calendar_date(today)
    )
}

/// Chat session binding an agent transport to the invoice tool dispatcher.
pub struct ChatSession<C> {
    client: C,
    dispatcher: ToolDispatcher,
    max_tool_rounds: usize,
}

impl ChatSession<GeminiClient> {
    /// Build a Gemini-backed session, or `Unavailable` when no credential
    /// is configured; the chatbot surface disables itself in that case.
    pub fn gemini(
        config: &AgentConfig,
        dispatcher: ToolDispatcher,
        today: NaiveDate,
    ) -> Result<Self, AgentError> {
        let client = GeminiClient::from_config(config, system_instruction(today))?;
        Ok(Self::new(client, dispatcher, config.max_tool_rounds))
    }
}

impl<C: AgentClient> ChatSession<C> {
    pub fn new(client: C, dispatcher: ToolDispatcher, max_tool_rounds: usize) -> Self {
        Self {
            client,
            dispatcher,
            max_tool_rounds,
        }
    }

    /// Send one user message and drive the tool loop to a final text reply.
    pub async fn send(&mut self, text: &str) -> Result<String, AgentError> {
        let mut turn = self.client.send_user_text(text).await?;

        let mut rounds = 0usize;
        // One function call resolved per model turn.
        while let Some(call) = turn.function_calls.first().cloned() {
            rounds += 1;
            if rounds > self.max_tool_rounds {
                tracing::warn!(
                    rounds = self.max_tool_rounds,
                    "agent exceeded tool-call bound"
                );
                return Err(AgentError::ToolLoopExceeded(self.max_tool_rounds));
            }
            let result = self.dispatcher.dispatch(&call.name, &call.args).await;
            turn = self.client.send_tool_result(&call.name, result).await?;
        }

        turn.text
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AgentError::Protocol("agent produced no text reply".to_string()))
    }
}
