//! Gemini `generateContent` transport.
//!
//! Keeps the conversation contents client-side and declares the invoice
//! tools on every request. Built only when an API key is configured.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::config::AgentConfig;
use crate::error::AgentError;

use super::chat::{AgentClient, AgentTurn, FunctionCall};
use super::tools::{FunctionDeclaration, tool_declarations};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCallPart {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponsePart {
    name: String,
    response: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolGroup {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn text_part(text: impl Into<String>) -> Part {
    Part {
        text: Some(text.into()),
        ..Part::default()
    }
}

#[derive(Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    model: String,
    system_instruction: String,
    contents: Vec<Content>,
}

impl GeminiClient {
    /// Build from configuration; `Unavailable` when no key is set.
    pub fn from_config(config: &AgentConfig, system_instruction: String) -> Result<Self, AgentError> {
        let api_key = config.api_key.clone().ok_or(AgentError::Unavailable)?;
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| AgentError::Protocol(e.to_string()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model: config.model.clone(),
            system_instruction,
            contents: Vec::new(),
        })
    }

    /// Point requests at a different host, for test doubles.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    async fn generate(
        &self,
        contents: &[Content],
        system: Option<&str>,
        tools: bool,
        generation_config: Option<Value>,
    ) -> Result<Content, AgentError> {
        let url = self
            .base_url
            .join(&format!("/v1beta/models/{}:generateContent", self.model))
            .map_err(|e| AgentError::Protocol(e.to_string()))?;

        let request = GenerateRequest {
            system_instruction: system.map(|text| Content {
                role: "system".to_string(),
                parts: vec![text_part(text)],
            }),
            contents,
            tools: tools.then(|| {
                vec![ToolGroup {
                    function_declarations: tool_declarations(),
                }]
            }),
            generation_config,
        };

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "agent request rejected");
            return Err(AgentError::Http(format!("{status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Protocol(e.to_string()))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| AgentError::Protocol("response carried no candidate".to_string()))
    }

    /// Run one chat turn: send the accumulated history, record the model's
    /// reply in it, and surface the reply as an [`AgentTurn`].
    async fn chat_turn(&mut self) -> Result<AgentTurn, AgentError> {
        let reply = self
            .generate(&self.contents, Some(&self.system_instruction), true, None)
            .await?;

        let mut turn = AgentTurn::default();
        for part in &reply.parts {
            if let Some(text) = &part.text {
                match &mut turn.text {
                    Some(existing) => existing.push_str(text),
                    None => turn.text = Some(text.clone()),
                }
            }
            if let Some(call) = &part.function_call {
                turn.function_calls.push(FunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                });
            }
        }
        self.contents.push(reply);
        Ok(turn)
    }

    /// One-shot observation text for an invoice, no tools involved.
    pub async fn generate_observation(
        &self,
        client_name: &str,
        amount: Decimal,
        service: &str,
        lang: ObservationLanguage,
    ) -> Result<String, AgentError> {
        let contents = vec![Content {
            role: "user".to_string(),
            parts: vec![text_part(lang.prompt(client_name, amount, service))],
        }];
        let config = json!({
            "temperature": 0.5,
            "topP": 0.95,
            "maxOutputTokens": 100,
        });
        let reply = self.generate(&contents, None, false, Some(config)).await?;
        let text: String = reply
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            return Err(AgentError::Protocol("empty observation reply".to_string()));
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl AgentClient for GeminiClient {
    async fn send_user_text(&mut self, text: &str) -> Result<AgentTurn, AgentError> {
        self.contents.push(Content {
            role: "user".to_string(),
            parts: vec![text_part(text)],
        });
        self.chat_turn().await
    }

    async fn send_tool_result(
        &mut self,
        name: &str,
        result: Value,
    ) -> Result<AgentTurn, AgentError> {
        self.contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part {
                function_response: Some(FunctionResponsePart {
                    name: name.to_string(),
                    response: json!({ "result": result }),
                }),
                ..Part::default()
            }],
        });
        self.chat_turn().await
    }
}

/// Output language for generated invoice observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationLanguage {
    Pt,
    En,
}

impl ObservationLanguage {
    fn prompt(self, client_name: &str, amount: Decimal, service: &str) -> String {
        match self {
            Self::Pt => format!(
                "Gere uma breve observacao profissional para uma nota fiscal em portugues. \
                 Cliente: \"{client_name}\", Valor: R$ {amount:.2}, Servico: \"{service}\". \
                 A observacao deve ser concisa e formal."
            ),
            Self::En => format!(
                "Generate a brief, professional observation for an invoice in English. \
                 Client: \"{client_name}\", Amount: $ {amount:.2}, Service: \"{service}\". \
                 The observation should be concise and formal."
            ),
        }
    }

    fn unavailable_message(self) -> &'static str {
        match self {
            Self::Pt => "Servico de IA indisponivel. Por favor, configure a chave de API.",
            Self::En => "AI Service unavailable. Please configure the API key.",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Pt => "Erro ao gerar observacao. Tente novamente.",
            Self::En => "Error generating observation. Please try again.",
        }
    }
}

/// Observation text for the create-invoice form, degrading to a fixed
/// message when the agent is unconfigured or the request fails.
pub async fn generate_invoice_observation(
    client: Option<&GeminiClient>,
    client_name: &str,
    amount: Decimal,
    service: &str,
    lang: ObservationLanguage,
) -> String {
    let Some(client) = client else {
        return lang.unavailable_message().to_string();
    };
    match client
        .generate_observation(client_name, amount, service, lang)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "observation generation failed");
            lang.failure_message().to_string()
        }
    }
}
