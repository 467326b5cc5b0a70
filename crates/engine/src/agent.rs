use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use common::{Error, Result};

use crate::TradingTools;

const DEFAULT_MAX_ROUNDS: usize = 8;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One message of the agent conversation, in chat-completions wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as produced by the model.
    #[serde(default)]
    pub arguments: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<ToolCall>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ToolCall>>::deserialize(deserializer)?.unwrap_or_default())
}

fn function_kind() -> String {
    "function".to_string()
}

impl AgentMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::text("tool", content)
        }
    }

    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Something that turns a prompt into trading actions.
///
/// Implementations run tool calls through `tools` and return the full
/// conversation, newest message last.
#[async_trait]
pub trait DecisionAgent: Send + Sync {
    async fn decide(
        &self,
        system_prompt: &str,
        instruction: &str,
        tools: &TradingTools,
    ) -> Result<Vec<AgentMessage>>;
}

/// OpenAI-compatible chat-completions agent with function calling.
pub struct OpenAiAgent {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f64>,
    max_rounds: usize,
}

impl OpenAiAgent {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: Option<f64>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            max_rounds: DEFAULT_MAX_ROUNDS,
        })
    }

    /// Cap on model round-trips per decision.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    fn request_body(&self, messages: &[AgentMessage], tools: &Value) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
        });
        // Some models only accept their default temperature.
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    async fn complete(&self, messages: &[AgentMessage], tools: &Value) -> Result<AgentMessage> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, tools))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Agent(format!("HTTP {status}: {body}")));
        }

        parse_completion(&body)
    }
}

/// Extract the assistant message from a chat-completions response body.
pub fn parse_completion(body: &str) -> Result<AgentMessage> {
    let mut json: Value = serde_json::from_str(body)?;
    let message = json
        .pointer_mut("/choices/0/message")
        .map(Value::take)
        .filter(|m| !m.is_null())
        .ok_or_else(|| Error::Agent("response contained no choices".into()))?;
    Ok(serde_json::from_value(message)?)
}

#[async_trait]
impl DecisionAgent for OpenAiAgent {
    async fn decide(
        &self,
        system_prompt: &str,
        instruction: &str,
        tools: &TradingTools,
    ) -> Result<Vec<AgentMessage>> {
        let definitions = tools.definitions();
        let mut messages = vec![
            AgentMessage::system(system_prompt),
            AgentMessage::user(instruction),
        ];

        for round in 1..=self.max_rounds {
            let reply = self.complete(&messages, &definitions).await?;
            let calls = reply.tool_calls.clone();
            messages.push(reply);

            if calls.is_empty() {
                info!(rounds = round, "Agent finished");
                return Ok(messages);
            }

            for call in calls {
                debug!(tool = %call.function.name, args = %call.function.arguments, "Tool call");
                let output = tools
                    .invoke(&call.function.name, &call.function.arguments)
                    .await;
                info!(tool = %call.function.name, result = %output, "Tool result");
                messages.push(AgentMessage::tool(call.id, output));
            }
        }

        warn!(max_rounds = self.max_rounds, "Agent did not finish");
        Err(Error::Agent(format!(
            "no final answer after {} rounds",
            self.max_rounds
        )))
    }
}
