use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::claude::types::{ChatRequest, ChatResponse, WireMessage};
use crate::error::{EngineError, Result};
use crate::limiter::RateLimiter;
use crate::schema::StructuredOutput;

pub(crate) use crate::claude::client::ClaudeClient;

const STRUCTURED_TOOL: &str = "structured_response";
const REPARSE_SYSTEM_PROMPT: &str =
    "Extract the structured data from the assistant response you are given. \
     Do not add, infer, or omit anything.";

/// Configuration of one agent session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Stable agent identifier, used in raw-dump file names.
    pub agent_id: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Model that reparses free text into the declared schema when the
    /// primary model lacks native structured output.
    pub supplementary_model: Option<String>,
    /// When set, every raw engine response is dumped under
    /// `{raw_dir}/{session_id}/`.
    pub raw_dir: Option<PathBuf>,
}

/// Object-safe seam for agents: the downloader pipeline talks to this trait
/// so tests can substitute a scripted engine.
#[async_trait]
pub trait StructuredSession: Send {
    /// Send one user prompt and return the engine's structured response for
    /// the given schema. On error the prompt has already been removed from
    /// history, so a retry does not compound.
    async fn send_value(&mut self, prompt: &str, schema: serde_json::Value)
        -> Result<serde_json::Value>;

    /// Drop the most recent user/assistant exchange from history.
    fn forget_last_exchange(&mut self);
}

/// Send a prompt and deserialize the structured response into `T`.
/// A schema mismatch clears the exchange from history and surfaces as a
/// retryable [`EngineError::Schema`].
pub async fn send_structured<T, S>(session: &mut S, prompt: &str) -> Result<T>
where
    T: StructuredOutput,
    S: StructuredSession + ?Sized,
{
    let value = session.send_value(prompt, T::engine_schema()).await?;
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            session.forget_last_exchange();
            Err(EngineError::Schema(e.to_string()))
        }
    }
}

/// One agent's conversation with the engine: fixed system prompt, linear
/// history, per-call structured output.
pub struct ChatSession {
    client: ClaudeClient,
    limiter: Arc<RateLimiter>,
    session_id: Uuid,
    params: SessionParams,
    history: Vec<WireMessage>,
}

impl ChatSession {
    pub(crate) fn new(
        client: ClaudeClient,
        limiter: Arc<RateLimiter>,
        params: SessionParams,
    ) -> Self {
        Self {
            client,
            limiter,
            session_id: Uuid::new_v4(),
            params,
            history: Vec::new(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.params.agent_id
    }

    fn base_request(&self, model: &str) -> ChatRequest {
        ChatRequest::new(model)
            .system(&self.params.system_prompt)
            .temperature(self.params.temperature)
            .max_tokens(self.params.max_tokens)
            .messages(self.history.iter().cloned())
    }

    /// Structured output through the engine's native path: one declared tool
    /// the model is forced to call.
    async fn request_native(&self, schema: serde_json::Value) -> Result<serde_json::Value> {
        let request = self.base_request(&self.params.model).forced_tool(
            STRUCTURED_TOOL,
            "Return the result in the declared shape.",
            schema,
        );
        let response = self.client.chat(&request).await?;
        check_stop_reason(&response)?;
        response.tool_input().ok_or(EngineError::Empty)
    }

    /// Structured output through the supplementary model: the primary model
    /// answers in free text, then the supplementary model reparses that text
    /// into the schema at temperature 0.
    async fn request_supplementary(
        &self,
        supplementary: &str,
        schema: serde_json::Value,
    ) -> Result<(serde_json::Value, String)> {
        let request = self.base_request(&self.params.model);
        let response = self.client.chat(&request).await?;
        check_stop_reason(&response)?;
        let text = response.text().ok_or(EngineError::Empty)?;

        self.limiter.acquire(supplementary).await;
        let reparse = ChatRequest::new(supplementary)
            .system(REPARSE_SYSTEM_PROMPT)
            .temperature(0.0)
            .max_tokens(self.params.max_tokens)
            .messages([WireMessage::user(&text)])
            .forced_tool(
                STRUCTURED_TOOL,
                "Extract structured data from the input.",
                schema,
            );
        let parsed = self.client.chat(&reparse).await?;
        let value = parsed.tool_input().ok_or(EngineError::Empty)?;
        Ok((value, text))
    }

    async fn dump_raw(&self, contents: &str) {
        let Some(raw_dir) = &self.params.raw_dir else {
            return;
        };
        let dir = raw_dir.join(self.session_id.to_string());
        let name = format!(
            "{}_{}.txt",
            self.params.agent_id,
            Utc::now().format("%Y%m%dT%H%M%S%3fZ")
        );
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!(error = %e, dir = %dir.display(), "Failed to create raw dump dir");
            return;
        }
        if let Err(e) = tokio::fs::write(dir.join(&name), contents).await {
            warn!(error = %e, file = name, "Failed to write raw dump");
        }
    }
}

#[async_trait]
impl StructuredSession for ChatSession {
    async fn send_value(
        &mut self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.history.push(WireMessage::user(prompt));
        self.limiter.acquire(&self.params.model).await;

        let outcome = match &self.params.supplementary_model {
            None => self.request_native(schema).await.map(|value| {
                let raw = value.to_string();
                (value, raw)
            }),
            Some(supplementary) => {
                let supplementary = supplementary.clone();
                self.request_supplementary(&supplementary, schema).await
            }
        };

        match outcome {
            Ok((value, raw)) => {
                debug!(agent = %self.params.agent_id, "Engine response received");
                self.dump_raw(&raw).await;
                self.history.push(WireMessage::assistant(raw));
                Ok(value)
            }
            Err(e) => {
                // Failed prompts never stay in history: a retry must see the
                // conversation exactly as before the attempt.
                self.history.pop();
                Err(e)
            }
        }
    }

    fn forget_last_exchange(&mut self) {
        if matches!(self.history.last(), Some(m) if m.role == crate::claude::types::Role::Assistant)
        {
            self.history.pop();
        }
        if matches!(self.history.last(), Some(m) if m.role == crate::claude::types::Role::User) {
            self.history.pop();
        }
    }
}

fn check_stop_reason(response: &ChatResponse) -> Result<()> {
    match response.stop_reason.as_deref() {
        None | Some("end_turn") | Some("tool_use") | Some("stop_sequence") => Ok(()),
        Some(other) => Err(EngineError::AbnormalStop(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema, Debug, PartialEq)]
    struct Verdict {
        relation: String,
    }

    /// Scripted engine: returns canned values and records forget calls.
    struct ScriptedSession {
        responses: Vec<serde_json::Value>,
        forgotten: usize,
    }

    #[async_trait]
    impl StructuredSession for ScriptedSession {
        async fn send_value(
            &mut self,
            _prompt: &str,
            _schema: serde_json::Value,
        ) -> Result<serde_json::Value> {
            if self.responses.is_empty() {
                return Err(EngineError::Empty);
            }
            Ok(self.responses.remove(0))
        }

        fn forget_last_exchange(&mut self) {
            self.forgotten += 1;
        }
    }

    #[tokio::test]
    async fn send_structured_deserializes() {
        let mut session = ScriptedSession {
            responses: vec![serde_json::json!({"relation": "direct"})],
            forgotten: 0,
        };
        let verdict: Verdict = send_structured(&mut session, "classify").await.unwrap();
        assert_eq!(verdict.relation, "direct");
        assert_eq!(session.forgotten, 0);
    }

    #[tokio::test]
    async fn schema_mismatch_forgets_exchange_and_is_retryable() {
        let mut session = ScriptedSession {
            responses: vec![serde_json::json!({"unexpected": 1})],
            forgotten: 0,
        };
        let err = send_structured::<Verdict, _>(&mut session, "classify")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Schema(_)));
        assert!(err.is_retryable());
        assert_eq!(session.forgotten, 1);
    }

    #[test]
    fn abnormal_stop_reason_is_rejected() {
        let response = ChatResponse {
            content: vec![],
            stop_reason: Some("max_tokens".to_string()),
        };
        assert!(matches!(
            check_stop_reason(&response),
            Err(EngineError::AbnormalStop(_))
        ));
    }

    #[test]
    fn forget_last_exchange_pops_both_roles() {
        let limiter = Arc::new(RateLimiter::new());
        let client = ClaudeClient::new("test-key");
        let mut session = ChatSession::new(
            client,
            limiter,
            SessionParams {
                agent_id: "classifier".into(),
                model: "model-a".into(),
                system_prompt: "sys".into(),
                temperature: 0.2,
                max_tokens: 1024,
                supplementary_model: None,
                raw_dir: None,
            },
        );
        session.history.push(WireMessage::user("q1"));
        session.history.push(WireMessage::assistant("a1"));
        session.history.push(WireMessage::user("q2"));
        session.history.push(WireMessage::assistant("a2"));

        session.forget_last_exchange();
        assert_eq!(session.history.len(), 2);

        session.forget_last_exchange();
        assert!(session.history.is_empty());

        // No-op on empty history.
        session.forget_last_exchange();
        assert!(session.history.is_empty());
    }
}
