use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::NarrativeError;
use crate::narrative::NarrativeService;

/// Settings for the chat-completion client, resolved from config at start-up.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
    pub temperature: f64,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Chat-completion backed narrative generator.
pub struct OpenAiNarrator {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiNarrator {
    pub fn new(config: OpenAiConfig) -> Result<Self, Report<NarrativeError>> {
        let client = reqwest::Client::builder()
            .build()
            .change_context(NarrativeError::Request)?;
        Ok(Self { client, config })
    }

    async fn complete(&self, prompt: &str) -> Result<String, Report<NarrativeError>> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .change_context(NarrativeError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let kind = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NarrativeError::Authentication,
                StatusCode::TOO_MANY_REQUESTS => NarrativeError::RateLimited,
                _ => NarrativeError::Request,
            };
            return Err(Report::new(kind).attach(format!("HTTP status: {status}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .change_context(NarrativeError::MalformedResponse)?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                Report::new(NarrativeError::MalformedResponse).attach("no message content")
            })
    }
}

impl NarrativeService for OpenAiNarrator {
    fn generate(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<String, Report<NarrativeError>>> {
        let prompt = prompt.to_owned();
        Box::pin(async move {
            debug!(model = %self.config.model, "requesting narrative");
            let timeout = self.config.timeout;

            let text = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Report::new(NarrativeError::Cancelled));
                }
                result = tokio::time::timeout(timeout, self.complete(&prompt)) => match result {
                    Ok(text) => text?,
                    Err(_) => {
                        return Err(Report::new(NarrativeError::Timeout {
                            secs: timeout.as_secs(),
                        })
                        .attach(format!("timeout: {timeout:?}")));
                    }
                },
            };

            info!(model = %self.config.model, chars = text.len(), "narrative generated");
            Ok(text)
        })
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
