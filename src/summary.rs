//! Optional comment summaries from an OpenAI-compatible chat completions API.
//!
//! Summaries are an enrichment: a failed request is logged and the report is
//! rendered without one.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ReportError;
use crate::models::CommentBundle;

pub const DEFAULT_TEACHER_PROMPT: &str = "A seguir, há comentários de alunos de todas as turmas de um professor. Resuma os pontos fortes e os pontos a melhorar.";

pub const DEFAULT_CLASS_PROMPT: &str = "A seguir, há uma lista de comentários de alunos sobre o professor. Escreva um resumo deles e sugira melhorias.";

pub struct SummaryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

impl SummaryClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ReportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Summary(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub async fn summarize(&self, instruction: &str, input: &str) -> Result<String, ReportError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "developer",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
        };

        let mut request = self.client.post(self.chat_completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReportError::Summary(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReportError::Summary(format!("HTTP {status}: {text}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReportError::Summary(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ReportError::Summary("no choices in response".to_string()))
    }
}

/// Runs [`SummaryClient::summarize`] and swallows any failure.
pub async fn summarize_best_effort(
    client: Option<&SummaryClient>,
    instruction: &str,
    input: &str,
) -> Option<String> {
    let Some(client) = client else {
        warn!("comment summary requested but no summary client is configured");
        return None;
    };

    match client.summarize(instruction, input).await {
        Ok(summary) => {
            info!(chars = summary.chars().count(), "comment summary generated");
            Some(summary)
        }
        Err(err) => {
            warn!(error = %err, "comment summary unavailable");
            None
        }
    }
}

/// Concatenates the three comment categories of `bundles` into one prompt.
pub fn summary_input<'a>(bundles: impl IntoIterator<Item = &'a CommentBundle> + Clone) -> String {
    let join = |pick: fn(&CommentBundle) -> &Vec<String>| {
        bundles
            .clone()
            .into_iter()
            .flat_map(pick)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };

    format!(
        "Continue fazendo: {}\nPare de fazer: {}\nComece a fazer: {}",
        join(|b| &b.continue_doing),
        join(|b| &b.stop_doing),
        join(|b| &b.start_doing),
    )
}
