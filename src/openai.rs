//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::QuestionPayload;
use crate::util::fill_template;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
  #[error("llm is disabled")]
  Disabled,
  #[error("llm network error: {0}")]
  Network(#[from] reqwest::Error),
  #[error("llm api error: status={status}, message={message}")]
  Api { status: u16, message: String },
  #[error("llm returned malformed JSON: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("llm returned unusable content: {0}")]
  Invalid(String),
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

/// Exercise as returned by the generator prompt.
#[derive(Debug, Deserialize)]
pub struct GeneratedExercise {
  pub title: String,
  pub questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedQuestion {
  pub prompt: String,
  #[serde(flatten)]
  pub payload: QuestionPayload,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model = std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model = std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder().timeout(Duration::from_secs(20)).build().ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  async fn complete(&self, req: &ChatCompletionRequest) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let started = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "grammar-trainer-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      error!(status, elapsed_ms = started.elapsed().as_millis() as u64, "OpenAI call failed");
      return Err(LlmError::Api { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "OpenAI usage"
      );
    }
    Ok(body.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default())
  }

  /// Plain-text chat completion. Used for feedback and tutor replies.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_plain(&self, model: &str, system: &str, user: &str, temperature: f32) -> Result<String, LlmError> {
    let req = ChatCompletionRequest::new(model, system, user, temperature, None);
    let text = self.complete(&req).await?.trim().to_string();
    if text.is_empty() {
      return Err(LlmError::Invalid("empty completion".into()));
    }
    Ok(text)
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, LlmError> {
    let req = ChatCompletionRequest::new(model, system, user, temperature, Some(ResponseFormat { r#type: "json_object".into() }));
    let text = self.complete(&req).await?;
    Ok(serde_json::from_str::<T>(&text)?)
  }

  // --- High-level helpers (domain-specialized) ---

  /// Semantic/grammar check of a free-text answer against the reference.
  #[instrument(level = "info", skip(self, prompts, prompt, reference, answer),
               fields(reference_len = reference.len(), answer_len = answer.len()))]
  pub async fn check_translation(
    &self,
    prompts: &Prompts,
    prompt: &str,
    reference: &str,
    answer: &str,
  ) -> Result<(bool, String), LlmError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Val {
      is_correct: bool,
      #[serde(default)]
      explanation: String,
    }

    let user = fill_template(
      &prompts.translate_check_user_template,
      &[("prompt", prompt), ("reference", reference), ("answer", answer)],
    );
    let v: Val = self.chat_json(&self.strong_model, &prompts.translate_check_system, &user, 0.0).await?;
    Ok((v.is_correct, v.explanation))
  }

  /// Short explanation of why an answer was wrong.
  #[instrument(level = "info", skip(self, prompts, prompt, expected, answer), fields(answer_len = answer.len()))]
  pub async fn explain_mistake(
    &self,
    prompts: &Prompts,
    prompt: &str,
    expected: &str,
    answer: &str,
  ) -> Result<String, LlmError> {
    let user = fill_template(
      &prompts.feedback_user_template,
      &[("prompt", prompt), ("expected", expected), ("answer", answer)],
    );
    self.chat_plain(&self.fast_model, &prompts.feedback_system, &user, 0.2).await
  }

  #[instrument(level = "info", skip(self, prompts, question, context), fields(question_len = question.len(), has_context = context.is_some()))]
  pub async fn tutor_reply(&self, prompts: &Prompts, question: &str, context: Option<&str>) -> Result<String, LlmError> {
    let user = match context {
      Some(ctx) => format!("Question: {}\n\nContext:\n{}", question, ctx),
      None => format!("Question: {}", question),
    };
    self.chat_plain(&self.fast_model, &prompts.tutor_system, &user, 0.2).await
  }

  /// Generate a fresh exercise on a grammar topic.
  #[instrument(level = "info", skip(self, prompts), fields(model = %self.strong_model))]
  pub async fn generate_exercise(
    &self,
    prompts: &Prompts,
    topic: &str,
    level: &str,
    count: usize,
  ) -> Result<GeneratedExercise, LlmError> {
    let count = count.to_string();
    let user = fill_template(&prompts.generate_user_template, &[("topic", topic), ("level", level), ("count", &count)]);
    let started = Instant::now();
    let generated: GeneratedExercise = self.chat_json(&self.strong_model, &prompts.generate_system, &user, 0.8).await?;
    if generated.questions.is_empty() {
      return Err(LlmError::Invalid("generated exercise has no questions".into()));
    }
    info!(elapsed_ms = started.elapsed().as_millis() as u64, questions = generated.questions.len(), title = %generated.title, "Exercise generated");
    Ok(generated)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

impl ChatCompletionRequest {
  fn new(model: &str, system: &str, user: &str, temperature: f32, response_format: Option<ResponseFormat>) -> Self {
    Self {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format,
    }
  }
}

#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
