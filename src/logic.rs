//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Checking answers through the question state machine
//!   - Recording attempts and listing scored sessions
//!   - AI helpers (translate check, mistake feedback, tutor, generation) with local fallbacks

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{Exercise, Question};
use crate::error::ApiError;
use crate::openai::LlmError;
use crate::protocol::GenerateIn;
use crate::quiz::{Candidate, LogNotifier, QuestionMachine, TranslateChecker};
use crate::sessions::{aggregate, SessionPage};
use crate::state::AppState;
use crate::util::{normalize_sentence, trunc_for_log};

const MAX_GENERATED_QUESTIONS: usize = 20;

/// Translate checker backed by OpenAI, or by a normalized comparison with the
/// reference answer when no API key is configured.
pub struct AiChecker<'a> {
  pub state: &'a AppState,
}

impl TranslateChecker for AiChecker<'_> {
  type Error = LlmError;

  async fn check_translation(&self, prompt: &str, reference: &str, answer: &str) -> Result<bool, LlmError> {
    match &self.state.openai {
      Some(oa) => {
        let (ok, explanation) = oa.check_translation(&self.state.prompts, prompt, reference, answer).await?;
        debug!(target: "quiz", ok, explanation = %trunc_for_log(&explanation, 120), "Remote translate verdict");
        Ok(ok)
      }
      None => Ok(normalize_sentence(reference) == normalize_sentence(answer)),
    }
  }
}

/// One-shot check of an answer (HTTP path). Does not record an attempt.
#[instrument(level = "info", skip(state, candidate), fields(%question_id, kind = candidate.kind().as_str()))]
pub async fn check_answer(state: &AppState, question_id: &str, candidate: &Candidate) -> Result<bool, ApiError> {
  let question = state.get_question(question_id).await.ok_or_else(|| ApiError::not_found("question", question_id))?;
  let mut machine = QuestionMachine::new(question, state.translate_timeout);
  let is_correct = machine.submit(candidate, &AiChecker { state }, &LogNotifier).await?;
  Ok(is_correct)
}

#[instrument(level = "info", skip(state))]
pub async fn record_attempt(state: &AppState, user_id: &str, question_id: &str, is_correct: bool) -> Result<crate::domain::Attempt, ApiError> {
  if user_id.trim().is_empty() {
    return Err(ApiError::BadRequest("userId is required".into()));
  }
  if state.get_question(question_id).await.is_none() {
    return Err(ApiError::not_found("question", question_id));
  }
  let attempt = state.record_attempt(user_id, question_id, is_correct, Utc::now()).await;
  info!(target: "sessions", %user_id, %question_id, is_correct, "Attempt recorded");
  Ok(attempt)
}

#[instrument(level = "info", skip(state))]
pub async fn list_sessions(state: &AppState, user_id: &str, page: usize) -> SessionPage {
  let (records, names) = state.attempt_records(user_id).await;
  aggregate(&records, &names, page)
}

/// Explanation for a wrong answer. Never fails: falls back to a local hint.
#[instrument(level = "info", skip(state, question, answer), fields(question_id = %question.id))]
pub async fn feedback_text(state: &AppState, question: &Question, answer: &str) -> String {
  let expected = question.payload.expected_text();
  if let Some(oa) = &state.openai {
    match oa.explain_mistake(&state.prompts, &question.prompt, &expected, answer).await {
      Ok(t) => return t,
      Err(e) => error!(target: "grammar_backend", question_id = %question.id, error = %e, "OpenAI feedback failed; using local hint."),
    }
  }
  feedback_stub(question, &expected)
}

#[instrument(level = "info", skip(state, message), fields(%user_id, message_len = message.len()))]
pub async fn tutor_reply(state: &AppState, user_id: &str, message: &str, question_id: Option<&str>) -> Result<String, ApiError> {
  if message.trim().is_empty() {
    return Err(ApiError::BadRequest("message is blank".into()));
  }
  let limit = state.tutor_limiter.check(user_id).await;
  if !limit.allowed {
    warn!(target: "grammar_backend", %user_id, limit = limit.limit, "Tutor rate limit exceeded");
    return Err(ApiError::RateLimited { retry_after: limit.reset_after });
  }
  debug!(target: "grammar_backend", %user_id, remaining = limit.remaining, "Tutor request admitted");

  let context = match question_id {
    Some(id) => state.get_question(id).await.map(|q| format!("Exercise question: {}", q.prompt)),
    None => None,
  };

  match &state.openai {
    Some(oa) => match oa.tutor_reply(&state.prompts, message, context.as_deref()).await {
      Ok(t) => Ok(t),
      Err(e) => {
        error!(target: "grammar_backend", %user_id, error = %e, "Tutor reply failed; using stub.");
        Ok(tutor_stub(message))
      }
    },
    None => Ok(tutor_stub(message)),
  }
}

/// Generate and store a new exercise. Requires OpenAI.
#[instrument(level = "info", skip(state, req), fields(topic = %req.topic, level = %req.level, count = req.count))]
pub async fn generate_exercise(state: &AppState, req: GenerateIn) -> Result<(Exercise, Vec<Question>), ApiError> {
  if req.topic.trim().is_empty() {
    return Err(ApiError::BadRequest("topic is blank".into()));
  }
  let oa = state.openai.as_ref().ok_or(ApiError::Llm(LlmError::Disabled))?;
  let count = req.count.clamp(1, MAX_GENERATED_QUESTIONS);
  let generated = oa.generate_exercise(&state.prompts, &req.topic, &req.level, count).await?;
  let (exercise, questions) = state
    .insert_generated(generated, req.lesson_id)
    .await
    .ok_or_else(|| LlmError::Invalid("no usable generated questions".into()))?;
  info!(target: "grammar_backend", exercise_id = %exercise.id, questions = questions.len(), "Generated exercise stored");
  Ok((exercise, questions))
}

// -------- Local fallbacks --------

fn feedback_stub(question: &Question, expected: &str) -> String {
  format!("Not quite. The expected answer is \"{}\". Re-read the rule for: {}", expected, question.prompt)
}

/// Tiny tutor fallback that recognizes a few common grammar topics.
fn tutor_stub(text: &str) -> String {
  let lower = text.to_lowercase();
  if lower.contains("present simple") || lower.contains("-s") || lower.contains("third person") {
    "In the present simple, add -s or -es to the verb after he, she and it: \"She works\", \"He goes\".".into()
  } else if lower.contains("past") {
    "Use the past simple for finished actions at a known time. Regular verbs add -ed; irregular ones change (go → went).".into()
  } else if lower.contains("article") || lower.contains(" a ") || lower.contains(" an ") {
    "Use \"a\" before consonant sounds and \"an\" before vowel sounds: a cat, an hour.".into()
  } else {
    "Ask about a specific rule (for example the present simple -s, past tense forms or articles) for a focused explanation.".into()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ContentConfig;

  fn state() -> AppState {
    AppState::with_config(ContentConfig::default(), None)
  }

  #[tokio::test]
  async fn offline_translate_check_compares_with_reference() {
    let s = state();
    let good = Candidate::Translate { text: "she works in a HOSPITAL".into() };
    let bad = Candidate::Translate { text: "She work in hospital".into() };
    assert!(check_answer(&s, "q-ps-4", &good).await.unwrap());
    assert!(!check_answer(&s, "q-ps-4", &bad).await.unwrap());
  }

  #[tokio::test]
  async fn unknown_question_is_not_found() {
    let err = check_answer(&state(), "missing", &Candidate::Choice { index: Some(0) }).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));
  }

  #[tokio::test]
  async fn recorded_attempts_show_up_as_sessions() {
    let s = state();
    record_attempt(&s, "u1", "q-ps-1", true).await.unwrap();
    record_attempt(&s, "u1", "q-ps-2", false).await.unwrap();
    let page = list_sessions(&s, "u1", 1).await;
    let total_questions: usize = page.sessions.iter().map(|x| x.total_questions).sum();
    assert_eq!(total_questions, 2);
    assert!(list_sessions(&s, "someone-else", 1).await.sessions.is_empty());
  }

  #[tokio::test]
  async fn tutor_is_rate_limited_per_user() {
    let mut cfg = ContentConfig::default();
    cfg.tutor.max_requests = 1;
    let s = AppState::with_config(cfg, None);
    assert!(tutor_reply(&s, "u1", "Why \"he goes\"?", None).await.is_ok());
    assert!(matches!(tutor_reply(&s, "u1", "And past?", None).await, Err(ApiError::RateLimited { .. })));
    assert!(tutor_reply(&s, "u2", "And past?", None).await.is_ok());
  }

  #[tokio::test]
  async fn generation_requires_ai() {
    let req = GenerateIn { topic: "articles".into(), level: "a2".into(), count: 3, lesson_id: None };
    assert!(matches!(generate_exercise(&state(), req).await, Err(ApiError::Llm(LlmError::Disabled))));
  }

  #[tokio::test]
  async fn feedback_falls_back_to_expected_answer() {
    let s = state();
    let q = s.get_question("q-ps-1").await.unwrap();
    assert!(feedback_text(&s, &q, "go").await.contains("\"goes\""));
  }
}
