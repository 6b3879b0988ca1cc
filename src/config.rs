//! Loading content configuration (prompts, limits and an optional lesson bank) from TOML.
//!
//! See `ContentConfig` and `Prompts` for the expected schema. Example:
//!
//! ```toml
//! [tutor]
//! max_requests = 10
//! window_secs = 60
//!
//! [quiz]
//! translate_timeout_secs = 15
//!
//! [[lessons]]
//! id = "present-simple"
//! title = "Present simple"
//! level = "a1"
//! blocks = [{ kind = "paragraph", text = "Use it for habits." }]
//!
//! [[exercises]]
//! id = "ps-1"
//! lesson_id = "present-simple"
//! title = "Habits"
//! questions = [{ prompt = "He ___ to school.", type = "choice", options = ["go", "goes"], correctIndex = 1 }]
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ContentBlock, QuestionPayload};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ContentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub tutor: TutorLimitCfg,
  #[serde(default)]
  pub quiz: QuizCfg,
  #[serde(default)]
  pub lessons: Vec<LessonCfg>,
  #[serde(default)]
  pub exercises: Vec<ExerciseCfg>,
}

/// Sliding-window budget for the AI tutor, per user.
#[derive(Clone, Debug, Deserialize)]
pub struct TutorLimitCfg {
  pub max_requests: usize,
  pub window_secs: u64,
}

impl Default for TutorLimitCfg {
  fn default() -> Self {
    Self { max_requests: 10, window_secs: 60 }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuizCfg {
  /// Upper bound on the remote translate check; expiry counts as incorrect.
  pub translate_timeout_secs: u64,
}

impl Default for QuizCfg {
  fn default() -> Self {
    Self { translate_timeout_secs: 15 }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LessonCfg {
  pub id: String,
  pub title: String,
  pub level: String,
  #[serde(default)] pub summary: Option<String>,
  #[serde(default)] pub blocks: Vec<ContentBlock>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExerciseCfg {
  #[serde(default)] pub id: Option<String>,
  #[serde(default)] pub lesson_id: Option<String>,
  pub title: String,
  #[serde(default)] pub questions: Vec<QuestionCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  #[serde(default)] pub id: Option<String>,
  pub prompt: String,
  #[serde(flatten)]
  pub payload: QuestionPayload,
}

/// Prompts used by the OpenAI client. Defaults are tuned for English grammar practice.
/// They can be overridden in TOML.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub translate_check_system: String,
  pub translate_check_user_template: String,
  pub feedback_system: String,
  pub feedback_user_template: String,
  pub tutor_system: String,
  pub generate_system: String,
  pub generate_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      translate_check_system: "You are a strict English grammar checker for language learners. Reply as compact JSON.".into(),
      translate_check_user_template: "Task: {prompt}\nReference answer: {reference}\nLearner answer: {answer}\nReturn JSON {\"isCorrect\": boolean, \"explanation\": string}. Accept answers with the same meaning and correct grammar; ignore capitalization and final punctuation.".into(),
      feedback_system: "You are a friendly English grammar tutor. Explain mistakes in 2-3 short sentences. Do not lecture.".into(),
      feedback_user_template: "Question: {prompt}\nCorrect answer: {expected}\nLearner answer: {answer}\nExplain briefly why the learner's answer is wrong and what rule applies.".into(),
      tutor_system: "You answer English grammar questions concisely in 1-3 sentences, with one short example when helpful.".into(),
      generate_system: "You are an English grammar exercise generator. Respond ONLY with strict JSON.".into(),
      generate_user_template: "Create {count} practice questions about '{topic}' at CEFR level '{level}'. Return JSON {\"title\": string, \"questions\": [ ... ]} where each question is one of:\n{\"type\":\"choice\",\"prompt\":string,\"options\":[string],\"correctIndex\":number}\n{\"type\":\"cloze\",\"prompt\":string,\"template\":string with blanks {{1}}, {{2}},\"answers\":[string]}\n{\"type\":\"reorder\",\"prompt\":string,\"tokens\":[string in correct order]}\n{\"type\":\"translate\",\"prompt\":string,\"reference\":string}".into(),
    }
  }
}

/// Parse a TOML document into `ContentConfig`.
pub fn parse_content_config(s: &str) -> Result<ContentConfig, toml::de::Error> {
  toml::from_str::<ContentConfig>(s)
}

/// Attempt to load `ContentConfig` from CONTENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_content_config_from_env() -> Option<ContentConfig> {
  let path = std::env::var("CONTENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_content_config(&s) {
      Ok(cfg) => {
        info!(target: "grammar_backend", %path, lessons = cfg.lessons.len(), exercises = cfg.exercises.len(), "Loaded content config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "grammar_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "grammar_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
