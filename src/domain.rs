//! Domain models: lessons, exercises, typed questions and answer attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::count_blanks;

/// Where did the exercise come from?
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
  Bank,       // from user-provided TOML bank
  Generated,  // generated via OpenAI and kept in memory
  Seed,       // built-in seeds
}

/// One renderable block of lesson content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
  Heading { text: String },
  Paragraph { text: String },
  Example {
    sentence: String,
    #[serde(default)] note: Option<String>,
  },
  Tip { text: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  pub id: String,
  pub title: String,
  pub level: String,   // free-form (e.g., "a1", "b2")
  #[serde(default)] pub summary: String,
  #[serde(default)] pub blocks: Vec<ContentBlock>,
  #[serde(default)] pub exercise_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
  pub id: String,
  #[serde(default)] pub lesson_id: Option<String>,
  pub title: String,
  pub source: ContentSource,
  pub question_ids: Vec<String>,
}

/// Type-specific answer data. One variant per question type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionPayload {
  /// Pick one option; `correct_index` points into `options`.
  Choice {
    options: Vec<String>,
    #[serde(rename = "correctIndex")]
    correct_index: usize,
  },
  /// Template with numbered blanks `{{1}}`, `{{2}}`, ... and one answer per blank.
  Cloze { template: String, answers: Vec<String> },
  /// Tokens in their one correct order.
  Reorder { tokens: Vec<String> },
  /// Free text, checked remotely against a reference answer.
  Translate { reference: String },
}

impl QuestionPayload {
  pub fn kind(&self) -> QuestionKind {
    match self {
      Self::Choice { .. } => QuestionKind::Choice,
      Self::Cloze { .. } => QuestionKind::Cloze,
      Self::Reorder { .. } => QuestionKind::Reorder,
      Self::Translate { .. } => QuestionKind::Translate,
    }
  }

  /// Human-readable rendering of the correct answer (used in feedback prompts).
  pub fn expected_text(&self) -> String {
    match self {
      Self::Choice { options, correct_index } => options.get(*correct_index).cloned().unwrap_or_default(),
      Self::Cloze { answers, .. } => answers.join(", "),
      Self::Reorder { tokens } => tokens.join(" "),
      Self::Translate { reference } => reference.clone(),
    }
  }

  /// Reject payloads no answer could ever satisfy. Run on bank and generated content.
  pub fn validate(&self) -> Result<(), &'static str> {
    match self {
      Self::Choice { options, correct_index } => {
        if *correct_index >= options.len() {
          return Err("correctIndex is outside the options");
        }
      }
      Self::Cloze { template, answers } => {
        if answers.is_empty() || count_blanks(template) != answers.len() {
          return Err("cloze blanks and answers differ in number");
        }
      }
      Self::Reorder { tokens } => {
        if tokens.is_empty() {
          return Err("reorder has no tokens");
        }
      }
      Self::Translate { reference } => {
        if reference.trim().is_empty() {
          return Err("translate reference is blank");
        }
      }
    }
    Ok(())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  Choice,
  Cloze,
  Reorder,
  Translate,
}

impl QuestionKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Choice => "choice",
      Self::Cloze => "cloze",
      Self::Reorder => "reorder",
      Self::Translate => "translate",
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  pub exercise_id: String,
  pub prompt: String,
  pub payload: QuestionPayload,
}

/// One user's single answer submission. Append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
  pub id: String,
  pub user_id: String,
  pub question_id: String,
  pub is_correct: bool,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cloze(template: &str, answers: &[&str]) -> QuestionPayload {
    QuestionPayload::Cloze { template: template.into(), answers: answers.iter().map(|a| a.to_string()).collect() }
  }

  #[test]
  fn cloze_needs_one_answer_per_blank() {
    assert!(cloze("He {{1}} to school", &["goes"]).validate().is_ok());
    assert!(cloze("He {{1}} to {{2}}", &["goes"]).validate().is_err());
    assert!(cloze("No blanks here", &[]).validate().is_err());
  }

  #[test]
  fn choice_index_must_point_at_an_option() {
    let p = QuestionPayload::Choice { options: vec!["go".into(), "goes".into()], correct_index: 2 };
    assert!(p.validate().is_err());
    assert!(QuestionPayload::Reorder { tokens: vec![] }.validate().is_err());
  }
}
