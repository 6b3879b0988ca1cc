//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::{ContentBlock, ContentSource, Exercise, Lesson, Question, QuestionPayload};
use crate::progress::UserProgress;
use crate::quiz::{Candidate, Cue};
use crate::util::count_blanks;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  StartExercise {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "exerciseId")]
    exercise_id: String,
  },
  Submit {
    answer: Candidate,
  },
  Continue,
  Skip,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Question {
    position: usize,
    total: usize,
    question: QuestionOut,
  },
  Checked {
    #[serde(rename = "questionId")]
    question_id: String,
    #[serde(rename = "isCorrect")]
    is_correct: bool,
  },
  Cue {
    cue: Cue,
  },
  Advanced {
    #[serde(rename = "questionId")]
    question_id: String,
    scored: bool,
  },
  Feedback {
    #[serde(rename = "questionId")]
    question_id: String,
    text: String,
  },
  Finished {
    score: usize,
    total: usize,
  },
  Error {
    message: String,
  },
}

/// Question as shown to the learner: no answers, reorder tokens shuffled.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
  pub id: String,
  pub prompt: String,
  #[serde(flatten)]
  pub body: QuestionBody,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionBody {
  Choice { options: Vec<String> },
  Cloze { template: String, blanks: usize },
  Reorder { tokens: Vec<String> },
  Translate,
}

pub fn question_out(q: &Question) -> QuestionOut {
  let body = match &q.payload {
    QuestionPayload::Choice { options, .. } => QuestionBody::Choice { options: options.clone() },
    QuestionPayload::Cloze { template, answers } => QuestionBody::Cloze {
      template: template.clone(),
      blanks: answers.len().max(count_blanks(template)),
    },
    QuestionPayload::Reorder { tokens } => {
      let mut shuffled = tokens.clone();
      shuffled.shuffle(&mut rand::thread_rng());
      QuestionBody::Reorder { tokens: shuffled }
    }
    QuestionPayload::Translate { .. } => QuestionBody::Translate,
  };
  QuestionOut { id: q.id.clone(), prompt: q.prompt.clone(), body }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummaryOut {
  pub id: String,
  pub title: String,
  pub level: String,
  pub summary: String,
}

impl From<&Lesson> for LessonSummaryOut {
  fn from(l: &Lesson) -> Self {
    Self { id: l.id.clone(), title: l.title.clone(), level: l.level.clone(), summary: l.summary.clone() }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOut {
  pub id: String,
  pub title: String,
  pub level: String,
  pub summary: String,
  pub blocks: Vec<ContentBlock>,
  pub exercise_ids: Vec<String>,
}

impl From<Lesson> for LessonOut {
  fn from(l: Lesson) -> Self {
    Self { id: l.id, title: l.title, level: l.level, summary: l.summary, blocks: l.blocks, exercise_ids: l.exercise_ids }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseOut {
  pub id: String,
  pub lesson_id: Option<String>,
  pub title: String,
  pub source: ContentSource,
  pub questions: Vec<QuestionOut>,
}

pub fn exercise_out(ex: &Exercise, questions: &[Question]) -> ExerciseOut {
  ExerciseOut {
    id: ex.id.clone(),
    lesson_id: ex.lesson_id.clone(),
    title: ex.title.clone(),
    source: ex.source.clone(),
    questions: questions.iter().map(question_out).collect(),
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
  pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsQuery {
  pub user_id: String,
  pub page: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
  pub question_id: String,
  pub answer: Candidate,
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOut {
  pub question_id: String,
  pub is_correct: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptIn {
  pub user_id: String,
  pub question_id: String,
  pub is_correct: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOut {
  pub lesson_id: String,
  pub newly_completed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOut {
  pub completed_lessons: Vec<String>,
  pub total_attempts: u64,
  pub correct_attempts: u64,
  pub accuracy: u32,
  pub current_streak: u32,
  pub longest_streak: u32,
  pub last_active: Option<chrono::NaiveDate>,
}

pub fn progress_out(p: &UserProgress, today: chrono::NaiveDate) -> ProgressOut {
  ProgressOut {
    completed_lessons: p.completed_lessons.iter().cloned().collect(),
    total_attempts: p.total_attempts,
    correct_attempts: p.correct_attempts,
    accuracy: p.accuracy(),
    current_streak: p.streak_on(today),
    longest_streak: p.longest_streak,
    last_active: p.last_active,
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackIn {
  pub question_id: String,
  pub answer: Candidate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorIn {
  pub user_id: String,
  pub message: String,
  #[serde(default)]
  pub question_id: Option<String>,
}

#[derive(Serialize)]
pub struct TextOut {
  pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIn {
  pub topic: String,
  #[serde(default = "default_level")]
  pub level: String,
  #[serde(default = "default_count")]
  pub count: usize,
  #[serde(default)]
  pub lesson_id: Option<String>,
}

fn default_level() -> String {
  "b1".into()
}

fn default_count() -> usize {
  5
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub ai: bool,
}
