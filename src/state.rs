//! Application state: in-memory content stores, attempts, progress, prompts,
//! the tutor limiter and the optional OpenAI client.
//!
//! One `AppState` is built at start-up and shared behind an `Arc`; nothing in
//! the request path constructs its own client.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_content_config_from_env, ContentConfig, Prompts};
use crate::domain::{Attempt, ContentSource, Exercise, Lesson, Question};
use crate::openai::{GeneratedExercise, OpenAI};
use crate::progress::UserProgress;
use crate::ratelimit::RateLimiter;
use crate::seeds::seed_content;
use crate::sessions::AttemptRecord;

#[derive(Default)]
pub struct ContentStore {
  pub lessons: Vec<Lesson>,
  pub exercises: HashMap<String, Exercise>,
  pub questions: HashMap<String, Question>,
}

impl ContentStore {
  fn insert_exercise(&mut self, exercise: Exercise, questions: Vec<Question>) {
    if let Some(lesson_id) = &exercise.lesson_id {
      if let Some(lesson) = self.lessons.iter_mut().find(|l| &l.id == lesson_id) {
        if !lesson.exercise_ids.contains(&exercise.id) {
          lesson.exercise_ids.push(exercise.id.clone());
        }
      }
    }
    for q in questions {
      self.questions.insert(q.id.clone(), q);
    }
    self.exercises.insert(exercise.id.clone(), exercise);
  }

  /// Whether a new question may enter the store: its id is unused and its payload is answerable.
  fn admits(&self, q: &Question, pending: &[Question]) -> bool {
    if self.questions.contains_key(&q.id) || pending.iter().any(|p| p.id == q.id) {
      warn!(target: "grammar_backend", question_id = %q.id, exercise_id = %q.exercise_id, "Skipping question: id already in use.");
      return false;
    }
    if let Err(reason) = q.payload.validate() {
      warn!(target: "grammar_backend", question_id = %q.id, exercise_id = %q.exercise_id, reason, "Skipping malformed question.");
      return false;
    }
    true
  }

  /// Questions of an exercise in authoring order. Ids that don't resolve are skipped.
  pub fn exercise_questions(&self, exercise_id: &str) -> Option<(Exercise, Vec<Question>)> {
    let ex = self.exercises.get(exercise_id)?.clone();
    let qs = ex.question_ids.iter().filter_map(|id| self.questions.get(id).cloned()).collect();
    Some((ex, qs))
  }
}

pub struct AppState {
  pub content: Arc<RwLock<ContentStore>>,
  pub attempts: Arc<RwLock<HashMap<String, Vec<Attempt>>>>,
  pub progress: Arc<RwLock<HashMap<String, UserProgress>>>,
  pub tutor_limiter: RateLimiter,
  pub translate_timeout: Duration,
  pub openai: Option<OpenAI>,
  pub prompts: Prompts,
}

impl AppState {
  /// Build state from env: load config, seed content, init OpenAI.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let cfg = load_content_config_from_env().unwrap_or_default();
    let openai = OpenAI::from_env();
    if let Some(oa) = &openai {
      info!(target: "grammar_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
    } else {
      info!(target: "grammar_backend", "OpenAI disabled (no OPENAI_API_KEY). Using local fallbacks.");
    }
    Self::with_config(cfg, openai)
  }

  pub fn with_config(cfg: ContentConfig, openai: Option<OpenAI>) -> Self {
    let mut store = ContentStore::default();
    let seed = seed_content();
    store.lessons = seed.lessons;
    for q in seed.questions {
      store.questions.insert(q.id.clone(), q);
    }
    for ex in seed.exercises {
      store.exercises.insert(ex.id.clone(), ex);
    }

    // Config lessons replace seeds with the same id.
    for lc in cfg.lessons {
      let lesson = Lesson {
        id: lc.id.clone(),
        title: lc.title,
        level: lc.level,
        summary: lc.summary.unwrap_or_default(),
        blocks: lc.blocks,
        exercise_ids: Vec::new(),
      };
      match store.lessons.iter_mut().find(|l| l.id == lc.id) {
        Some(existing) => {
          let exercise_ids = std::mem::take(&mut existing.exercise_ids);
          *existing = Lesson { exercise_ids, ..lesson };
        }
        None => store.lessons.push(lesson),
      }
    }

    for ec in cfg.exercises {
      let exercise_id = ec.id.unwrap_or_else(|| Uuid::new_v4().to_string());
      let mut questions: Vec<Question> = Vec::new();
      for qc in ec.questions {
        let q = Question {
          id: qc.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
          exercise_id: exercise_id.clone(),
          prompt: qc.prompt,
          payload: qc.payload,
        };
        if store.admits(&q, &questions) {
          questions.push(q);
        }
      }
      if questions.is_empty() {
        warn!(target: "grammar_backend", %exercise_id, "Skipping bank exercise: no questions.");
        continue;
      }
      let exercise = Exercise {
        id: exercise_id,
        lesson_id: ec.lesson_id,
        title: ec.title,
        source: ContentSource::Bank,
        question_ids: questions.iter().map(|q| q.id.clone()).collect(),
      };
      store.insert_exercise(exercise, questions);
    }

    info!(
      target: "grammar_backend",
      lessons = store.lessons.len(),
      exercises = store.exercises.len(),
      questions = store.questions.len(),
      "Startup content inventory"
    );

    Self {
      content: Arc::new(RwLock::new(store)),
      attempts: Arc::new(RwLock::new(HashMap::new())),
      progress: Arc::new(RwLock::new(HashMap::new())),
      tutor_limiter: RateLimiter::new(Duration::from_secs(cfg.tutor.window_secs), cfg.tutor.max_requests),
      translate_timeout: Duration::from_secs(cfg.quiz.translate_timeout_secs),
      openai,
      prompts: cfg.prompts,
    }
  }

  pub async fn get_question(&self, id: &str) -> Option<Question> {
    self.content.read().await.questions.get(id).cloned()
  }

  /// Store an AI-generated exercise and return it. None when no generated question is usable.
  #[instrument(level = "debug", skip(self, generated), fields(title = %generated.title))]
  pub async fn insert_generated(&self, generated: GeneratedExercise, lesson_id: Option<String>) -> Option<(Exercise, Vec<Question>)> {
    let exercise_id = Uuid::new_v4().to_string();
    let mut content = self.content.write().await;
    let mut questions: Vec<Question> = Vec::new();
    for g in generated.questions {
      let q = Question { id: Uuid::new_v4().to_string(), exercise_id: exercise_id.clone(), prompt: g.prompt, payload: g.payload };
      if content.admits(&q, &questions) {
        questions.push(q);
      }
    }
    if questions.is_empty() {
      return None;
    }
    let exercise = Exercise {
      id: exercise_id,
      lesson_id,
      title: generated.title,
      source: ContentSource::Generated,
      question_ids: questions.iter().map(|q| q.id.clone()).collect(),
    };
    content.insert_exercise(exercise.clone(), questions.clone());
    Some((exercise, questions))
  }

  /// Append an attempt and update the user's progress.
  #[instrument(level = "debug", skip(self))]
  pub async fn record_attempt(&self, user_id: &str, question_id: &str, is_correct: bool, at: DateTime<Utc>) -> Attempt {
    let attempt = Attempt {
      id: Uuid::new_v4().to_string(),
      user_id: user_id.to_string(),
      question_id: question_id.to_string(),
      is_correct,
      created_at: at,
    };
    self.attempts.write().await.entry(user_id.to_string()).or_default().push(attempt.clone());
    self
      .progress
      .write()
      .await
      .entry(user_id.to_string())
      .or_default()
      .record_attempt(is_correct, at.date_naive());
    attempt
  }

  /// A user's attempts joined with the exercise of each question, plus exercise names.
  pub async fn attempt_records(&self, user_id: &str) -> (Vec<AttemptRecord>, HashMap<String, String>) {
    let attempts = self.attempts.read().await.get(user_id).cloned().unwrap_or_default();
    let content = self.content.read().await;
    let records = attempts
      .into_iter()
      .map(|a| {
        let exercise_id = content
          .questions
          .get(&a.question_id)
          .map(|q| q.exercise_id.clone())
          .filter(|id| content.exercises.contains_key(id));
        AttemptRecord { question_id: a.question_id, exercise_id, is_correct: a.is_correct, created_at: a.created_at }
      })
      .collect();
    let names = content.exercises.values().map(|e| (e.id.clone(), e.title.clone())).collect();
    (records, names)
  }

  pub async fn user_progress(&self, user_id: &str) -> UserProgress {
    self.progress.read().await.get(user_id).cloned().unwrap_or_default()
  }

  /// Returns None for an unknown lesson, otherwise whether it was newly completed.
  pub async fn complete_lesson(&self, user_id: &str, lesson_id: &str, at: DateTime<Utc>) -> Option<bool> {
    let known = self.content.read().await.lessons.iter().any(|l| l.id == lesson_id);
    if !known {
      return None;
    }
    let mut progress = self.progress.write().await;
    Some(progress.entry(user_id.to_string()).or_default().complete_lesson(lesson_id, at.date_naive()))
  }
}
