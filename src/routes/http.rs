//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  response::IntoResponse,
  Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, ai: state.openai.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_lessons(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let content = state.content.read().await;
  let lessons: Vec<LessonSummaryOut> = content.lessons.iter().map(LessonSummaryOut::from).collect();
  Json(lessons)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let lesson = {
    let content = state.content.read().await;
    content.lessons.iter().find(|l| l.id == id).cloned()
  };
  let lesson = lesson.ok_or_else(|| ApiError::not_found("lesson", &id))?;
  Ok(Json(LessonOut::from(lesson)))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_complete_lesson(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(q): Json<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
  if q.user_id.trim().is_empty() {
    return Err(ApiError::BadRequest("userId is required".into()));
  }
  let newly_completed = state
    .complete_lesson(&q.user_id, &id, Utc::now())
    .await
    .ok_or_else(|| ApiError::not_found("lesson", &id))?;
  info!(target: "grammar_backend", lesson_id = %id, user_id = %q.user_id, newly_completed, "Lesson completed");
  Ok(Json(CompleteOut { lesson_id: id, newly_completed }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_exercise(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let (exercise, questions) = state
    .content
    .read()
    .await
    .exercise_questions(&id)
    .ok_or_else(|| ApiError::not_found("exercise", &id))?;
  Ok(Json(exercise_out(&exercise, &questions)))
}

#[instrument(level = "info", skip(state, body), fields(question_id = %body.question_id))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> Result<impl IntoResponse, ApiError> {
  let is_correct = check_answer(&state, &body.question_id, &body.answer).await?;
  info!(target: "quiz", question_id = %body.question_id, is_correct, "HTTP answer checked");
  Ok(Json(CheckOut { question_id: body.question_id, is_correct }))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, question_id = %body.question_id))]
pub async fn http_post_attempt(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AttemptIn>,
) -> Result<impl IntoResponse, ApiError> {
  let attempt = record_attempt(&state, &body.user_id, &body.question_id, body.is_correct).await?;
  Ok((axum::http::StatusCode::CREATED, Json(attempt)))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id, page = ?q.page))]
pub async fn http_get_sessions(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SessionsQuery>,
) -> impl IntoResponse {
  let page = list_sessions(&state, &q.user_id, q.page.unwrap_or(1)).await;
  info!(target: "sessions", user_id = %q.user_id, returned = page.sessions.len(), total = page.pagination.total_items, "HTTP sessions served");
  Json(page)
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> impl IntoResponse {
  let progress = state.user_progress(&q.user_id).await;
  Json(progress_out(&progress, Utc::now().date_naive()))
}

#[instrument(level = "info", skip(state, body), fields(question_id = %body.question_id))]
pub async fn http_post_feedback(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FeedbackIn>,
) -> Result<impl IntoResponse, ApiError> {
  let question = state
    .get_question(&body.question_id)
    .await
    .ok_or_else(|| ApiError::not_found("question", &body.question_id))?;
  let text = feedback_text(&state, &question, &body.answer.as_text()).await;
  Ok(Json(TextOut { text }))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, message_len = body.message.len()))]
pub async fn http_post_tutor(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TutorIn>,
) -> Result<impl IntoResponse, ApiError> {
  let text = tutor_reply(&state, &body.user_id, &body.message, body.question_id.as_deref()).await?;
  Ok(Json(TextOut { text }))
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> Result<impl IntoResponse, ApiError> {
  let (exercise, questions) = generate_exercise(&state, body).await?;
  Ok((axum::http::StatusCode::CREATED, Json(exercise_out(&exercise, &questions))))
}
