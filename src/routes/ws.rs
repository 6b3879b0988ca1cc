//! WebSocket exercise runner. One connection runs one exercise at a time:
//! `start_exercise`, then per question `submit` followed by `continue`, or `skip`.
//! Confirmed answers are recorded as attempts; wrong ones get AI feedback
//! pushed asynchronously while the learner moves on.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::logic::{feedback_text, AiChecker};
use crate::protocol::{question_out, ClientWsMessage, ServerWsMessage};
use crate::quiz::{Advance, Cue, ExerciseRunner, Notifier, Step};
use crate::state::AppState;

/// Pushes cues to the client through the connection's outbound queue.
struct ChannelNotifier(mpsc::UnboundedSender<ServerWsMessage>);

impl Notifier for ChannelNotifier {
  fn notify(&self, cue: Cue) {
    let _ = self.0.send(ServerWsMessage::Cue { cue });
  }
}

struct Session {
  user_id: String,
  runner: ExerciseRunner,
  last_answer: Option<String>,
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "grammar_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "grammar_backend", "WebSocket connected");
  let (tx, mut rx) = mpsc::unbounded_channel::<ServerWsMessage>();
  let notifier = ChannelNotifier(tx.clone());
  let mut session: Option<Session> = None;

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(parsed) => {
                debug!(target: "grammar_backend", "WS received: {:?}", &parsed);
                handle_client_ws(parsed, &state, &mut session, &notifier, &tx).await;
              }
              Err(e) => {
                let _ = tx.send(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) });
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(out) = rx.recv() => {
        let text = serde_json::to_string(&out).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });
        if let Err(e) = socket.send(Message::Text(text)).await {
          error!(target: "grammar_backend", error = %e, "WS send error");
          break;
        }
      }
    }
  }
  info!(target: "grammar_backend", "WebSocket disconnected");
}

fn send_current(runner: &ExerciseRunner, position: usize, tx: &mpsc::UnboundedSender<ServerWsMessage>) {
  if let Some(machine) = runner.current() {
    let _ = tx.send(ServerWsMessage::Question { position, total: runner.total(), question: question_out(machine.question()) });
  }
}

#[instrument(level = "info", skip(state, session, notifier, tx))]
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &Arc<AppState>,
  session: &mut Option<Session>,
  notifier: &ChannelNotifier,
  tx: &mpsc::UnboundedSender<ServerWsMessage>,
) {
  let reply_error = |message: String| {
    let _ = tx.send(ServerWsMessage::Error { message });
  };

  match msg {
    ClientWsMessage::Ping => {
      let _ = tx.send(ServerWsMessage::Pong);
    }

    ClientWsMessage::StartExercise { user_id, exercise_id } => {
      let found = state.content.read().await.exercise_questions(&exercise_id);
      match found {
        Some((_, questions)) if !questions.is_empty() => {
          let runner = ExerciseRunner::new(exercise_id.clone(), questions, state.translate_timeout);
          send_current(&runner, 0, tx);
          info!(target: "quiz", %user_id, %exercise_id, total = runner.total(), "WS exercise started");
          *session = Some(Session { user_id, runner, last_answer: None });
        }
        _ => reply_error(format!("Unknown or empty exercise: {}", exercise_id)),
      }
    }

    ClientWsMessage::Submit { answer } => {
      let Some(s) = session.as_mut() else { return reply_error("No exercise in progress".into()) };
      let checker = AiChecker { state: state.as_ref() };
      match s.runner.submit(&answer, &checker, notifier).await {
        Ok(is_correct) => {
          let question_id = s.runner.current().map(|m| m.question().id.clone()).unwrap_or_default();
          s.last_answer = Some(answer.as_text());
          let _ = tx.send(ServerWsMessage::Checked { question_id, is_correct });
        }
        Err(e) => reply_error(e.to_string()),
      }
    }

    ClientWsMessage::Continue => {
      let Some(s) = session.as_mut() else { return reply_error("No exercise in progress".into()) };
      let question = s.runner.current().map(|m| m.question().clone());
      match s.runner.confirm(notifier) {
        Ok((advance, step)) => {
          if let Advance::Scored { question_id, is_correct } = advance {
            state.record_attempt(&s.user_id, &question_id, is_correct, Utc::now()).await;
            if let (false, Some(question)) = (is_correct, question) {
              spawn_feedback(state.clone(), question, s.last_answer.take().unwrap_or_default(), tx.clone());
            }
            let _ = tx.send(ServerWsMessage::Advanced { question_id, scored: true });
          }
          after_step(session, step, tx);
        }
        Err(e) => reply_error(e.to_string()),
      }
    }

    ClientWsMessage::Skip => {
      let Some(s) = session.as_mut() else { return reply_error("No exercise in progress".into()) };
      match s.runner.skip(notifier) {
        Ok((advance, step)) => {
          let question_id = match advance {
            Advance::Skipped { question_id } | Advance::Scored { question_id, .. } => question_id,
          };
          s.last_answer = None;
          let _ = tx.send(ServerWsMessage::Advanced { question_id, scored: false });
          after_step(session, step, tx);
        }
        Err(e) => reply_error(e.to_string()),
      }
    }
  }
}

fn after_step(session: &mut Option<Session>, step: Step, tx: &mpsc::UnboundedSender<ServerWsMessage>) {
  match step {
    Step::Next => {
      if let Some(s) = session.as_ref() {
        send_current(&s.runner, s.runner.position(), tx);
      }
    }
    Step::Finished { score, total } => {
      if let Some(s) = session.take() {
        info!(target: "quiz", user_id = %s.user_id, exercise_id = %s.runner.exercise_id(), score, total, "WS exercise finished");
      }
      let _ = tx.send(ServerWsMessage::Finished { score, total });
    }
  }
}

/// Fire-and-forget: the learner has already moved on when this arrives.
fn spawn_feedback(state: Arc<AppState>, question: crate::domain::Question, answer: String, tx: mpsc::UnboundedSender<ServerWsMessage>) {
  tokio::spawn(async move {
    let text = feedback_text(&state, &question, &answer).await;
    let _ = tx.send(ServerWsMessage::Feedback { question_id: question.id, text });
  });
}
