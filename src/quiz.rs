//! Per-question answer cycle shared by every question type.
//!
//! A `QuestionMachine` starts `Unanswered`. The first confirm action (`submit`)
//! evaluates the candidate and moves it to `Checked`; the second one (`confirm`)
//! hands the verdict to the caller, who advances to the next question.
//! `skip` is only available while `Unanswered` and is never scored.
//!
//! Translate questions are checked remotely through a `TranslateChecker`. A
//! checker error or a timeout counts as incorrect: the learner is never stuck,
//! and a failed check is scored conservatively.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::{Question, QuestionKind, QuestionPayload};
use crate::util::{count_blanks, normalize_answer};

/// Candidate answer collected by the question renderer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Candidate {
  Choice {
    #[serde(default)]
    index: Option<usize>,
  },
  Cloze { blanks: Vec<String> },
  Reorder { tokens: Vec<String> },
  Translate { text: String },
}

impl Candidate {
  pub fn kind(&self) -> QuestionKind {
    match self {
      Self::Choice { .. } => QuestionKind::Choice,
      Self::Cloze { .. } => QuestionKind::Cloze,
      Self::Reorder { .. } => QuestionKind::Reorder,
      Self::Translate { .. } => QuestionKind::Translate,
    }
  }

  /// Plain-text rendering for logs and feedback prompts.
  pub fn as_text(&self) -> String {
    match self {
      Self::Choice { index } => index.map(|i| i.to_string()).unwrap_or_default(),
      Self::Cloze { blanks } => blanks.join(", "),
      Self::Reorder { tokens } => tokens.join(" "),
      Self::Translate { text } => text.clone(),
    }
  }
}

/// Sound/visual cue emitted by the answer cycle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
  Correct,
  Incorrect,
  Finished,
}

pub trait Notifier {
  fn notify(&self, cue: Cue);
}

/// Notifier that only records the cue in the logs (HTTP check path).
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, cue: Cue) {
    debug!(target: "quiz", ?cue, "Cue emitted");
  }
}

/// Remote semantic/grammar check for free-text answers.
pub trait TranslateChecker {
  type Error: Display;

  fn check_translation(
    &self,
    prompt: &str,
    reference: &str,
    answer: &str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizState {
  Unanswered,
  Checked {
    #[serde(rename = "isCorrect")]
    is_correct: bool,
  },
}

/// Signal to the enclosing runner that this question is done.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
  Scored { question_id: String, is_correct: bool },
  Skipped { question_id: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizError {
  #[error("question already checked")]
  AlreadyChecked,
  #[error("question not checked yet")]
  NotChecked,
  #[error("answer incomplete: {0}")]
  Incomplete(&'static str),
  #[error("answer type {got} does not match question type {expected}")]
  KindMismatch { expected: &'static str, got: &'static str },
  #[error("exercise already finished")]
  Finished,
}

/// Outcome of the local part of the check.
#[derive(Debug, PartialEq)]
pub enum LocalCheck<'a> {
  Decided(bool),
  Remote { reference: &'a str, text: &'a str },
}

/// Guard the candidate and compare it with the stored answer.
/// Translate answers are only guarded here; correctness is decided remotely.
pub fn check_local<'a>(payload: &'a QuestionPayload, candidate: &'a Candidate) -> Result<LocalCheck<'a>, QuizError> {
  match (payload, candidate) {
    (QuestionPayload::Choice { options, correct_index }, Candidate::Choice { index }) => {
      let index = index.ok_or(QuizError::Incomplete("no option selected"))?;
      if index >= options.len() {
        return Err(QuizError::Incomplete("selected option out of range"));
      }
      Ok(LocalCheck::Decided(index == *correct_index))
    }
    (QuestionPayload::Cloze { template, answers }, Candidate::Cloze { blanks }) => {
      let expected_blanks = answers.len().max(count_blanks(template));
      if blanks.len() != expected_blanks || blanks.iter().any(|b| b.trim().is_empty()) {
        return Err(QuizError::Incomplete("every blank must be filled"));
      }
      let ok = blanks.len() == answers.len()
        && blanks.iter().zip(answers).all(|(got, want)| normalize_answer(got) == normalize_answer(want));
      Ok(LocalCheck::Decided(ok))
    }
    (QuestionPayload::Reorder { tokens }, Candidate::Reorder { tokens: placed }) => {
      if placed.len() != tokens.len() {
        return Err(QuizError::Incomplete("every token must be placed"));
      }
      Ok(LocalCheck::Decided(placed == tokens))
    }
    (QuestionPayload::Translate { reference }, Candidate::Translate { text }) => {
      if text.trim().is_empty() {
        return Err(QuizError::Incomplete("answer text is blank"));
      }
      Ok(LocalCheck::Remote { reference, text })
    }
    (p, c) => Err(QuizError::KindMismatch { expected: p.kind().as_str(), got: c.kind().as_str() }),
  }
}

pub struct QuestionMachine {
  question: Question,
  state: QuizState,
  translate_timeout: Duration,
}

impl QuestionMachine {
  pub fn new(question: Question, translate_timeout: Duration) -> Self {
    Self { question, state: QuizState::Unanswered, translate_timeout }
  }

  pub fn question(&self) -> &Question {
    &self.question
  }

  pub fn state(&self) -> QuizState {
    self.state
  }

  /// Swap in a question. A different prompt resets the machine to `Unanswered`.
  pub fn reset_for(&mut self, question: Question) {
    if question.prompt != self.question.prompt {
      self.state = QuizState::Unanswered;
    }
    self.question = question;
  }

  /// First press of the check button: evaluate and reveal the verdict.
  #[instrument(level = "debug", target = "quiz", skip(self, candidate, checker, notifier), fields(question_id = %self.question.id, kind = self.question.payload.kind().as_str()))]
  pub async fn submit<C, N>(&mut self, candidate: &Candidate, checker: &C, notifier: &N) -> Result<bool, QuizError>
  where
    C: TranslateChecker + Sync,
    N: Notifier,
  {
    if let QuizState::Checked { .. } = self.state {
      return Err(QuizError::AlreadyChecked);
    }

    let is_correct = match check_local(&self.question.payload, candidate)? {
      LocalCheck::Decided(ok) => ok,
      LocalCheck::Remote { reference, text } => {
        let call = checker.check_translation(&self.question.prompt, reference, text);
        match tokio::time::timeout(self.translate_timeout, call).await {
          Ok(Ok(ok)) => ok,
          Ok(Err(e)) => {
            warn!(target: "quiz", question_id = %self.question.id, error = %e, "Translate check failed; scoring as incorrect");
            false
          }
          Err(_) => {
            warn!(target: "quiz", question_id = %self.question.id, timeout_ms = self.translate_timeout.as_millis() as u64, "Translate check timed out; scoring as incorrect");
            false
          }
        }
      }
    };

    self.state = QuizState::Checked { is_correct };
    notifier.notify(if is_correct { Cue::Correct } else { Cue::Incorrect });
    debug!(target: "quiz", question_id = %self.question.id, is_correct, "Question checked");
    Ok(is_correct)
  }

  /// Second press of the same button: hand over the verdict and advance.
  pub fn confirm(&self) -> Result<Advance, QuizError> {
    match self.state {
      QuizState::Checked { is_correct } => Ok(Advance::Scored { question_id: self.question.id.clone(), is_correct }),
      QuizState::Unanswered => Err(QuizError::NotChecked),
    }
  }

  pub fn skip(&self) -> Result<Advance, QuizError> {
    match self.state {
      QuizState::Unanswered => Ok(Advance::Skipped { question_id: self.question.id.clone() }),
      QuizState::Checked { .. } => Err(QuizError::AlreadyChecked),
    }
  }
}

/// What the runner does after a question is left.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
  Next,
  Finished { score: usize, total: usize },
}

/// Walks one exercise question by question.
pub struct ExerciseRunner {
  exercise_id: String,
  questions: Vec<Question>,
  position: usize,
  machine: Option<QuestionMachine>,
  score: usize,
  translate_timeout: Duration,
}

impl ExerciseRunner {
  pub fn new(exercise_id: String, questions: Vec<Question>, translate_timeout: Duration) -> Self {
    let machine = questions.first().cloned().map(|q| QuestionMachine::new(q, translate_timeout));
    Self { exercise_id, questions, position: 0, machine, score: 0, translate_timeout }
  }

  pub fn exercise_id(&self) -> &str {
    &self.exercise_id
  }

  pub fn current(&self) -> Option<&QuestionMachine> {
    self.machine.as_ref()
  }

  pub fn total(&self) -> usize {
    self.questions.len()
  }

  /// Zero-based index of the current question.
  pub fn position(&self) -> usize {
    self.position
  }

  pub async fn submit<C, N>(&mut self, candidate: &Candidate, checker: &C, notifier: &N) -> Result<bool, QuizError>
  where
    C: TranslateChecker + Sync,
    N: Notifier,
  {
    let machine = self.machine.as_mut().ok_or(QuizError::Finished)?;
    machine.submit(candidate, checker, notifier).await
  }

  /// Confirm the checked question; returns the verdict and what comes next.
  pub fn confirm<N: Notifier>(&mut self, notifier: &N) -> Result<(Advance, Step), QuizError> {
    let advance = self.machine.as_ref().ok_or(QuizError::Finished)?.confirm()?;
    if let Advance::Scored { is_correct: true, .. } = advance {
      self.score += 1;
    }
    Ok((advance, self.advance(notifier)))
  }

  pub fn skip<N: Notifier>(&mut self, notifier: &N) -> Result<(Advance, Step), QuizError> {
    let advance = self.machine.as_ref().ok_or(QuizError::Finished)?.skip()?;
    Ok((advance, self.advance(notifier)))
  }

  fn advance<N: Notifier>(&mut self, notifier: &N) -> Step {
    self.position += 1;
    let next = self.questions.get(self.position).cloned();
    if let (Some(next), Some(machine)) = (next, self.machine.as_mut()) {
      machine.reset_for(next);
      // Two questions may share a prompt; a new question always starts unanswered.
      if machine.state() != QuizState::Unanswered {
        let question = machine.question().clone();
        *machine = QuestionMachine::new(question, self.translate_timeout);
      }
      return Step::Next;
    }
    self.machine = None;
    notifier.notify(Cue::Finished);
    Step::Finished { score: self.score, total: self.questions.len() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  struct FixedChecker(Result<bool, String>);

  impl TranslateChecker for FixedChecker {
    type Error = String;

    async fn check_translation(&self, _prompt: &str, _reference: &str, _answer: &str) -> Result<bool, String> {
      self.0.clone()
    }
  }

  struct SlowChecker;

  impl TranslateChecker for SlowChecker {
    type Error = String;

    async fn check_translation(&self, _prompt: &str, _reference: &str, _answer: &str) -> Result<bool, String> {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok(true)
    }
  }

  #[derive(Default)]
  struct Recorder(Mutex<Vec<Cue>>);

  impl Notifier for Recorder {
    fn notify(&self, cue: Cue) {
      self.0.lock().unwrap().push(cue);
    }
  }

  impl Recorder {
    fn cues(&self) -> Vec<Cue> {
      self.0.lock().unwrap().clone()
    }
  }

  fn question(id: &str, prompt: &str, payload: QuestionPayload) -> Question {
    Question { id: id.into(), exercise_id: "ex".into(), prompt: prompt.into(), payload }
  }

  fn choice() -> Question {
    question(
      "q1",
      "He ___ to school.",
      QuestionPayload::Choice { options: vec!["go".into(), "goes".into(), "going".into(), "went".into()], correct_index: 1 },
    )
  }

  fn translate() -> Question {
    question("q4", "Translate", QuestionPayload::Translate { reference: "She works in a hospital.".into() })
  }

  fn machine(q: Question) -> QuestionMachine {
    QuestionMachine::new(q, Duration::from_secs(1))
  }

  #[tokio::test]
  async fn choice_compares_selected_index() {
    let ok = FixedChecker(Ok(false));
    let rec = Recorder::default();

    let mut m = machine(choice());
    assert!(m.submit(&Candidate::Choice { index: Some(1) }, &ok, &rec).await.unwrap());

    let mut m = machine(choice());
    assert!(!m.submit(&Candidate::Choice { index: Some(0) }, &ok, &rec).await.unwrap());
    assert_eq!(rec.cues(), vec![Cue::Correct, Cue::Incorrect]);
  }

  #[tokio::test]
  async fn cloze_is_trimmed_and_case_insensitive() {
    let q = question("q2", "Fill in", QuestionPayload::Cloze { template: "He {{1}} to school".into(), answers: vec!["goes".into()] });
    let mut m = machine(q);
    let verdict = m
      .submit(&Candidate::Cloze { blanks: vec!["Goes ".into()] }, &FixedChecker(Ok(false)), &LogNotifier)
      .await
      .unwrap();
    assert!(verdict);
    assert_eq!(m.state(), QuizState::Checked { is_correct: true });
  }

  #[tokio::test]
  async fn reorder_is_order_sensitive() {
    let tokens: Vec<String> = ["I", "go", "to", "school"].iter().map(|s| s.to_string()).collect();
    let q = question("q3", "Order", QuestionPayload::Reorder { tokens });
    let mut m = machine(q);
    let placed = ["I", "go", "school", "to"].iter().map(|s| s.to_string()).collect();
    let verdict = m.submit(&Candidate::Reorder { tokens: placed }, &FixedChecker(Ok(true)), &LogNotifier).await.unwrap();
    assert!(!verdict);
  }

  #[tokio::test]
  async fn translate_uses_remote_verdict() {
    let mut m = machine(translate());
    let c = Candidate::Translate { text: "She works at a hospital".into() };
    assert!(m.submit(&c, &FixedChecker(Ok(true)), &LogNotifier).await.unwrap());
  }

  #[tokio::test]
  async fn translate_failure_scores_incorrect_and_still_checks() {
    let rec = Recorder::default();
    let mut m = machine(translate());
    let c = Candidate::Translate { text: "She works in a hospital.".into() };
    assert!(!m.submit(&c, &FixedChecker(Err("network down".into())), &rec).await.unwrap());
    assert_eq!(m.state(), QuizState::Checked { is_correct: false });
    assert_eq!(rec.cues(), vec![Cue::Incorrect]);
  }

  #[tokio::test]
  async fn translate_timeout_scores_incorrect() {
    let mut m = QuestionMachine::new(translate(), Duration::from_millis(20));
    let c = Candidate::Translate { text: "She works in a hospital.".into() };
    assert!(!m.submit(&c, &SlowChecker, &LogNotifier).await.unwrap());
  }

  #[tokio::test]
  async fn incomplete_answers_are_rejected_without_transition() {
    let checker = FixedChecker(Ok(true));
    let mut m = machine(choice());
    assert_eq!(
      m.submit(&Candidate::Choice { index: None }, &checker, &LogNotifier).await,
      Err(QuizError::Incomplete("no option selected"))
    );
    assert_eq!(m.state(), QuizState::Unanswered);

    let mut t = machine(translate());
    assert!(t.submit(&Candidate::Translate { text: "   ".into() }, &checker, &LogNotifier).await.is_err());

    let cloze = question("q", "p", QuestionPayload::Cloze { template: "{{1}} and {{2}}".into(), answers: vec!["a".into(), "b".into()] });
    let mut c = machine(cloze);
    let partial = Candidate::Cloze { blanks: vec!["a".into(), "".into()] };
    assert!(matches!(c.submit(&partial, &checker, &LogNotifier).await, Err(QuizError::Incomplete(_))));
  }

  #[tokio::test]
  async fn mismatched_candidate_type_is_rejected() {
    let mut m = machine(choice());
    let err = m.submit(&Candidate::Translate { text: "goes".into() }, &FixedChecker(Ok(true)), &LogNotifier).await;
    assert_eq!(err, Err(QuizError::KindMismatch { expected: "choice", got: "translate" }));
  }

  #[tokio::test]
  async fn checked_is_terminal_and_skip_is_disabled() {
    let mut m = machine(choice());
    assert_eq!(m.confirm(), Err(QuizError::NotChecked));
    m.submit(&Candidate::Choice { index: Some(1) }, &FixedChecker(Ok(true)), &LogNotifier).await.unwrap();
    assert_eq!(
      m.submit(&Candidate::Choice { index: Some(0) }, &FixedChecker(Ok(true)), &LogNotifier).await,
      Err(QuizError::AlreadyChecked)
    );
    assert_eq!(m.skip(), Err(QuizError::AlreadyChecked));
    assert_eq!(m.confirm(), Ok(Advance::Scored { question_id: "q1".into(), is_correct: true }));
  }

  #[tokio::test]
  async fn new_prompt_resets_to_unanswered() {
    let mut m = machine(choice());
    m.submit(&Candidate::Choice { index: Some(1) }, &FixedChecker(Ok(true)), &LogNotifier).await.unwrap();
    m.reset_for(translate());
    assert_eq!(m.state(), QuizState::Unanswered);
  }

  #[tokio::test]
  async fn runner_scores_confirmed_answers_but_not_skips() {
    let rec = Recorder::default();
    let checker = FixedChecker(Ok(true));
    let mut runner = ExerciseRunner::new("ex".into(), vec![choice(), translate()], Duration::from_secs(1));

    let (advance, step) = runner.skip(&rec).unwrap();
    assert_eq!(advance, Advance::Skipped { question_id: "q1".into() });
    assert_eq!(step, Step::Next);

    runner.submit(&Candidate::Translate { text: "She works in a hospital".into() }, &checker, &rec).await.unwrap();
    let (_, step) = runner.confirm(&rec).unwrap();
    assert_eq!(step, Step::Finished { score: 1, total: 2 });
    assert!(runner.current().is_none());
    assert_eq!(rec.cues(), vec![Cue::Correct, Cue::Finished]);
    assert_eq!(runner.skip(&rec), Err(QuizError::Finished));
  }

  #[tokio::test]
  async fn runner_restarts_machine_for_repeated_prompt() {
    let checker = FixedChecker(Ok(true));
    let mut second = choice();
    second.id = "q1-bis".into();
    let mut runner = ExerciseRunner::new("ex".into(), vec![choice(), second], Duration::from_secs(1));
    runner.submit(&Candidate::Choice { index: Some(0) }, &checker, &LogNotifier).await.unwrap();
    runner.confirm(&LogNotifier).unwrap();
    let current = runner.current().unwrap();
    assert_eq!(current.question().id, "q1-bis");
    assert_eq!(current.state(), QuizState::Unanswered);
  }
}
