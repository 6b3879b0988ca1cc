//! Groups a user's answer attempts into practice sessions and scores them.
//!
//! A session is every attempt on one exercise whose timestamp falls into the
//! same truncated UTC hour. Attempts seconds apart across an hour boundary land
//! in different sessions; this is the displayed behavior and is kept as is.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

pub const PAGE_SIZE: usize = 10;
const BUCKET_SECS: i64 = 3600;

/// One attempt as seen by the aggregator. `exercise_id` is `None` when the
/// question could not be resolved to an exercise.
#[derive(Clone, Debug)]
pub struct AttemptRecord {
  pub question_id: String,
  pub exercise_id: Option<String>,
  pub is_correct: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
  pub exercise_id: String,
  pub exercise_name: String,
  pub score: usize,
  pub total_questions: usize,
  pub percentage: u32,
  pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  pub current_page: usize,
  pub total_pages: usize,
  pub total_items: usize,
  pub has_more: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SessionPage {
  pub sessions: Vec<SessionSummary>,
  pub pagination: Pagination,
}

#[derive(Default)]
struct Group<'a> {
  attempted: HashSet<&'a str>,
  correct: HashSet<&'a str>,
  completed_at: Option<DateTime<Utc>>,
}

/// `round(100 * score / total)`, or 0 for an empty session.
pub fn percentage(score: usize, total: usize) -> u32 {
  if total == 0 {
    return 0;
  }
  ((score as f64) * 100.0 / (total as f64)).round() as u32
}

fn hour_bucket(ts: &DateTime<Utc>) -> i64 {
  ts.timestamp().div_euclid(BUCKET_SECS)
}

/// Build every session summary, most recent first.
#[instrument(level = "debug", target = "sessions", skip_all, fields(attempts = attempts.len()))]
pub fn summarize(attempts: &[AttemptRecord], exercise_names: &HashMap<String, String>) -> Vec<SessionSummary> {
  let mut groups: BTreeMap<(&str, i64), Group<'_>> = BTreeMap::new();
  let mut dropped = 0usize;

  for a in attempts {
    let Some(exercise_id) = a.exercise_id.as_deref() else {
      dropped += 1;
      continue;
    };
    let g = groups.entry((exercise_id, hour_bucket(&a.created_at))).or_default();
    g.attempted.insert(a.question_id.as_str());
    if a.is_correct {
      g.correct.insert(a.question_id.as_str());
    }
    g.completed_at = Some(match g.completed_at {
      Some(prev) if prev >= a.created_at => prev,
      _ => a.created_at,
    });
  }

  if dropped > 0 {
    debug!(target: "sessions", dropped, "Attempts without a resolvable exercise were excluded");
  }

  let mut keyed: Vec<((&str, i64), SessionSummary)> = groups
    .into_iter()
    .filter_map(|(key, g)| {
      let completed_at = g.completed_at?;
      let (exercise_id, _) = key;
      let score = g.correct.len();
      let total = g.attempted.len();
      Some((
        key,
        SessionSummary {
          exercise_id: exercise_id.to_string(),
          exercise_name: exercise_names.get(exercise_id).cloned().unwrap_or_else(|| exercise_id.to_string()),
          score,
          total_questions: total,
          percentage: percentage(score, total),
          completed_at,
        },
      ))
    })
    .collect();

  // Most recent first; ties fall back to the grouping key so output is stable.
  keyed.sort_by(|(ka, a), (kb, b)| b.completed_at.cmp(&a.completed_at).then_with(|| ka.cmp(kb)));
  keyed.into_iter().map(|(_, s)| s).collect()
}

/// Summaries for one 1-based page of `PAGE_SIZE` items. Pages below 1 are
/// treated as 1; pages past the end are empty.
pub fn aggregate(attempts: &[AttemptRecord], exercise_names: &HashMap<String, String>, page: usize) -> SessionPage {
  let page = page.max(1);
  let all = summarize(attempts, exercise_names);
  let total_items = all.len();
  let total_pages = total_items.div_ceil(PAGE_SIZE);
  let skip = (page - 1).saturating_mul(PAGE_SIZE);
  let sessions: Vec<SessionSummary> = all.into_iter().skip(skip).take(PAGE_SIZE).collect();

  SessionPage {
    sessions,
    pagination: Pagination { current_page: page, total_pages, total_items, has_more: page < total_pages },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
  }

  fn attempt(q: &str, ex: Option<&str>, ok: bool, ts: DateTime<Utc>) -> AttemptRecord {
    AttemptRecord { question_id: q.into(), exercise_id: ex.map(str::to_string), is_correct: ok, created_at: ts }
  }

  fn names() -> HashMap<String, String> {
    HashMap::from([("ex-a".to_string(), "Present simple".to_string()), ("ex-b".to_string(), "Past simple".to_string())])
  }

  #[test]
  fn empty_input_yields_empty_page() {
    let page = aggregate(&[], &names(), 1);
    assert!(page.sessions.is_empty());
    assert_eq!(page.pagination, Pagination { current_page: 1, total_pages: 0, total_items: 0, has_more: false });
  }

  #[test]
  fn scores_distinct_questions_within_a_session() {
    let attempts = vec![
      attempt("q1", Some("ex-a"), false, at(10, 0, 0)),
      attempt("q1", Some("ex-a"), true, at(10, 5, 0)),
      attempt("q1", Some("ex-a"), true, at(10, 6, 0)),
      attempt("q2", Some("ex-a"), false, at(10, 7, 0)),
      attempt("q3", Some("ex-a"), false, at(10, 8, 0)),
    ];
    let page = aggregate(&attempts, &names(), 1);
    assert_eq!(page.sessions.len(), 1);
    let s = &page.sessions[0];
    assert_eq!(s.exercise_name, "Present simple");
    assert_eq!((s.score, s.total_questions, s.percentage), (1, 3, 33));
    assert_eq!(s.completed_at, at(10, 8, 0));
  }

  #[test]
  fn hour_boundary_splits_and_exercise_separates() {
    let attempts = vec![
      attempt("q1", Some("ex-a"), true, at(10, 59, 59)),
      attempt("q2", Some("ex-a"), true, at(11, 0, 1)),
      attempt("q9", Some("ex-b"), true, at(11, 0, 2)),
      attempt("q3", Some("ex-a"), true, at(11, 59, 0)),
    ];
    let sessions = summarize(&attempts, &names());
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0].exercise_id, "ex-a");
    assert_eq!(sessions[0].total_questions, 2);
    assert_eq!(sessions[0].completed_at, at(11, 59, 0));
    assert_eq!(sessions[1].exercise_id, "ex-b");
    assert_eq!(sessions[2].completed_at, at(10, 59, 59));
  }

  #[test]
  fn unlinked_attempts_are_excluded() {
    let attempts = vec![attempt("q1", None, true, at(9, 0, 0)), attempt("q2", Some("ex-b"), false, at(9, 1, 0))];
    let sessions = summarize(&attempts, &names());
    assert_eq!(sessions.len(), 1);
    assert_eq!((sessions[0].score, sessions[0].total_questions, sessions[0].percentage), (0, 1, 0));
  }

  #[test]
  fn unknown_exercise_name_falls_back_to_id() {
    let sessions = summarize(&[attempt("q1", Some("ex-z"), true, at(9, 0, 0))], &names());
    assert_eq!(sessions[0].exercise_name, "ex-z");
    assert_eq!(sessions[0].percentage, 100);
  }

  #[test]
  fn percentage_rounds_and_guards_zero() {
    assert_eq!(percentage(0, 0), 0);
    assert_eq!(percentage(2, 3), 67);
    assert_eq!(percentage(1, 2), 50);
    assert_eq!(percentage(1, 8), 13);
  }

  fn many_sessions(n: u32) -> Vec<AttemptRecord> {
    (0..n)
      .map(|i| {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i as i64);
        attempt(&format!("q{i}"), Some("ex-a"), i % 2 == 0, ts)
      })
      .collect()
  }

  #[test]
  fn pages_cover_everything_once_in_order() {
    let attempts = many_sessions(23);
    let full = summarize(&attempts, &names());
    assert!(full.windows(2).all(|w| w[0].completed_at >= w[1].completed_at));

    let first = aggregate(&attempts, &names(), 1);
    assert_eq!(first.pagination.total_pages, 3);
    assert_eq!(first.pagination.total_items, 23);
    assert!(first.pagination.has_more);

    let mut joined = Vec::new();
    for p in 1..=first.pagination.total_pages {
      let page = aggregate(&attempts, &names(), p);
      assert!(page.sessions.len() <= PAGE_SIZE);
      joined.extend(page.sessions);
    }
    assert_eq!(joined, full);

    let last = aggregate(&attempts, &names(), 3);
    assert_eq!(last.sessions.len(), 3);
    assert!(!last.pagination.has_more);
  }

  #[test]
  fn out_of_range_page_is_empty_and_repeat_calls_match() {
    let attempts = many_sessions(5);
    let page = aggregate(&attempts, &names(), 7);
    assert!(page.sessions.is_empty());
    assert!(!page.pagination.has_more);
    assert_eq!(aggregate(&attempts, &names(), 1), aggregate(&attempts, &names(), 1));
    assert_eq!(aggregate(&attempts, &names(), 0).pagination.current_page, 1);
  }

  #[test]
  fn score_never_exceeds_total() {
    let attempts = many_sessions(12);
    for s in summarize(&attempts, &names()) {
      assert!(s.score <= s.total_questions);
      assert_eq!(s.percentage, percentage(s.score, s.total_questions));
    }
  }
}
