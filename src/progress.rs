//! Per-user progress: completed lessons, answer counts and the daily streak.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
  pub completed_lessons: BTreeSet<String>,
  pub total_attempts: u64,
  pub correct_attempts: u64,
  pub current_streak: u32,
  pub longest_streak: u32,
  pub last_active: Option<NaiveDate>,
}

impl UserProgress {
  /// Count one day of activity. Same-day activity does not extend the streak.
  pub fn touch(&mut self, today: NaiveDate) {
    self.current_streak = match self.last_active {
      Some(last) if last == today => self.current_streak.max(1),
      Some(last) if last.checked_add_days(Days::new(1)) == Some(today) => self.current_streak + 1,
      Some(last) if last > today => return, // clock went backwards; keep what we have
      _ => 1,
    };
    self.longest_streak = self.longest_streak.max(self.current_streak);
    self.last_active = Some(today);
  }

  pub fn record_attempt(&mut self, is_correct: bool, today: NaiveDate) {
    self.total_attempts += 1;
    if is_correct {
      self.correct_attempts += 1;
    }
    self.touch(today);
  }

  /// Returns false if the lesson was already completed.
  pub fn complete_lesson(&mut self, lesson_id: &str, today: NaiveDate) -> bool {
    let inserted = self.completed_lessons.insert(lesson_id.to_string());
    self.touch(today);
    inserted
  }

  /// Streak as shown to the user: it lapses once a full day passes without activity.
  pub fn streak_on(&self, today: NaiveDate) -> u32 {
    match self.last_active {
      Some(last) if last == today || last.checked_add_days(Days::new(1)) == Some(today) => self.current_streak,
      _ => 0,
    }
  }

  pub fn accuracy(&self) -> u32 {
    crate::sessions::percentage(self.correct_attempts as usize, self.total_attempts as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
  }

  #[test]
  fn consecutive_days_extend_streak() {
    let mut p = UserProgress::default();
    p.record_attempt(true, d(1));
    p.record_attempt(false, d(1));
    p.record_attempt(true, d(2));
    p.record_attempt(true, d(3));
    assert_eq!(p.current_streak, 3);
    assert_eq!(p.longest_streak, 3);
    assert_eq!((p.total_attempts, p.correct_attempts), (4, 3));
    assert_eq!(p.accuracy(), 75);
  }

  #[test]
  fn gap_resets_streak_but_keeps_longest() {
    let mut p = UserProgress::default();
    p.touch(d(1));
    p.touch(d(2));
    p.touch(d(5));
    assert_eq!(p.current_streak, 1);
    assert_eq!(p.longest_streak, 2);
  }

  #[test]
  fn displayed_streak_lapses_after_a_missed_day() {
    let mut p = UserProgress::default();
    p.touch(d(1));
    p.touch(d(2));
    assert_eq!(p.streak_on(d(3)), 2);
    assert_eq!(p.streak_on(d(4)), 0);
  }

  #[test]
  fn lessons_complete_once() {
    let mut p = UserProgress::default();
    assert!(p.complete_lesson("present-simple", d(1)));
    assert!(!p.complete_lesson("present-simple", d(1)));
    assert_eq!(p.completed_lessons.len(), 1);
    assert_eq!(p.current_streak, 1);
  }
}
