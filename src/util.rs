//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Trim and lowercase an answer for case-insensitive comparison.
pub fn normalize_answer(s: &str) -> String {
  s.trim().to_lowercase()
}

/// Collapse inner whitespace and drop trailing sentence punctuation.
/// Used by the offline translate check.
pub fn normalize_sentence(s: &str) -> String {
  let lowered = normalize_answer(s);
  let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
  collapsed.trim_end_matches(|c| matches!(c, '.' | '!' | '?')).to_string()
}

/// Number of `{{n}}` blanks in a cloze template.
pub fn count_blanks(template: &str) -> usize {
  let mut count = 0;
  let mut rest = template;
  while let Some(start) = rest.find("{{") {
    let after = &rest[start + 2..];
    match after.find("}}") {
      Some(end) if !after[..end].is_empty() && after[..end].chars().all(|c| c.is_ascii_digit()) => {
        count += 1;
        rest = &after[end + 2..];
      }
      _ => rest = after,
    }
  }
  count
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_named_placeholders() {
    let out = fill_template("Topic: {topic}, level {level}", &[("topic", "past simple"), ("level", "a2")]);
    assert_eq!(out, "Topic: past simple, level a2");
  }

  #[test]
  fn counts_numbered_blanks_only() {
    assert_eq!(count_blanks("He {{1}} to school"), 1);
    assert_eq!(count_blanks("{{1}} and {{2}}, not {{x}} or {{}}"), 2);
    assert_eq!(count_blanks("no blanks"), 0);
  }

  #[test]
  fn sentence_normalization_ignores_case_spacing_and_final_punct() {
    assert_eq!(normalize_sentence("  I  go to School. "), "i go to school");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    assert!(trunc_for_log("ééééé", 2).starts_with("éé…"));
  }
}
