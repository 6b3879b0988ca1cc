//! Built-in lessons and exercises so the app is useful without external config or OpenAI.

use crate::domain::{ContentBlock, ContentSource, Exercise, Lesson, Question, QuestionPayload};

pub struct SeedContent {
  pub lessons: Vec<Lesson>,
  pub exercises: Vec<Exercise>,
  pub questions: Vec<Question>,
}

fn q(id: &str, exercise_id: &str, prompt: &str, payload: QuestionPayload) -> Question {
  Question { id: id.into(), exercise_id: exercise_id.into(), prompt: prompt.into(), payload }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

pub fn seed_content() -> SeedContent {
  let lessons = vec![
    Lesson {
      id: "present-simple".into(),
      title: "Present simple".into(),
      level: "a1".into(),
      summary: "Habits, routines and facts.".into(),
      blocks: vec![
        ContentBlock::Heading { text: "When to use it".into() },
        ContentBlock::Paragraph { text: "Use the present simple for habits, routines and things that are always true.".into() },
        ContentBlock::Example { sentence: "He goes to school by bus.".into(), note: Some("third person singular adds -s / -es".into()) },
        ContentBlock::Tip { text: "Watch the -s with he, she and it.".into() },
      ],
      exercise_ids: vec!["ex-present-simple".into()],
    },
    Lesson {
      id: "past-simple".into(),
      title: "Past simple".into(),
      level: "a2".into(),
      summary: "Finished actions in the past.".into(),
      blocks: vec![
        ContentBlock::Heading { text: "Finished actions".into() },
        ContentBlock::Paragraph { text: "Use the past simple for actions that started and finished at a known time in the past.".into() },
        ContentBlock::Example { sentence: "I went to London last year.".into(), note: Some("go → went is irregular".into()) },
      ],
      exercise_ids: vec!["ex-past-simple".into()],
    },
  ];

  let exercises = vec![
    Exercise {
      id: "ex-present-simple".into(),
      lesson_id: Some("present-simple".into()),
      title: "Present simple practice".into(),
      source: ContentSource::Seed,
      question_ids: strings(&["q-ps-1", "q-ps-2", "q-ps-3", "q-ps-4"]),
    },
    Exercise {
      id: "ex-past-simple".into(),
      lesson_id: Some("past-simple".into()),
      title: "Past simple practice".into(),
      source: ContentSource::Seed,
      question_ids: strings(&["q-past-1", "q-past-2"]),
    },
  ];

  let questions = vec![
    q("q-ps-1", "ex-present-simple", "Choose the correct form: He ___ to school every day.",
      QuestionPayload::Choice { options: strings(&["go", "goes", "going", "went"]), correct_index: 1 }),
    q("q-ps-2", "ex-present-simple", "Fill in the blank.",
      QuestionPayload::Cloze { template: "He {{1}} to school".into(), answers: strings(&["goes"]) }),
    q("q-ps-3", "ex-present-simple", "Put the words in the correct order.",
      QuestionPayload::Reorder { tokens: strings(&["I", "go", "to", "school"]) }),
    q("q-ps-4", "ex-present-simple", "Translate into English: «Ella trabaja en un hospital.»",
      QuestionPayload::Translate { reference: "She works in a hospital.".into() }),
    q("q-past-1", "ex-past-simple", "Choose the correct form: Yesterday I ___ to the park.",
      QuestionPayload::Choice { options: strings(&["go", "goes", "going", "went"]), correct_index: 3 }),
    q("q-past-2", "ex-past-simple", "Fill in the blanks.",
      QuestionPayload::Cloze { template: "She {{1}} a letter and {{2}} it.".into(), answers: strings(&["wrote", "sent"]) }),
  ];

  SeedContent { lessons, exercises, questions }
}
