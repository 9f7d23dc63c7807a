pub mod ai_helper;
pub mod error;
pub mod parser;
pub mod prompt;
pub mod session;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

pub use error::QuizError;

/// Difficulty label passed to the generation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuizLevel {
    Easy,
    Medium,
    Hard,
}

impl QuizLevel {
    pub const ALL: [QuizLevel; 3] = [QuizLevel::Easy, QuizLevel::Medium, QuizLevel::Hard];

    /// The lowercase label embedded in the prompt.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizLevel::Easy => "easy",
            QuizLevel::Medium => "medium",
            QuizLevel::Hard => "hard",
        }
    }

    /// The label shown on the level keyboard.
    pub fn button_label(&self) -> &'static str {
        match self {
            QuizLevel::Easy => "Easy",
            QuizLevel::Medium => "Medium",
            QuizLevel::Hard => "Hard",
        }
    }
}

impl fmt::Display for QuizLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuizLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown quiz level: {s:?}"))
    }
}

/// Option code -> option text, in the order the model emitted them.
pub type QuizOptions = IndexMap<String, String>;

pub fn options_from(pairs: &[(&str, &str)]) -> QuizOptions {
    pairs
        .iter()
        .map(|(code, text)| (code.to_string(), text.to_string()))
        .collect()
}

/// One multiple-choice question as the model emits it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub mcq: String,
    #[serde(default)]
    pub options: QuizOptions,
    #[serde(default)]
    pub correct: String,
}

impl Question {
    pub fn new(mcq: String, options: QuizOptions, correct: String) -> Self {
        Self {
            mcq,
            options,
            correct,
        }
    }

    /// Display text of the correct option, if the model's key points at one.
    pub fn correct_text(&self) -> Option<&str> {
        self.options.get(&self.correct).map(String::as_str)
    }

    /// Answers are compared by display text, not by option code, so two
    /// options with identical text are both accepted.
    pub fn is_answered_correctly(&self, selected: Option<&str>) -> bool {
        match (selected, self.correct_text()) {
            (Some(selected), Some(correct)) => selected == correct,
            _ => false,
        }
    }
}

/// Top-level shape of the model's reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizResponse {
    #[serde(default)]
    pub mcqs: Vec<Question>,
}

impl QuizResponse {
    pub fn new(mcqs: Vec<Question>) -> Self {
        Self { mcqs }
    }

    /// The one-question sample shown to the model as the target schema.
    pub fn sample() -> Self {
        let options = options_from(&[
            ("a", "Choice 1"),
            ("b", "Choice 2"),
            ("c", "Choice 3"),
            ("d", "Choice 4"),
        ]);

        Self::new(vec![Question::new(
            "Sample multiple choice question1".to_string(),
            options,
            "a".to_string(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_any_case() {
        assert_eq!("Easy".parse::<QuizLevel>(), Ok(QuizLevel::Easy));
        assert_eq!("medium".parse::<QuizLevel>(), Ok(QuizLevel::Medium));
        assert_eq!(" HARD ".parse::<QuizLevel>(), Ok(QuizLevel::Hard));
        assert!("extreme".parse::<QuizLevel>().is_err());
        assert_eq!(QuizLevel::Medium.to_string(), "medium");
    }

    #[test]
    fn options_keep_model_order() {
        let question: Question = serde_json::from_str(
            r#"{"mcq":"Pick","options":{"d":"four","a":"one","c":"three"},"correct":"c"}"#,
        )
        .unwrap();

        let keys: Vec<_> = question.options.keys().map(String::as_str).collect();
        assert_eq!(keys, ["d", "a", "c"]);
        assert_eq!(question.correct_text(), Some("three"));
    }

    #[test]
    fn duplicate_option_key_overwrites_in_place() {
        let question: Question = serde_json::from_str(
            r#"{"mcq":"Pick","options":{"a":"first","b":"second","a":"third"},"correct":"a"}"#,
        )
        .unwrap();

        assert_eq!(question.options.len(), 2);
        assert_eq!(question.options.values().collect::<Vec<_>>(), ["third", "second"]);
        assert_eq!(question.correct_text(), Some("third"));
    }

    #[test]
    fn identical_option_texts_are_both_accepted() {
        let options = options_from(&[("a", "Paris"), ("b", "Paris")]);
        let question = Question::new("Capital?".to_string(), options, "a".to_string());

        assert!(question.is_answered_correctly(Some("Paris")));
        assert!(!question.is_answered_correctly(None));
    }

    #[test]
    fn dangling_correct_key_never_scores() {
        let options = options_from(&[("a", "yes"), ("b", "no")]);
        let question = Question::new("Sure?".to_string(), options, "z".to_string());

        assert_eq!(question.correct_text(), None);
        assert!(!question.is_answered_correctly(Some("yes")));
    }
}
