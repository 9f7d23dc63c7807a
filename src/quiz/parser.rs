use log::warn;
use serde_json::error::Category;

use crate::quiz::{Question, QuizError, QuizResponse};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Questions recovered from a model reply, plus the reason they are missing
/// if the reply could not be used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuiz {
    pub questions: Vec<Question>,
    pub error: Option<QuizError>,
}

impl ParsedQuiz {
    pub fn ok(questions: Vec<Question>) -> Self {
        Self {
            questions,
            error: None,
        }
    }

    pub fn failed(error: QuizError) -> Self {
        Self {
            questions: Vec::new(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Vec<Question>, QuizError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.questions),
        }
    }
}

/// Removes markdown code fences wherever they appear.
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace(JSON_FENCE, "")
        .replace(FENCE, "")
        .trim()
        .to_string()
}

/// Decodes a model reply into questions. Never panics; a reply that cannot
/// be decoded yields no questions and an error.
pub fn parse_quiz_response(raw: &str) -> ParsedQuiz {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str::<QuizResponse>(&cleaned) {
        Ok(response) => ParsedQuiz::ok(response.mcqs),
        Err(err) => {
            warn!("Could not decode quiz reply: {}", err);
            match err.classify() {
                Category::Syntax | Category::Eof => {
                    ParsedQuiz::failed(QuizError::InvalidJson(err.to_string()))
                }
                Category::Data | Category::Io => {
                    ParsedQuiz::failed(QuizError::UnexpectedShape(err.to_string()))
                }
            }
        }
    }
}

/// Checks every question has options and that its `correct` code names one
/// of them.
pub fn validate_questions(questions: &[Question]) -> Result<(), QuizError> {
    for (index, question) in questions.iter().enumerate() {
        if question.options.is_empty() {
            return Err(QuizError::SchemaViolation {
                index,
                reason: "it has no options".to_string(),
            });
        }
        if !question.options.contains_key(&question.correct) {
            return Err(QuizError::SchemaViolation {
                index,
                reason: format!("correct answer {:?} is not one of its options", question.correct),
            });
        }
    }
    Ok(())
}
