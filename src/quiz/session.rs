use std::fmt;

use crate::quiz::ai_helper::QuizHelper;
use crate::quiz::{Question, QuizError, QuizLevel};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Collecting,
    Answering,
    Scored,
}

impl Phase {
    fn describe(&self) -> &'static str {
        match self {
            Phase::Collecting => "collecting input",
            Phase::Answering => "answering",
            Phase::Scored => "showing results",
        }
    }
}

/// Everything one user has done since the last restart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizSession {
    phase: Phase,
    source_text: String,
    level: Option<QuizLevel>,
    questions: Vec<Question>,
    selected_answers: Vec<Option<String>>,
}

impl QuizSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn level(&self) -> Option<QuizLevel> {
        self.level
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn selected_answers(&self) -> &[Option<String>] {
        &self.selected_answers
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), QuizError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(QuizError::InvalidTransition {
                action,
                phase: self.phase.describe(),
            })
        }
    }

    pub fn set_source_text(&mut self, text: impl Into<String>) -> Result<(), QuizError> {
        self.expect_phase(Phase::Collecting, "change the text")?;
        self.source_text = text.into();
        Ok(())
    }

    /// Asks the helper for questions about the current text.
    ///
    /// Any successful reply moves the session to answering, even one with no
    /// questions. A failed one leaves it collecting so the user can try again.
    pub async fn generate(&mut self, helper: &QuizHelper, level: QuizLevel) -> Result<(), QuizError> {
        self.expect_phase(Phase::Collecting, "generate a quiz")?;
        self.level = Some(level);

        let questions = helper.fetch_questions(&self.source_text, level).await?;
        self.begin(questions);
        Ok(())
    }

    fn begin(&mut self, questions: Vec<Question>) {
        self.selected_answers = vec![None; questions.len()];
        self.questions = questions;
        self.phase = Phase::Answering;
    }

    pub fn select_answer(&mut self, index: usize, value: impl Into<String>) -> Result<(), QuizError> {
        self.expect_phase(Phase::Answering, "answer a question")?;
        let len = self.selected_answers.len();
        let slot = self
            .selected_answers
            .get_mut(index)
            .ok_or(QuizError::AnswerOutOfRange { index, len })?;
        *slot = Some(value.into());
        Ok(())
    }

    pub fn submit(&mut self) -> Result<QuizResult, QuizError> {
        self.expect_phase(Phase::Answering, "submit")?;
        self.phase = Phase::Scored;
        Ok(self.score())
    }

    /// The result of a submitted quiz, for showing it again.
    pub fn result(&self) -> Result<QuizResult, QuizError> {
        self.expect_phase(Phase::Scored, "show results")?;
        Ok(self.score())
    }

    pub fn restart(&mut self) -> Result<(), QuizError> {
        self.expect_phase(Phase::Scored, "restart")?;
        *self = QuizSession::new();
        Ok(())
    }

    fn score(&self) -> QuizResult {
        let reviews: Vec<QuestionReview> = self
            .questions
            .iter()
            .zip(&self.selected_answers)
            .map(|(question, selected)| QuestionReview {
                mcq: question.mcq.clone(),
                selected: selected.clone(),
                correct: question.correct_text().map(str::to_string),
                is_correct: question.is_answered_correctly(selected.as_deref()),
            })
            .collect();

        QuizResult {
            score: reviews.iter().filter(|r| r.is_correct).count(),
            total: self.questions.len(),
            reviews,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub mcq: String,
    pub selected: Option<String>,
    /// `None` when the question's correct code matches none of its options.
    pub correct: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub reviews: Vec<QuestionReview>,
}

impl fmt::Display for QuizResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "You scored {} out of {}", self.score, self.total)
    }
}
