use std::collections::HashMap;

use async_trait::async_trait;
use chatgpt::prelude::*;
use chatgpt::types::CompletionResponse;
use log::{debug, error, info};
use tokio::sync::Mutex;

use crate::quiz::parser::{parse_quiz_response, validate_questions};
use crate::quiz::prompt::build_prompt;
use crate::quiz::{Question, QuizError, QuizLevel};

/// Something that turns a prompt into a completion.
#[async_trait]
pub trait QuizModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, QuizError>;
}

#[async_trait]
impl QuizModel for ChatGPT {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, QuizError> {
        let response: CompletionResponse = self
            .send_message(prompt)
            .await
            .map_err(|e| QuizError::ModelInvocation(e.to_string()))?;
        Ok(response.message().clone().content)
    }
}

type CacheKey = (String, QuizLevel);

/// Generates quizzes and remembers every successful one for the lifetime of
/// the process. Nothing is ever evicted. Failures are not remembered, so
/// asking again really asks the model again.
pub struct QuizHelper {
    model: Box<dyn QuizModel>,
    cache: Mutex<HashMap<CacheKey, Vec<Question>>>,
}

impl QuizHelper {
    pub fn new(model: impl QuizModel + 'static) -> Self {
        Self {
            model: Box::new(model),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn fetch_questions(
        &self,
        source_text: &str,
        level: QuizLevel,
    ) -> std::result::Result<Vec<Question>, QuizError> {
        let key = (source_text.to_string(), level);
        if let Some(questions) = self.cache.lock().await.get(&key) {
            debug!("Serving {} {} questions from cache", questions.len(), level);
            return Ok(questions.clone());
        }

        info!(
            "Generating a {} quiz from {} characters of text",
            level,
            source_text.chars().count()
        );
        let prompt = build_prompt(source_text, level);
        debug!("Prompt: {:?}", prompt);

        let completion = self.model.complete(&prompt).await.map_err(|e| {
            error!("Quiz generation failed: {}", e);
            e
        })?;
        debug!("Completion: {:?}", completion);

        let questions = parse_quiz_response(&completion).into_result()?;
        validate_questions(&questions)?;

        info!("Generated {} questions", questions.len());
        self.cache.lock().await.insert(key, questions.clone());
        Ok(questions)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Replays canned completions in order and records every prompt.
    #[derive(Clone, Default)]
    pub struct ScriptedModel {
        replies: Arc<std::sync::Mutex<VecDeque<std::result::Result<String, QuizError>>>>,
        prompts: Arc<std::sync::Mutex<Vec<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedModel {
        pub fn replying(replies: impl IntoIterator<Item = &'static str>) -> Self {
            let model = Self::default();
            for reply in replies {
                model.push(Ok(reply.to_string()));
            }
            model
        }

        pub fn push(&self, reply: std::result::Result<String, QuizError>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl QuizModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, QuizError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(QuizError::ModelInvocation("no scripted reply".to_string())))
        }
    }

    pub const PHOTOSYNTHESIS_REPLY: &str = r#"```json
{"mcqs":[{"mcq":"What does photosynthesis convert?","options":{"a":"Light to energy","b":"Water to oxygen","c":"Sound to heat","d":"Energy to mass"},"correct":"a"}]}
```"#;

    #[tokio::test]
    async fn sends_the_built_prompt() {
        let model = ScriptedModel::replying([PHOTOSYNTHESIS_REPLY]);
        let helper = QuizHelper::new(model.clone());

        let questions = helper
            .fetch_questions("Photosynthesis converts light to energy.", QuizLevel::Easy)
            .await
            .unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(
            model.last_prompt(),
            Some(build_prompt("Photosynthesis converts light to energy.", QuizLevel::Easy))
        );
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache() {
        let model = ScriptedModel::replying([PHOTOSYNTHESIS_REPLY, PHOTOSYNTHESIS_REPLY]);
        let helper = QuizHelper::new(model.clone());

        let first = helper.fetch_questions("text", QuizLevel::Easy).await.unwrap();
        let second = helper.fetch_questions("text", QuizLevel::Easy).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(model.calls(), 1);

        helper.fetch_questions("text", QuizLevel::Hard).await.unwrap();
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let model = ScriptedModel::replying(["not json at all", PHOTOSYNTHESIS_REPLY]);
        let helper = QuizHelper::new(model.clone());

        let err = helper.fetch_questions("text", QuizLevel::Medium).await.unwrap_err();
        assert!(matches!(err, QuizError::InvalidJson(_)));

        let retried = helper.fetch_questions("text", QuizLevel::Medium).await.unwrap();
        assert_eq!(retried.len(), 1);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn model_errors_carry_their_message() {
        let model = ScriptedModel::default();
        model.push(Err(QuizError::ModelInvocation("quota exceeded".to_string())));
        let helper = QuizHelper::new(model);

        let err = helper.fetch_questions("text", QuizLevel::Easy).await.unwrap_err();
        assert_eq!(err, QuizError::ModelInvocation("quota exceeded".to_string()));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn inconsistent_questions_are_rejected() {
        let model = ScriptedModel::replying([
            r#"{"mcqs":[{"mcq":"Q","options":{"a":"x","b":"y"},"correct":"e"}]}"#,
        ]);
        let helper = QuizHelper::new(model);

        let err = helper.fetch_questions("text", QuizLevel::Easy).await.unwrap_err();
        assert!(matches!(err, QuizError::SchemaViolation { index: 0, .. }));
        assert!(err.is_retryable());
    }
}
