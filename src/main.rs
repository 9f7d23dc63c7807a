mod config;
mod quiz;

use std::sync::Arc;

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use config::Config;
use dotenv::dotenv;
use log::{debug, error, info, warn};
use quiz::{
    ai_helper::QuizHelper,
    session::{QuizResult, QuizSession},
    Question, QuizError, QuizLevel,
};
use teloxide::{
    dispatching::dialogue::{ErasedStorage, InMemStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, KeyboardRemove},
    utils::command::BotCommands,
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SessionStorage = std::sync::Arc<ErasedStorage<State>>;

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveSourceText {
        session: QuizSession,
    },
    ReceiveLevel {
        session: QuizSession,
    },
    Answering {
        session: QuizSession,
        question_number: usize,
    },
    Scored {
        session: QuizSession,
    },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "start over with a new text.")]
    Start,
    #[command(description = "drop the current quiz.")]
    Cancel,
}

#[tokio::main]
async fn main() {
    let dotenv_loaded = dotenv();
    pretty_env_logger::init();
    if let Err(e) = dotenv_loaded {
        debug!("No .env file loaded: {}", e);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}. Please set it in the .env file.", e);
            std::process::exit(1);
        }
    };

    info!("Starting quiz bot...");

    let gpt = match ChatGPT::new(config.chatgpt_api_key.clone()) {
        Ok(mut gpt) => {
            gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
            gpt.config.timeout = config.model_timeout;
            gpt
        }
        Err(e) => {
            error!("Unable to set up the ChatGPT client: {}", e);
            std::process::exit(1);
        }
    };
    let quiz_helper = Arc::new(QuizHelper::new(gpt));

    let bot = Bot::new(config.telegram_token.clone());
    let storage: SessionStorage = InMemStorage::<State>::new().erase();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveSourceText { session }].endpoint(receive_source_text))
            .branch(dptree::case![State::ReceiveLevel { session }].endpoint(receive_level))
            .branch(
                dptree::case![State::Answering {
                    session,
                    question_number
                }]
                .endpoint(receive_answer),
            )
            .branch(dptree::case![State::Scored { session }].endpoint(scored)),
    )
    .dependencies(dptree::deps![storage, quiz_helper])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "Hi! I turn any text into a multiple choice quiz.";
const PASTE_TEXT: &str = "Paste the text content here:";
const SELECT_LEVEL: &str = "Select quiz level:";
const SUBMIT_BUTTON: &str = "Submit";
const RESTART_BUTTON: &str = "Restart Quiz";

// Telegram rejects messages longer than 4096 characters.
const MESSAGE_LIMIT: usize = 4000;

async fn handle_command(bot: Bot, dialogue: QuizDialogue, msg: Message, cmd: Command) -> HandlerResult {
    match cmd {
        Command::Start => start(bot, dialogue, msg).await,
        Command::Cancel => {
            info!("Chat {} cancelled its quiz", msg.chat.id);
            ask_for_text(&bot, msg.chat.id, "Quiz dropped.").await?;
            dialogue
                .update(State::ReceiveSourceText {
                    session: QuizSession::new(),
                })
                .await?;
            Ok(())
        }
    }
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    ask_for_text(&bot, msg.chat.id, GREETING_TEXT).await?;
    dialogue
        .update(State::ReceiveSourceText {
            session: QuizSession::new(),
        })
        .await?;
    Ok(())
}

async fn ask_for_text(bot: &Bot, chat_id: ChatId, preface: &str) -> HandlerResult {
    bot.send_message(chat_id, format!("{}\n\n{}", preface, PASTE_TEXT))
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}

fn level_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![QuizLevel::ALL
        .iter()
        .map(|level| KeyboardButton::new(level.button_label()))
        .collect::<Vec<_>>()])
}

async fn receive_source_text(
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please paste the text as a message.")
            .await?;
        return Ok(());
    };

    session.set_source_text(text)?;

    bot.send_message(msg.chat.id, SELECT_LEVEL)
        .reply_markup(level_keyboard())
        .await?;
    dialogue.update(State::ReceiveLevel { session }).await?;
    Ok(())
}

async fn receive_level(
    bot: Bot,
    dialogue: QuizDialogue,
    quiz_helper: Arc<QuizHelper>,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let level = match msg.text().map(str::parse::<QuizLevel>) {
        Some(Ok(level)) => level,
        _ => {
            bot.send_message(
                msg.chat.id,
                "Please choose one of the levels, or /cancel to paste a different text.",
            )
            .reply_markup(level_keyboard())
            .await?;
            return Ok(());
        }
    };

    // Only cosmetic, so a failure here is ignored
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
    bot.send_message(msg.chat.id, "Generating your quiz...")
        .reply_markup(KeyboardRemove::new())
        .await?;

    if let Err(e) = session.generate(&quiz_helper, level).await {
        warn!(
            "Chat {} could not get a quiz from {} characters of text: {}",
            msg.chat.id,
            session.source_text().chars().count(),
            e
        );
        bot.send_message(msg.chat.id, generation_error_text(&e))
            .reply_markup(level_keyboard())
            .await?;
        dialogue.update(State::ReceiveLevel { session }).await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Quiz Questions").await?;
    if session.questions().is_empty() {
        bot.send_message(msg.chat.id, "The model returned no questions for this text.")
            .reply_markup(submit_keyboard())
            .await?;
    } else {
        send_question(&bot, msg.chat.id, &session, 0).await?;
    }

    dialogue
        .update(State::Answering {
            session,
            question_number: 0,
        })
        .await?;
    Ok(())
}

fn generation_error_text(e: &QuizError) -> String {
    match e {
        QuizError::InvalidJson(_) => {
            "Error: the model's response is not valid JSON. Try again.".to_string()
        }
        e if e.is_retryable() => format!("Error fetching quiz: {}. Try again.", e),
        e => format!("Error fetching quiz: {}", e),
    }
}

fn submit_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(SUBMIT_BUTTON)]])
}

fn question_keyboard(question: &Question) -> KeyboardMarkup {
    let mut rows = question
        .options
        .values()
        .map(|text| vec![KeyboardButton::new(text.as_str())])
        .collect::<Vec<_>>();
    rows.push(vec![KeyboardButton::new(SUBMIT_BUTTON)]);
    KeyboardMarkup::new(rows)
}

/// Option texts are matched before the Submit button, so an option that
/// happens to read "Submit" is still an answer.
fn is_option_of(question: Option<&Question>, answer: &str) -> bool {
    question.is_some_and(|q| q.options.values().any(|text| text == answer))
}

fn question_text(question: &Question, index: usize, total: usize) -> String {
    format!("Question {} of {}:\n{}", index + 1, total, question.mcq)
}

async fn send_question(bot: &Bot, chat_id: ChatId, session: &QuizSession, index: usize) -> HandlerResult {
    let questions = session.questions();
    let question = &questions[index];
    send_packed(
        bot,
        chat_id,
        &[question_text(question, index, questions.len())],
        question_keyboard(question),
    )
    .await
}

async fn receive_answer(
    bot: Bot,
    dialogue: QuizDialogue,
    (mut session, question_number): (QuizSession, usize),
    msg: Message,
) -> HandlerResult {
    let answer = msg.text().unwrap_or_default();
    let current = session.questions().get(question_number);

    let is_option = is_option_of(current, answer);

    if !is_option && answer == SUBMIT_BUTTON {
        let result = session.submit()?;
        let answered = session.selected_answers().iter().flatten().count();
        info!(
            "Chat {} finished a {} quiz, answering {} of {}: {}",
            msg.chat.id,
            session.level().map(|l| l.as_str()).unwrap_or("unknown"),
            answered,
            result.total,
            result
        );
        dialogue
            .update(State::Scored {
                session: session.clone(),
            })
            .await?;
        send_result(&bot, msg.chat.id, &result).await?;
        return Ok(());
    }

    let Some(question) = current else {
        bot.send_message(msg.chat.id, "All questions are answered. Press Submit to see your score.")
            .reply_markup(submit_keyboard())
            .await?;
        return Ok(());
    };

    // The keyboard only offers option texts, anything else was typed by hand
    if !is_option {
        bot.send_message(msg.chat.id, "Please choose one of the options.")
            .reply_markup(question_keyboard(question))
            .await?;
        return Ok(());
    }

    session.select_answer(question_number, answer)?;

    let next = question_number + 1;
    if next < session.questions().len() {
        send_question(&bot, msg.chat.id, &session, next).await?;
    } else {
        bot.send_message(msg.chat.id, "That was the last one. Press Submit to see your score.")
            .reply_markup(submit_keyboard())
            .await?;
    }

    dialogue
        .update(State::Answering {
            session,
            question_number: next,
        })
        .await?;
    Ok(())
}

fn result_blocks(result: &QuizResult) -> Vec<String> {
    let mut blocks = vec!["Quiz Result:".to_string()];
    blocks.extend(result.reviews.iter().map(|review| {
        format!(
            "{}\nYou selected: {}\nCorrect answer: {}",
            review.mcq,
            review.selected.as_deref().unwrap_or("(no answer)"),
            review.correct.as_deref().unwrap_or("(not among the options)"),
        )
    }));
    blocks.push(result.to_string());
    blocks
}

/// Packs blocks into as few messages as fit under `limit` characters.
/// A block longer than the limit is cut into limit-sized pieces.
fn pack_messages(blocks: &[String], limit: usize) -> Vec<String> {
    let mut messages: Vec<String> = Vec::new();
    let mut current = String::new();

    for piece in blocks.iter().flat_map(|block| split_block(block, limit)) {
        let piece_len = piece.chars().count();
        if !current.is_empty() && current.chars().count() + 2 + piece_len > limit {
            messages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&piece);
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

fn split_block(block: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = block.chars().collect();
    if chars.len() <= limit {
        return vec![block.to_string()];
    }
    chars
        .chunks(limit.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Sends `blocks` packed under Telegram's limit, with `keyboard` on the last
/// message.
async fn send_packed(bot: &Bot, chat_id: ChatId, blocks: &[String], keyboard: KeyboardMarkup) -> HandlerResult {
    let messages = pack_messages(blocks, MESSAGE_LIMIT);
    let last = messages.len().saturating_sub(1);

    for (i, text) in messages.into_iter().enumerate() {
        if i == last {
            bot.send_message(chat_id, text)
                .reply_markup(keyboard.clone())
                .await?;
        } else {
            bot.send_message(chat_id, text).await?;
        }
    }
    Ok(())
}

async fn send_result(bot: &Bot, chat_id: ChatId, result: &QuizResult) -> HandlerResult {
    send_packed(
        bot,
        chat_id,
        &result_blocks(result),
        KeyboardMarkup::new(vec![vec![KeyboardButton::new(RESTART_BUTTON)]]),
    )
    .await
}

async fn scored(bot: Bot, dialogue: QuizDialogue, mut session: QuizSession, msg: Message) -> HandlerResult {
    if msg.text() != Some(RESTART_BUTTON) {
        let result = session.result()?;
        bot.send_message(msg.chat.id, format!("{}. Press {} to try another text.", result, RESTART_BUTTON))
            .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(RESTART_BUTTON)]]))
            .await?;
        return Ok(());
    }

    session.restart()?;
    ask_for_text(&bot, msg.chat.id, "Let's make another quiz.").await?;
    dialogue.update(State::ReceiveSourceText { session }).await?;
    Ok(())
}
