//! Chat card rendering for the learn and review messages.
//! Output is the interactive-card JSON accepted by Feishu/Lark bot webhooks.

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use vocabot_core::error::Result;
use vocabot_core::types::VocabEntry;

const NEW_TITLE: &str = "今日必学商务词汇 ✨";
const REVIEW_TITLE: &str = "今日复习单词 🔄";
const ASK_TERM: &str = "📝 请写出英文单词";
const ASK_TRANSLATION: &str = "📝 请写出中文意思";
const LAST_REVIEW: &str = "⏰ 上次复习";
const NEVER_REVIEWED: &str = "未复习过";

/// Which message is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardMode {
    New,
    Review,
}

impl CardMode {
    fn title(self) -> &'static str {
        match self {
            CardMode::New => NEW_TITLE,
            CardMode::Review => REVIEW_TITLE,
        }
    }

    fn template(self) -> &'static str {
        match self {
            CardMode::New => "green",
            CardMode::Review => "blue",
        }
    }
}

/// How a review block quizzes the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPrompt {
    /// Show the translation, ask for the term. No example.
    AskTerm,
    /// Show the term and its example, ask for the translation.
    AskTranslation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookCard {
    pub msg_type: String,
    pub card: Card,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub config: CardConfig,
    pub header: CardHeader,
    pub elements: Vec<CardElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    pub wide_screen_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardHeader {
    pub template: String,
    pub title: CardText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardText {
    pub tag: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardElement {
    pub tag: String,
    pub text: CardText,
}

impl CardElement {
    fn markdown(content: String) -> Self {
        Self {
            tag: "div".into(),
            text: CardText {
                tag: "lark_md".into(),
                content,
            },
        }
    }
}

impl WebhookCard {
    pub fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn block_count(&self) -> usize {
        self.card.elements.len()
    }
}

/// Render a card with the thread RNG choosing review framings.
pub fn build_card(entries: &[VocabEntry], mode: CardMode, today: NaiveDate) -> WebhookCard {
    build_card_with_rng(entries, mode, today, &mut rand::rng())
}

/// Render a card. One block per entry, in order.
pub fn build_card_with_rng<R: Rng + ?Sized>(
    entries: &[VocabEntry],
    mode: CardMode,
    today: NaiveDate,
    rng: &mut R,
) -> WebhookCard {
    let elements = match mode {
        CardMode::New => entries.iter().map(new_word_block).collect(),
        CardMode::Review => entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let prompt = if rng.random_bool(0.5) {
                    ReviewPrompt::AskTerm
                } else {
                    ReviewPrompt::AskTranslation
                };
                review_block(i + 1, e, prompt)
            })
            .collect(),
    };

    WebhookCard {
        msg_type: "interactive".into(),
        card: Card {
            config: CardConfig {
                wide_screen_mode: true,
            },
            header: CardHeader {
                template: mode.template().into(),
                title: CardText {
                    tag: "plain_text".into(),
                    content: format!("{} | {}", mode.title(), today.format("%Y-%m-%d")),
                },
            },
            elements,
        },
    }
}

fn pos_suffix(entry: &VocabEntry) -> String {
    match entry.part_of_speech.as_deref().map(str::trim) {
        Some(pos) if !pos.is_empty() => format!(" _({pos})_"),
        _ => String::new(),
    }
}

fn new_word_block(entry: &VocabEntry) -> CardElement {
    let mut content = format!(
        "✨ **{}**{}\n📝 {}",
        entry.term,
        pos_suffix(entry),
        entry.translation
    );
    if let Some(example) = entry.example() {
        content.push_str(&format!("\n📖 {example}"));
        if let Some(translated) = entry.example_translation() {
            content.push_str(&format!("\n🇨🇳 {translated}"));
        }
    }
    CardElement::markdown(content)
}

/// One numbered review question.
pub fn review_block(index: usize, entry: &VocabEntry, prompt: ReviewPrompt) -> CardElement {
    let last_review = entry
        .last_review_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NEVER_REVIEWED.to_string());

    let content = match prompt {
        ReviewPrompt::AskTerm => format!(
            "{index}. ✨ **{}**{}\n{ASK_TERM}\n{LAST_REVIEW}: {last_review}",
            entry.translation,
            pos_suffix(entry)
        ),
        ReviewPrompt::AskTranslation => {
            let mut content = format!("{index}. ✨ **{}**{}", entry.term, pos_suffix(entry));
            if let Some(example) = entry.example() {
                content.push_str(&format!("\n📖 {example}"));
            }
            content.push_str(&format!("\n{ASK_TRANSLATION}\n{LAST_REVIEW}: {last_review}"));
            content
        }
    };
    CardElement::markdown(content)
}
