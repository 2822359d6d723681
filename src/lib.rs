pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod fetcher;
pub mod gemini;
pub mod generator;
pub mod pipeline;
pub mod retry;
pub mod telegram;
pub mod truncator;
pub mod types;

pub use collector::FeedCollector;
pub use config::{AppConfig, Credentials, FeedSource};
pub use dispatcher::{escape_markdown, split_message, DeliveryDispatcher};
pub use fetcher::{FeedFetcher, FetchFailure};
pub use gemini::GeminiClient;
pub use generator::{DigestGenerator, GenerationFailure, PromptBuilder, TextGenerator};
pub use pipeline::{Pipeline, RunOutcome, RunReport};
pub use telegram::{Messenger, SendFailure, TelegramBot};
pub use truncator::{BudgetTruncator, CharRatioEstimator, TokenEstimator};
pub use types::{Article, DigestError, Result};
