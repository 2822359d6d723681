use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{AiConfig, PromptConfig};
use crate::retry::{generation_retry, FailureClass, RetryDecision};
use crate::types::Article;

pub const MAX_GENERATION_ATTEMPTS: u32 = 3;

/// A failed AI call, tagged with whether the call site should retry.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GenerationFailure {
    pub class: FailureClass,
    pub message: String,
}

impl GenerationFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Retryable,
            message: message.into(),
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::NonRetryable,
            message: message.into(),
        }
    }
}

/// The AI-service seam. Production uses `GeminiClient`; tests script
/// responses.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationFailure>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for std::sync::Arc<T> {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationFailure> {
        (**self).generate(prompt).await
    }
}

/// Renders the article list into the summarization prompt. Shared with the
/// budget truncator so both measure the exact same serialization.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
    summary_count: usize,
    hours_threshold: i64,
    language: String,
}

impl PromptBuilder {
    pub fn new(prompts: &PromptConfig, ai: &AiConfig, hours_threshold: i64) -> Self {
        Self {
            template: prompts.summary.clone(),
            summary_count: ai.summary_count,
            hours_threshold,
            language: ai.language.clone(),
        }
    }

    /// One block per article: source tag, title, optional excerpt, link,
    /// published time (or "unknown"). Blocks are separated by blank lines.
    pub fn articles_text(&self, articles: &[Article]) -> String {
        articles
            .iter()
            .map(|article| {
                let mut block = format!("[{}] {}\n", article.source, article.title);
                if let Some(summary) = &article.summary {
                    block.push_str(summary);
                    block.push('\n');
                }
                block.push_str(&format!("Link: {}\n", article.link));
                block.push_str(&format!(
                    "Published: {}",
                    article
                        .published
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string())
                ));
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn render(&self, articles: &[Article]) -> String {
        self.template
            .replace("{summary_count}", &self.summary_count.to_string())
            .replace("{hours_threshold}", &self.hours_threshold.to_string())
            .replace("{language}", &self.language)
            .replace("{now}", &Utc::now().format("%Y-%m-%d %H:%M UTC").to_string())
            .replace("{articles_text}", &self.articles_text(articles))
    }
}

/// Wraps the AI call in the classified-retry policy and guarantees output:
/// either the model's digest or a deterministic fallback listing.
pub struct DigestGenerator<G: TextGenerator> {
    client: G,
    prompt: PromptBuilder,
    summary_count: usize,
    min_output_chars: usize,
}

impl<G: TextGenerator> DigestGenerator<G> {
    pub fn new(client: G, prompt: PromptBuilder, ai: &AiConfig) -> Self {
        // 80 chars per expected item approximates the original thresholds:
        // 800 for a ten-story digest, floor of 200 for small ones.
        let min_output_chars = ai
            .min_summary_length
            .unwrap_or_else(|| (ai.summary_count * 80).clamp(200, 800));
        Self {
            client,
            prompt,
            summary_count: ai.summary_count,
            min_output_chars,
        }
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompt
    }

    /// Produces digest text for a non-empty article list. Empty input is a
    /// no-op: no AI call, `None` returned. Exhausted or aborted retries fall
    /// back to a plain listing, so a non-empty input always yields `Some`.
    pub async fn generate(&self, articles: &[Article]) -> Option<String> {
        if articles.is_empty() {
            info!("no articles to summarize");
            return None;
        }

        let prompt = self.prompt.render(articles);
        debug!("prompt rendered ({} chars)", prompt.chars().count());

        for attempt in 0..MAX_GENERATION_ATTEMPTS {
            let failure = match self.client.generate(&prompt).await {
                Ok(text) => {
                    let text = text.trim().to_string();
                    let length = text.chars().count();
                    if length >= self.min_output_chars {
                        info!("digest generated ({} chars)", length);
                        return Some(text);
                    }
                    GenerationFailure::retryable(format!(
                        "output too short: {} chars (minimum {})",
                        length, self.min_output_chars
                    ))
                }
                Err(failure) => failure,
            };

            match generation_retry(failure.class, attempt, MAX_GENERATION_ATTEMPTS) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        "generation attempt {}/{} failed: {}, retrying in {:?}",
                        attempt + 1,
                        MAX_GENERATION_ATTEMPTS,
                        failure,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Abort => {
                    error!(
                        "generation gave up on attempt {}: {}",
                        attempt + 1,
                        failure
                    );
                    break;
                }
            }
        }

        warn!("returning fallback digest built from raw articles");
        Some(self.fallback_digest(articles))
    }

    /// Pure string formatting over the top N raw articles; cannot fail.
    fn fallback_digest(&self, articles: &[Article]) -> String {
        let mut digest = String::from(
            "Automated summary unavailable; manual review needed.\n\nLatest headlines:\n",
        );
        for (i, article) in articles.iter().take(self.summary_count).enumerate() {
            digest.push_str(&format!(
                "\n{}. [{}] {}\n   {}\n",
                i + 1,
                article.source,
                article.title,
                article.link
            ));
        }
        digest
    }
}
