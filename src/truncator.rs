use tracing::{debug, info, warn};

use crate::generator::PromptBuilder;
use crate::types::Article;

/// Estimates how many model tokens a prompt will cost. An exact tokenizer
/// can be injected; the default approximates from character count.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Character-ratio approximation used when no tokenizer is available.
/// A ratio of 3 chars per token splits the difference between Latin-script
/// and CJK text.
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_token
    }
}

/// Fraction of the list kept on each shrink pass.
const SHRINK_KEEP: f64 = 0.7;
const MAX_SHRINK_PASSES: usize = 3;
/// Unconditional ceiling when shrinking alone was not enough.
const HARD_CAP: usize = 20;

/// Shrinks an article list until its rendered prompt fits the token budget.
/// Only ever truncates from the tail; never errors.
pub struct BudgetTruncator {
    budget: usize,
    estimator: Box<dyn TokenEstimator>,
}

impl BudgetTruncator {
    pub fn new(budget: usize, estimator: Box<dyn TokenEstimator>) -> Self {
        Self { budget, estimator }
    }

    /// Measures the same serialization the generator will send, shrinking
    /// the tail by 30% per pass, at most three passes, then hard-capping.
    /// Termination and a bounded worst case hold by construction.
    pub fn truncate(&self, mut articles: Vec<Article>, prompt: &PromptBuilder) -> Vec<Article> {
        for pass in 0..MAX_SHRINK_PASSES {
            let estimate = self.estimator.estimate(&prompt.render(&articles));
            if estimate <= self.budget {
                if pass > 0 {
                    info!(
                        "truncated to {} articles (~{} tokens)",
                        articles.len(),
                        estimate
                    );
                } else {
                    debug!("prompt estimate ~{} tokens, within budget", estimate);
                }
                return articles;
            }
            if articles.len() <= 1 {
                break;
            }
            let keep = ((articles.len() as f64) * SHRINK_KEEP).ceil() as usize;
            let keep = keep.clamp(1, articles.len() - 1);
            warn!(
                "prompt estimate ~{} tokens over budget {}, shrinking {} -> {} articles",
                estimate,
                self.budget,
                articles.len(),
                keep
            );
            articles.truncate(keep);
        }

        if self.estimator.estimate(&prompt.render(&articles)) > self.budget
            && articles.len() > HARD_CAP
        {
            warn!(
                "still over budget after {} passes, hard-capping to {} articles",
                MAX_SHRINK_PASSES, HARD_CAP
            );
            articles.truncate(HARD_CAP);
        }
        articles
    }
}
