use std::time::{Duration, Instant};

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::collector::FeedCollector;
use crate::config::FeedSource;
use crate::dispatcher::DeliveryDispatcher;
use crate::generator::{DigestGenerator, TextGenerator};
use crate::telegram::Messenger;
use crate::truncator::BudgetTruncator;
use crate::types::{DigestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No recent articles anywhere; a quiet success, nothing was sent.
    NoArticles,
    Delivered {
        chunks: usize,
    },
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub articles_collected: usize,
    pub articles_summarized: usize,
    pub elapsed: Duration,
}

/// Sequences Collector -> Truncator -> Generator -> Dispatcher. Data flows
/// strictly left to right; the driver alone decides what fails the run.
pub struct Pipeline<G: TextGenerator, M: Messenger> {
    collector: FeedCollector,
    truncator: BudgetTruncator,
    generator: DigestGenerator<G>,
    dispatcher: DeliveryDispatcher<M>,
    sources: Vec<FeedSource>,
}

impl<G: TextGenerator, M: Messenger> Pipeline<G, M> {
    pub fn new(
        collector: FeedCollector,
        truncator: BudgetTruncator,
        generator: DigestGenerator<G>,
        dispatcher: DeliveryDispatcher<M>,
        sources: Vec<FeedSource>,
    ) -> Self {
        Self {
            collector,
            truncator,
            generator,
            dispatcher,
            sources,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("digest_run", run_id = %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunReport> {
        let started = Instant::now();

        let articles = self.collector.collect(&self.sources).await;
        let articles_collected = articles.len();
        if articles.is_empty() {
            info!("no recent articles found, nothing to summarize");
            return Ok(RunReport {
                outcome: RunOutcome::NoArticles,
                articles_collected: 0,
                articles_summarized: 0,
                elapsed: started.elapsed(),
            });
        }

        let articles = self
            .truncator
            .truncate(articles, self.generator.prompt_builder());
        let articles_summarized = articles.len();

        // The generator only returns None for empty input, which cannot
        // happen past the check above.
        let digest = self
            .generator
            .generate(&articles)
            .await
            .ok_or(DigestError::EmptyDigest)?;

        let chunks = self.dispatcher.deliver(&digest).await?;

        let elapsed = started.elapsed();
        info!(
            "run finished: {} articles in, {} summarized, {} message(s), {:.1}s",
            articles_collected,
            articles_summarized,
            chunks,
            elapsed.as_secs_f64()
        );
        Ok(RunReport {
            outcome: RunOutcome::Delivered { chunks },
            articles_collected,
            articles_summarized,
            elapsed,
        })
    }
}
