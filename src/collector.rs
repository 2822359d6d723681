use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use tracing::{debug, info, warn};

use crate::config::{CollectionConfig, FeedSource};
use crate::fetcher::FeedFetcher;
use crate::types::{Article, Result};

/// Excerpts longer than this are cut on a char boundary.
const MAX_SUMMARY_CHARS: usize = 300;

type DateExtractor = fn(&Entry) -> Option<DateTime<Utc>>;

/// Candidate timestamp fields, tried in order. Whichever parses first wins;
/// entries where none parse keep an unknown timestamp and survive the age
/// filter.
const DATE_EXTRACTORS: [(&str, DateExtractor); 2] = [
    ("published", |entry| entry.published),
    ("updated", |entry| entry.updated),
];

/// Gathers articles from every enabled source: fetch, parse, time-filter,
/// deduplicate across sources, enforce per-source and global caps.
pub struct FeedCollector {
    fetcher: FeedFetcher,
    config: CollectionConfig,
}

impl FeedCollector {
    pub fn new(config: &CollectionConfig) -> Result<Self> {
        Ok(Self {
            fetcher: FeedFetcher::new(config)?,
            config: config.clone(),
        })
    }

    /// Collects from sources in order. A failing source is logged and
    /// skipped; zero articles overall is a normal empty result. Scanning
    /// stops as soon as the global cap is reached.
    pub async fn collect(&self, sources: &[FeedSource]) -> Vec<Article> {
        let mut articles: Vec<Article> = Vec::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();
        let cutoff = Utc::now() - Duration::hours(self.config.hours_threshold);

        info!("collecting from {} sources", sources.len());

        for source in sources {
            if articles.len() >= self.config.max_total_articles {
                debug!("global article cap reached, skipping remaining sources");
                break;
            }

            let body = match self.fetcher.fetch(&source.url).await {
                Ok(body) => body,
                Err(failure) => {
                    warn!("{}: fetch failed: {}", source.name, failure);
                    continue;
                }
            };

            let feed = match parser::parse(body.as_bytes()) {
                Ok(feed) => feed,
                Err(e) => {
                    warn!("{}: feed parse failed: {}", source.name, e);
                    continue;
                }
            };

            let mut kept = 0usize;
            for entry in feed.entries {
                if kept >= self.config.max_articles_per_source
                    || articles.len() >= self.config.max_total_articles
                {
                    break;
                }
                if let Some(article) =
                    build_article(&source.name, &entry, cutoff, &mut seen_hashes)
                {
                    articles.push(article);
                    kept += 1;
                }
            }
            info!("{}: kept {} articles", source.name, kept);
        }

        info!("collected {} articles total", articles.len());
        articles
    }
}

fn build_article(
    source: &str,
    entry: &Entry,
    cutoff: DateTime<Utc>,
    seen_hashes: &mut HashSet<String>,
) -> Option<Article> {
    let link = entry.links.first()?.href.clone();
    let title = collapse_whitespace(
        entry
            .title
            .as_ref()
            .map(|t| t.content.as_str())
            .unwrap_or("Untitled"),
    );

    let published = extract_published(entry);
    if let Some(timestamp) = published {
        // Entries exactly at the cutoff are already too old.
        if timestamp <= cutoff {
            return None;
        }
    }

    let summary = entry
        .summary
        .as_ref()
        .map(|s| cap_chars(&collapse_whitespace(&s.content), MAX_SUMMARY_CHARS))
        .filter(|s| !s.is_empty());

    let article = Article::new(source.to_string(), title, link, summary, published);
    if !seen_hashes.insert(article.content_hash.clone()) {
        debug!("skipping duplicate entry: {}", article.title);
        return None;
    }
    Some(article)
}

fn extract_published(entry: &Entry) -> Option<DateTime<Utc>> {
    for (field, extract) in DATE_EXTRACTORS {
        if let Some(timestamp) = extract(entry) {
            debug!("timestamp taken from '{}' field", field);
            return Some(timestamp.with_timezone(&Utc));
        }
    }
    None
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
