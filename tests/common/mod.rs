#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use news_digest::generator::{GenerationFailure, TextGenerator};
use news_digest::telegram::{Messenger, SendFailure};
use news_digest::types::Article;

/// Builds a minimal RSS 2.0 body from (title, link, pub date) triples.
pub fn rss_body(feed_title: &str, items: &[(String, String, Option<DateTime<Utc>>)]) -> String {
    let mut body = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    body.push_str("<rss version=\"2.0\"><channel>");
    body.push_str(&format!("<title>{}</title>", feed_title));
    body.push_str("<link>https://example.com</link>");
    body.push_str("<description>test feed</description>");
    for (title, link, published) in items {
        body.push_str("<item>");
        body.push_str(&format!("<title>{}</title>", title));
        body.push_str(&format!("<link>{}</link>", link));
        if let Some(published) = published {
            body.push_str(&format!("<pubDate>{}</pubDate>", published.to_rfc2822()));
        }
        body.push_str(&format!("<description>Summary of {}</description>", title));
        body.push_str("</item>");
    }
    body.push_str("</channel></rss>");
    body
}

/// N fresh items with distinct titles and links.
pub fn fresh_items(prefix: &str, count: usize) -> Vec<(String, String, Option<DateTime<Utc>>)> {
    let published = Utc::now() - chrono::Duration::hours(1);
    (0..count)
        .map(|i| {
            (
                format!("{} story {}", prefix, i),
                format!("https://example.com/{}/{}", prefix, i),
                Some(published),
            )
        })
        .collect()
}

pub fn article(source: &str, title: &str, link: &str) -> Article {
    Article::new(
        source.to_string(),
        title.to_string(),
        link.to_string(),
        None,
        Some(Utc::now()),
    )
}

pub fn long_text(chars: usize) -> String {
    "x".repeat(chars)
}

/// Text generator that replays a scripted list of responses and counts calls.
pub struct ScriptedGenerator {
    responses: Mutex<Vec<Result<String, GenerationFailure>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, GenerationFailure>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(GenerationFailure::retryable("script exhausted"))
        } else {
            responses.remove(0)
        }
    }
}

/// Messenger that records every send and replays scripted outcomes
/// (defaulting to success once the script runs out).
pub struct ScriptedMessenger {
    calls: Mutex<Vec<(String, Option<String>)>>,
    responses: Mutex<Vec<Result<(), SendFailure>>>,
}

impl ScriptedMessenger {
    pub fn new(responses: Vec<Result<(), SendFailure>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    pub fn sent(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Messenger for ScriptedMessenger {
    async fn send(&self, text: &str, parse_mode: Option<&str>) -> Result<(), SendFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), parse_mode.map(str::to_string)));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(())
        } else {
            responses.remove(0)
        }
    }
}

// The dispatcher and generator take their client by value; tests hand them an
// Arc so the recorded calls stay inspectable afterwards. The blanket
// `Messenger`/`TextGenerator` impls for `Arc<T>` live in the crate itself.
