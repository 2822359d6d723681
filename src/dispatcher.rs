use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::telegram::{Messenger, SendFailure};
use crate::types::{DigestError, Result};

/// Characters Telegram's MarkdownV2 mode treats as markup.
const MARKDOWN_SPECIAL: [char; 18] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Splits `text` into ordered chunks of at most `max_len` chars. Splits
/// prefer paragraph boundaries, fall back to line boundaries, and hard-cut
/// only when a single line alone exceeds the limit. Joining the chunks with
/// the separators restored reproduces the input, modulo whitespace at split
/// points. Requires `max_len >= 1`.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    debug_assert!(max_len >= 1);
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for paragraph in text.split("\n\n") {
        let paragraph_chars = paragraph.chars().count();
        if paragraph_chars > max_len {
            flush(&mut chunks, &mut current, &mut current_chars);
            split_paragraph(paragraph, max_len, &mut chunks);
            continue;
        }
        let separator = if current.is_empty() { 0 } else { 2 };
        if current_chars + separator + paragraph_chars > max_len {
            flush(&mut chunks, &mut current, &mut current_chars);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
            current_chars += 2;
        }
        current.push_str(paragraph);
        current_chars += paragraph_chars;
    }
    flush(&mut chunks, &mut current, &mut current_chars);
    chunks
}

fn split_paragraph(paragraph: &str, max_len: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in paragraph.split('\n') {
        let line_chars = line.chars().count();
        if line_chars > max_len {
            flush(chunks, &mut current, &mut current_chars);
            hard_cut(line, max_len, chunks);
            continue;
        }
        let separator = if current.is_empty() { 0 } else { 1 };
        if current_chars + separator + line_chars > max_len {
            flush(chunks, &mut current, &mut current_chars);
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
    }
    flush(chunks, &mut current, &mut current_chars);
}

fn hard_cut(line: &str, max_len: usize, chunks: &mut Vec<String>) {
    let mut piece = String::new();
    let mut count = 0usize;
    for c in line.chars() {
        piece.push(c);
        count += 1;
        if count == max_len {
            chunks.push(std::mem::take(&mut piece));
            count = 0;
        }
    }
    if !piece.is_empty() {
        chunks.push(piece);
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_chars: &mut usize) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
    *current_chars = 0;
}

/// Sends the digest to the messaging endpoint, chunked to its size limit,
/// pacing consecutive sends and falling back to plain text when the endpoint
/// rejects the markup.
pub struct DeliveryDispatcher<M: Messenger> {
    messenger: M,
    max_message_length: usize,
    parse_mode: Option<String>,
    escape_markdown: bool,
    send_interval: Duration,
}

impl<M: Messenger> DeliveryDispatcher<M> {
    pub fn new(messenger: M, config: &TelegramConfig) -> Result<Self> {
        if config.max_message_length == 0 {
            return Err(DigestError::Config(
                "max_message_length must be at least 1".to_string(),
            ));
        }
        if !config.send_interval.is_finite() || config.send_interval < 0.0 {
            return Err(DigestError::Config(
                "send_interval must be a non-negative number".to_string(),
            ));
        }
        Ok(Self {
            messenger,
            max_message_length: config.max_message_length,
            parse_mode: config.parse_mode.clone(),
            escape_markdown: config.escape_markdown,
            send_interval: Duration::from_secs_f64(config.send_interval),
        })
    }

    /// Sends every chunk in order. Returns the number of chunks sent; any
    /// failure other than a recovered markup rejection aborts the rest.
    pub async fn deliver(&self, digest: &str) -> Result<usize> {
        let chunks = split_message(digest, self.max_message_length);
        info!("sending digest as {} message(s)", chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.send_interval).await;
            }
            self.send_chunk(chunk).await.map_err(|e| {
                DigestError::Delivery(format!("message {}/{}: {}", i + 1, chunks.len(), e))
            })?;
            debug!("message {}/{} sent", i + 1, chunks.len());
        }
        Ok(chunks.len())
    }

    async fn send_chunk(&self, chunk: &str) -> std::result::Result<(), SendFailure> {
        let parse_mode = self.parse_mode.as_deref();
        let outgoing = if self.escape_markdown && parse_mode.is_some() {
            escape_markdown(chunk)
        } else {
            chunk.to_string()
        };

        match self.messenger.send(&outgoing, parse_mode).await {
            Ok(()) => Ok(()),
            Err(SendFailure::MarkupRejected(reason)) => {
                warn!("markup rejected ({}), retrying as plain text", reason);
                self.messenger.send(chunk, None).await
            }
            Err(failure) => Err(failure),
        }
    }
}
