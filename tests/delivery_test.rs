mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedMessenger;
use news_digest::config::TelegramConfig;
use news_digest::telegram::{Messenger, SendFailure, TelegramBot};
use news_digest::types::DigestError;
use news_digest::{escape_markdown, split_message, DeliveryDispatcher};

fn telegram_config() -> TelegramConfig {
    TelegramConfig {
        send_interval: 0.0,
        escape_markdown: false,
        ..TelegramConfig::default()
    }
}

// --- split_message ---

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = split_message("hello world", 4000);
    assert_eq!(chunks, vec!["hello world".to_string()]);
}

#[test]
fn paragraph_splits_reassemble_losslessly() {
    let paragraphs: Vec<String> = (0..9)
        .map(|i| format!("paragraph {} {}", i, "x".repeat(990)))
        .collect();
    let text = paragraphs.join("\n\n");
    // "paragraph N " is 12 chars, plus 990 filler: 1002 per paragraph.
    assert_eq!(text.chars().count(), 9 * 1002 + 8 * 2);

    let chunks = split_message(&text, 4000);
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 4000);
    }
    // All boundaries fall on paragraph breaks, so restoring the blank-line
    // separators reproduces the digest exactly.
    assert_eq!(chunks.join("\n\n"), text);
    assert!(chunks[0].starts_with("paragraph 0"));
    assert!(chunks[2].ends_with(&"x".repeat(10)));
}

#[test]
fn oversized_paragraph_falls_back_to_line_breaks() {
    let lines: Vec<String> = (0..10).map(|i| format!("line {} {}", i, "y".repeat(40))).collect();
    let paragraph = lines.join("\n");
    let chunks = split_message(&paragraph, 100);

    for chunk in &chunks {
        assert!(chunk.chars().count() <= 100);
        // Line-preferring splits never cut inside a line here.
        for line in chunk.split('\n') {
            assert!(line.starts_with("line "));
        }
    }
    assert_eq!(chunks.join("\n"), paragraph);
}

#[test]
fn single_oversized_line_is_hard_cut() {
    let line = "z".repeat(9000);
    let chunks = split_message(&line, 4000);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].chars().count(), 4000);
    assert_eq!(chunks[1].chars().count(), 4000);
    assert_eq!(chunks[2].chars().count(), 1000);
    assert_eq!(chunks.concat(), line);
}

#[test]
fn hard_cut_respects_char_boundaries() {
    let line = "한국어".repeat(100);
    let chunks = split_message(&line, 7);
    assert!(chunks.iter().all(|c| c.chars().count() <= 7));
    assert_eq!(chunks.concat(), line);
}

// --- markdown escaping ---

#[test]
fn markdown_special_characters_are_escaped() {
    assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
    assert_eq!(escape_markdown("1. done!"), "1\\. done\\!");
    assert_eq!(escape_markdown("plain text"), "plain text");
}

// --- dispatcher ---

#[tokio::test]
async fn chunks_are_sent_in_order() {
    let messenger = Arc::new(ScriptedMessenger::always_ok());
    let dispatcher = DeliveryDispatcher::new(messenger.clone(), &telegram_config()).unwrap();

    let digest = format!("{}\n\n{}", "a".repeat(3000), "b".repeat(3000));
    let sent_count = dispatcher.deliver(&digest).await.unwrap();

    assert_eq!(sent_count, 2);
    let sent = messenger.sent();
    assert!(sent[0].0.starts_with('a'));
    assert!(sent[1].0.starts_with('b'));
    assert_eq!(sent[0].1.as_deref(), Some("Markdown"));
}

#[tokio::test(start_paused = true)]
async fn sends_are_paced_between_chunks_only() {
    let messenger = Arc::new(ScriptedMessenger::always_ok());
    let config = TelegramConfig {
        send_interval: 5.0,
        escape_markdown: false,
        ..TelegramConfig::default()
    };
    let dispatcher = DeliveryDispatcher::new(messenger.clone(), &config).unwrap();

    let digest = format!(
        "{}\n\n{}\n\n{}",
        "a".repeat(3000),
        "b".repeat(3000),
        "c".repeat(3000)
    );
    let started = tokio::time::Instant::now();
    let sent_count = dispatcher.deliver(&digest).await.unwrap();

    assert_eq!(sent_count, 3);
    // Two gaps between three chunks; none before the first or after the last.
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test]
async fn markup_rejection_retries_that_chunk_as_plain_text() {
    let messenger = Arc::new(ScriptedMessenger::new(vec![
        Err(SendFailure::MarkupRejected("can't parse entities".to_string())),
        Ok(()),
    ]));
    let config = TelegramConfig {
        send_interval: 0.0,
        escape_markdown: true,
        ..TelegramConfig::default()
    };
    let dispatcher = DeliveryDispatcher::new(messenger.clone(), &config).unwrap();

    let sent_count = dispatcher.deliver("1. done!").await.unwrap();
    assert_eq!(sent_count, 1);

    let sent = messenger.sent();
    assert_eq!(sent.len(), 2);
    // First try goes out escaped with markup, the retry plain and untouched.
    assert_eq!(sent[0].0, "1\\. done\\!");
    assert_eq!(sent[0].1.as_deref(), Some("Markdown"));
    assert_eq!(sent[1].0, "1. done!");
    assert_eq!(sent[1].1, None);
}

#[tokio::test]
async fn other_send_failures_abort_remaining_chunks() {
    let messenger = Arc::new(ScriptedMessenger::new(vec![
        Ok(()),
        Err(SendFailure::Failed("chat not found".to_string())),
    ]));
    let dispatcher = DeliveryDispatcher::new(messenger.clone(), &telegram_config()).unwrap();

    let digest = format!(
        "{}\n\n{}\n\n{}",
        "a".repeat(3000),
        "b".repeat(3000),
        "c".repeat(3000)
    );
    let result = dispatcher.deliver(&digest).await;

    assert!(matches!(result, Err(DigestError::Delivery(_))));
    // The third chunk was never attempted.
    assert_eq!(messenger.call_count(), 2);
}

#[tokio::test]
async fn zero_chunk_limit_is_rejected() {
    let messenger = Arc::new(ScriptedMessenger::always_ok());
    let config = TelegramConfig {
        max_message_length: 0,
        ..telegram_config()
    };
    assert!(matches!(
        DeliveryDispatcher::new(messenger, &config),
        Err(DigestError::Config(_))
    ));
}

// --- telegram client ---

#[tokio::test]
async fn send_maps_markup_rejections_distinctly() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/bottoken/sendMessage")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#)
        .create_async()
        .await;

    let bot = TelegramBot::new("token".to_string(), "42".to_string(), &telegram_config())
        .unwrap()
        .with_base_url(server.url());

    let result = bot.send("*broken", Some("Markdown")).await;
    assert!(matches!(result, Err(SendFailure::MarkupRejected(_))));
}

#[tokio::test]
async fn send_maps_other_errors_as_plain_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/bottoken/sendMessage")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
        .create_async()
        .await;

    let bot = TelegramBot::new("token".to_string(), "42".to_string(), &telegram_config())
        .unwrap()
        .with_base_url(server.url());

    let result = bot.send("hello", None).await;
    assert!(matches!(result, Err(SendFailure::Failed(_))));
}

#[tokio::test]
async fn successful_send_and_bot_bootstrap() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/bottoken/sendMessage")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true,"result":{"message_id":1}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/bottoken/getMe")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true,"result":{"id":7,"is_bot":true,"first_name":"digest","username":"digest_bot"}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/bottoken/getChat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true,"result":{"id":42,"type":"private"}}"#)
        .create_async()
        .await;

    let bot = TelegramBot::new("token".to_string(), "42".to_string(), &telegram_config())
        .unwrap()
        .with_base_url(server.url());

    bot.send("hello", None).await.unwrap();
    let profile = bot.get_me().await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("digest_bot"));
    let chat = bot.get_chat().await.unwrap();
    assert_eq!(chat.kind, "private");
}
