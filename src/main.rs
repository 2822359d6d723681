use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use news_digest::config::LoggingConfig;
use news_digest::{
    AppConfig, BudgetTruncator, CharRatioEstimator, Credentials, DeliveryDispatcher,
    DigestGenerator, FeedCollector, GeminiClient, Pipeline, PromptBuilder, RunOutcome, TelegramBot,
};

#[derive(Parser, Debug)]
#[command(
    name = "news-digest",
    about = "Collects recent RSS articles, summarizes them with Gemini and posts the digest to Telegram"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The subscriber may not be up yet when configuration loading
            // fails, so report straight to stderr.
            eprintln!("news-digest: fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &LoggingConfig) {
    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_exists = cli.config.exists();
    let config = AppConfig::load(&cli.config).context("failed to load configuration")?;
    init_logging(&config.logging);
    if config_exists {
        info!("configuration loaded from {}", cli.config.display());
    } else {
        warn!(
            "config file {} not found, using built-in defaults",
            cli.config.display()
        );
    }

    // Precondition checks before any network activity.
    let credentials = Credentials::from_env().context("environment validation failed")?;

    // Bot-handle bootstrap: fail fast on a bad token or chat id.
    let bot = TelegramBot::new(
        credentials.telegram_bot_token.clone(),
        credentials.telegram_chat_id.clone(),
        &config.telegram,
    )?;
    let profile = bot
        .get_me()
        .await
        .context("telegram bot validation failed")?;
    info!(
        "bot connected: @{}",
        profile.username.as_deref().unwrap_or(&profile.first_name)
    );
    let chat = bot
        .get_chat()
        .await
        .context("telegram chat validation failed")?;
    info!("chat confirmed ({})", chat.kind);

    let collector = FeedCollector::new(&config.collection)?;
    let prompt = PromptBuilder::new(&config.prompts, &config.ai, config.collection.hours_threshold);
    let truncator = BudgetTruncator::new(
        config.ai.token_budget,
        Box::new(CharRatioEstimator::new(config.ai.chars_per_token)),
    );
    let gemini = GeminiClient::new(credentials.gemini_api_key.clone(), &config.ai)?;
    let generator = DigestGenerator::new(gemini, prompt, &config.ai);
    let dispatcher = DeliveryDispatcher::new(bot, &config.telegram)?;

    let pipeline = Pipeline::new(
        collector,
        truncator,
        generator,
        dispatcher,
        config.enabled_feeds(),
    );
    let report = pipeline.run().await?;

    match report.outcome {
        RunOutcome::NoArticles => info!(
            "nothing to do: no articles in the last {}h",
            config.collection.hours_threshold
        ),
        RunOutcome::Delivered { chunks } => info!(
            "digest delivered in {} message(s) ({} articles, {:.1}s)",
            chunks,
            report.articles_summarized,
            report.elapsed.as_secs_f64()
        ),
    }
    Ok(())
}
