use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One syndication entry that survived filtering.
///
/// Immutable once built; `published` is always UTC, `None` standing in for
/// an entry whose timestamp could not be parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub source: String,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub content_hash: String,
}

impl Article {
    pub fn new(
        source: String,
        title: String,
        link: String,
        summary: Option<String>,
        published: Option<DateTime<Utc>>,
    ) -> Self {
        let content_hash = content_hash(&title, &link);
        Self {
            source,
            title,
            link,
            summary,
            published,
            content_hash,
        }
    }
}

/// Dedup key over title + link. Two entries carrying the same headline and
/// URL are the same story no matter which feed they came from.
pub fn content_hash(title: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(link.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing environment variables: {0}")]
    MissingEnv(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("digest generation produced no text for a non-empty article set")]
    EmptyDigest,

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
