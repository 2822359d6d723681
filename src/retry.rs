use std::time::Duration;

use crate::fetcher::FetchFailure;

/// Tag distinguishing transient AI-service failures worth retrying from
/// permanent ones (bad argument, auth, permission) that abort immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable,
    NonRetryable,
}

/// What a call site should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Abort,
}

/// Cooldown applied when a feed host answers 429.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Cap on the exponential backoff between AI-call attempts.
pub const MAX_GENERATION_BACKOFF: Duration = Duration::from_secs(60);

fn exponential(attempt: u32) -> Duration {
    // 2^attempt seconds; the shift is clamped so a runaway attempt counter
    // cannot overflow u64.
    Duration::from_secs(1u64 << attempt.min(32))
}

/// Retry decision for one failed feed fetch. `attempt` is the zero-based
/// index of the attempt that just failed; `max_retries` is the total number
/// of attempts allowed for the source.
pub fn fetch_retry(failure: &FetchFailure, attempt: u32, max_retries: u32) -> RetryDecision {
    if matches!(failure, FetchFailure::Blocked) {
        // 403 is a hard block; retrying only digs the hole deeper.
        return RetryDecision::Abort;
    }
    if attempt + 1 >= max_retries {
        return RetryDecision::Abort;
    }
    match failure {
        FetchFailure::RateLimited => RetryDecision::RetryAfter(RATE_LIMIT_COOLDOWN),
        _ => RetryDecision::RetryAfter(exponential(attempt)),
    }
}

/// Retry decision for one failed AI-generation attempt. Delays follow
/// `min(2^attempt, 60)` seconds.
pub fn generation_retry(class: FailureClass, attempt: u32, max_attempts: u32) -> RetryDecision {
    if class == FailureClass::NonRetryable {
        return RetryDecision::Abort;
    }
    if attempt + 1 >= max_attempts {
        return RetryDecision::Abort;
    }
    RetryDecision::RetryAfter(exponential(attempt).min(MAX_GENERATION_BACKOFF))
}

/// Maps an AI-service HTTP status to a failure class. 400 (invalid
/// argument), 401 and 403 (auth/permission) are permanent; everything else,
/// including 429 (resource exhausted) and 5xx, is transient.
pub fn classify_http_status(status: u16) -> FailureClass {
    match status {
        400 | 401 | 403 => FailureClass::NonRetryable,
        _ => FailureClass::Retryable,
    }
}
