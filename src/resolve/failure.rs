use crate::http::client::RequestError;

/// How a failed lookup should steer resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Symbol unknown to the provider; try the next candidate.
    NotFound,
    /// Upstream throttling; back off and retry the same candidate.
    RateLimited,
    /// Network-level failure.
    Transport,
    Unknown,
}

const RATE_LIMIT_PATTERNS: [&str; 3] = ["too many requests", "rate limit", "throttl"];
const NOT_FOUND_PATTERNS: [&str; 4] = ["not found", "no data", "404", "delisted"];

/// Maps a request error to a [`FailureKind`].
///
/// Structured signals (status code, provider code, missing data, transport)
/// are checked first; message text is only consulted for errors that carry
/// nothing else.
pub fn classify(err: &RequestError) -> FailureKind {
    match err {
        RequestError::Http { status: 429, .. } => FailureKind::RateLimited,
        RequestError::Http { status: 404, .. } => FailureKind::NotFound,
        RequestError::NoData(_) => FailureKind::NotFound,
        RequestError::Provider { code, .. } if code.eq_ignore_ascii_case("Not Found") => {
            FailureKind::NotFound
        }
        RequestError::Transport(_) => FailureKind::Transport,
        other => classify_text(&other.to_string()),
    }
}

fn classify_text(message: &str) -> FailureKind {
    let message = message.to_lowercase();
    if RATE_LIMIT_PATTERNS.iter().any(|p| message.contains(p)) {
        FailureKind::RateLimited
    } else if NOT_FOUND_PATTERNS.iter().any(|p| message.contains(p)) {
        FailureKind::NotFound
    } else {
        FailureKind::Unknown
    }
}
