//! Error types for the sharepoint_link crate.

use thiserror::Error;

/// Longest body excerpt kept in an error message.
const BODY_SNIPPET_LEN: usize = 2048;

/// Errors that can occur while resolving or crawling a share link.
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Invalid share link: {0}")]
    InvalidShareLink(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("HTTP request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request to {url} failed: {source}")]
    HttpError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Unexpected API response ({message}): {body}")]
    ApiShapeError { message: String, body: String },

    #[error("File name cannot be truncated: {0}")]
    TruncationError(String),

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("aria2 RPC error: {0}")]
    RpcError(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

impl ShareError {
    /// Map a reqwest failure for `url`, keeping timeouts distinct.
    pub fn transport(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ShareError::Timeout(url.to_string())
        } else {
            ShareError::HttpError {
                url: url.to_string(),
                source,
            }
        }
    }

    pub fn api_shape(message: impl Into<String>, body: &str) -> Self {
        ShareError::ApiShapeError {
            message: message.into(),
            body: snippet(body),
        }
    }

    pub fn unexpected_status(status: u16, url: &str, body: &str) -> Self {
        ShareError::UnexpectedStatus {
            status,
            url: url.to_string(),
            body: snippet(body),
        }
    }
}

/// Cut a response body down to something printable.
pub(crate) fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Result type alias for ShareError.
pub type Result<T> = std::result::Result<T, ShareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_keeps_short_bodies() {
        assert_eq!(snippet("{\"value\":[]}"), "{\"value\":[]}");
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let body = "é".repeat(BODY_SNIPPET_LEN);
        let cut = snippet(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= BODY_SNIPPET_LEN + 3);
    }
}
