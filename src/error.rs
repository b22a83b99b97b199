//! Errors raised while checking a single image.
//!
//! None of these abort the run: the pipeline logs them against the image's
//! raw name and moves on to the next image.

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CheckError>;

/// Why a tag cannot be compared against the registry's tag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRejection {
    Missing,
    Latest,
}

impl fmt::Display for TagRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagRejection::Missing => write!(f, "not specified tag"),
            TagRejection::Latest => write!(f, "'latest' tag"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{0}")]
    InvalidReference(String),

    #[error("{0}")]
    InvalidTag(TagRejection),

    #[error("{0}")]
    UnsupportedRegistry(String),

    #[error("certificate of {registry} is invalid (consider running with --insecure), {reason}")]
    TlsValidation { registry: String, reason: String },

    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code {0}")]
    UnexpectedStatusCode(StatusCode),

    #[error("malformed authentication challenge: {0}")]
    MalformedChallenge(String),

    #[error("failed to decode token: {0}")]
    TokenDecode(String),

    #[error("failed to decode tags: {0}")]
    TagDecode(String),

    #[error("authentication failed with status {0}")]
    AuthenticationFailed(StatusCode),

    #[error("invalid version constraint '>{tag}': {reason}")]
    InvalidConstraint { tag: String, reason: String },
}

impl CheckError {
    pub fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        CheckError::Network {
            context: context.into(),
            source,
        }
    }
}
