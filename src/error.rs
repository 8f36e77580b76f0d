// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Errors from talking to the vehicle

use thiserror::Error;

use crate::telemetry::UnknownLiteral;

/// Why a single remote fetch produced no value.
///
/// None of these reach the caller of a refresh: each one is replaced by
/// fallback data and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request timed out")]
    Timeout,
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<UnknownLiteral> for FetchError {
    fn from(e: UnknownLiteral) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_literal_is_malformed() {
        let err: FetchError = UnknownLiteral {
            kind: "motor status",
            value: "cruising".to_string(),
        }
        .into();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(err.to_string().contains("cruising"));
        assert!(!err.is_timeout());
    }
}
