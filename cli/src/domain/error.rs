//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application` or `tokio`. All error types implement
//! `thiserror::Error` and convert to `anyhow::Error` via the `?` operator.

use thiserror::Error;

// ── Store errors ──────────────────────────────────────────────────────────────

/// Errors raised by an entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction on {kind} '{id}' gave up after {attempts} conflicting attempts")]
    Contention {
        kind: &'static str,
        id: String,
        attempts: usize,
    },

    #[error("transaction on {kind} '{id}' produced a record keyed '{found}'")]
    KeyMismatch {
        kind: &'static str,
        id: String,
        found: String,
    },

    #[error("stored {kind} '{id}' is corrupt: {reason}")]
    Corrupt {
        kind: &'static str,
        id: String,
        reason: String,
    },
}

// ── Compute API errors ────────────────────────────────────────────────────────

/// Errors raised by the compute control API.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("compute API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("compute API request failed: {0}")]
    Transport(String),

    #[error("compute API response could not be decoded: {0}")]
    Decode(String),
}

impl ComputeError {
    /// HTTP status carried by the error, when the API answered at all.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
