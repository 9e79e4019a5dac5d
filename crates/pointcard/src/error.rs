//! Error types for pointcard.
//!
//! This module defines the [`enum@Error`] enum and [`Result`] type alias used
//! throughout the library.
//!
//! # Error Categories
//!
//! - [`Error::InvalidFormat`] - Malformed scan or manual input; nothing queued
//! - [`Error::Storage`] - The local queue or settings file could not be written/read
//! - [`Error::ConfigIncomplete`] - Scanning and sync are blocked until settings are saved
//! - [`Error::Config`] - Settings rejected on save
//! - [`Error::Identity`] - Device identity could not be loaded or created
//! - [`Error::Transport`] - The sync request never got a usable answer
//! - [`Error::RemoteRejection`] - The endpoint answered but did not accept the batch
//! - [`Error::CaptureUnavailable`] - The capture source could not be opened
//! - [`Error::Init`] - Terminal initialization failures
//!
//! None of these are fatal: every failure leaves the terminal in a state from
//! which the operator can simply retry.

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for pointcard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pointcard operations
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Scanned or typed text is not a 14-digit member ID
    #[error("invalid member ID: {0}")]
    InvalidFormat(Arc<str>),

    /// Local durable storage failed
    #[error("storage error: {0}")]
    Storage(Arc<str>),

    /// Settings have not been saved yet
    #[error("settings are incomplete: endpoint URL, store ID and point value are required")]
    ConfigIncomplete,

    /// Settings were rejected
    #[error("configuration error: {0}")]
    Config(Arc<str>),

    /// Failed to load or save the device identity
    #[error("identity error: {0}")]
    Identity(Arc<str>),

    /// The sync request failed before a response was received
    #[error("transport failure: {0}")]
    Transport(Arc<str>),

    /// The endpoint rejected the batch
    #[error("rejected by endpoint: {0}")]
    RemoteRejection(Arc<str>),

    /// The capture source could not be opened
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(Arc<str>),

    /// Failed to initialize the terminal
    #[error("initialization failed: {0}")]
    Init(Arc<str>),
}

impl Error {
    /// Create an invalid format error
    #[inline]
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(Arc::from(msg.into()))
    }

    /// Create a storage error
    #[inline]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(Arc::from(msg.into()))
    }

    /// Create a configuration error
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(Arc::from(msg.into()))
    }

    /// Create an identity error
    #[inline]
    pub fn identity(msg: impl Into<String>) -> Self {
        Self::Identity(Arc::from(msg.into()))
    }

    /// Create a transport error
    #[inline]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(Arc::from(msg.into()))
    }

    /// Create a remote rejection error
    #[inline]
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::RemoteRejection(Arc::from(msg.into()))
    }

    /// Create a capture unavailable error
    #[inline]
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::CaptureUnavailable(Arc::from(msg.into()))
    }

    /// Create an initialization error
    #[inline]
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(Arc::from(msg.into()))
    }

    /// Whether a failed sync with this error can be retried as-is.
    ///
    /// Transport failures, remote rejections and local storage failures all
    /// leave the queue intact; the next manual or scheduled sync retries the
    /// same batch. Input, settings, identity and capture errors need the
    /// operator to act first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RemoteRejection(_) | Self::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::invalid_format("abc").to_string(),
            "invalid member ID: abc"
        );
        assert!(Error::ConfigIncomplete.to_string().contains("incomplete"));
        assert_eq!(
            Error::rejected("quota exceeded").to_string(),
            "rejected by endpoint: quota exceeded"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::transport("timeout").is_retryable());
        assert!(Error::rejected("HTTP 500").is_retryable());
        assert!(!Error::ConfigIncomplete.is_retryable());
        assert!(Error::storage("disk full").is_retryable());
        assert!(!Error::invalid_format("x").is_retryable());
        assert!(!Error::config("bad URL").is_retryable());
        assert!(!Error::identity("unreadable").is_retryable());
        assert!(!Error::capture("busy").is_retryable());
    }
}
