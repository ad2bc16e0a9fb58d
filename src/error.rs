//! # Error Types
//!
//! This module defines the error types for the transcription engine.
//!
//! Nothing in the engine is fatal: every error is local to one call and the
//! caller can drop the offending event or value and carry on.
//!
//! ## Error Types
//! - `InvalidArgument` - A caller passed a value outside the contract (e.g. bpm <= 0)
//! - `MalformedEvent` - An incoming event payload could not be decoded
//! - `ConfigError` - Invalid YAML configuration or out-of-range settings
//! - `SessionError` - A session payload could not be read, written or decoded
//!
//! ## Usage
//! ```rust
//! use scribe::{ScribeError, Transcriber, TranscriberConfig};
//!
//! let mut transcriber = Transcriber::new(TranscriberConfig::default());
//! match transcriber.set_tempo(0.0) {
//!     Ok(()) => println!("tempo changed"),
//!     Err(ScribeError::InvalidArgument(message)) => eprintln!("rejected: {}", message),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    /// A value violated the caller contract.
    ///
    /// # Example
    /// ```
    /// # use scribe::ScribeError;
    /// let err = ScribeError::InvalidArgument("bpm must be positive, got -3".to_string());
    /// assert_eq!(err.to_string(), "Invalid argument: bpm must be positive, got -3");
    /// ```
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An incoming event payload was not valid JSON or had an unknown shape.
    ///
    /// # Example
    /// ```
    /// # use scribe::ScribeError;
    /// let err = ScribeError::MalformedEvent("expected value at line 1 column 1".to_string());
    /// assert_eq!(err.to_string(), "Malformed event: expected value at line 1 column 1");
    /// ```
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Invalid configuration.
    ///
    /// # Example
    /// ```
    /// # use scribe::ScribeError;
    /// let err = ScribeError::ConfigError("batch-size must be at least 1".to_string());
    /// assert_eq!(err.to_string(), "Invalid configuration: batch-size must be at least 1");
    /// ```
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A session payload could not be persisted or restored.
    #[error("Session error: {0}")]
    SessionError(String),
}

/// Failure reported by a notation renderer when measuring a measure.
///
/// Layout never surfaces this: a failed query falls back to the minimum
/// stave width.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Measure has no notation content")]
    EmptyMeasure,

    #[error("Renderer failed: {0}")]
    Backend(String),
}
