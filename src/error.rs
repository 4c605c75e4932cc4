//! Error types for the volume control engine.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tab_volume::{Result, Orchestrator};
//!
//! async fn example(engine: &Orchestrator) -> Result<()> {
//!     let state = engine.get_state(window_id).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | Resolution | [`Error::WindowResolution`] | surfaced to caller |
//! | Injection | [`Error::Injection`] | capture-path fallback, never surfaced |
//! | Capture | [`Error::Capture`], [`Error::SurfaceClosed`] | tab counted as skipped |
//! | Persistence | [`Error::Persistence`] | surfaced; in-memory change kept |
//! | Protocol | [`Error::Protocol`] | rejected response envelope |
//!
//! No error is fatal to the engine; the command dispatcher converts every
//! failure into a structured `{ok: false, error}` response.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::TabId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Engine construction error.
    ///
    /// Returned when the orchestrator builder is missing a capability.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// Target window could not be determined.
    ///
    /// Returned when a request carries no window ID, the sender has no
    /// originating tab, and no focused window exists.
    #[error("Window resolution failed: {message}")]
    WindowResolution {
        /// Description of the resolution failure.
        message: String,
    },

    // ========================================================================
    // Injection Errors
    // ========================================================================
    /// Page script application failed or is unavailable for this tab.
    ///
    /// Restricted origins and unsupported pages reject script execution.
    /// The orchestrator recovers locally by falling back to the capture
    /// path; this variant never crosses the messaging boundary.
    #[error("Page injection unavailable for tab {tab_id}")]
    Injection {
        /// The tab that rejected injection.
        tab_id: TabId,
    },

    // ========================================================================
    // Capture Errors
    // ========================================================================
    /// Stream acquisition or pipeline construction failed.
    ///
    /// The affected tab is counted as skipped; the batch continues.
    #[error("Capture failed for tab {tab_id}: {message}")]
    Capture {
        /// The tab whose capture attempt failed.
        tab_id: TabId,
        /// Description of the capture failure.
        message: String,
    },

    /// The pipeline surface task is no longer running.
    ///
    /// Returned when a surface request cannot be delivered or acked.
    #[error("Pipeline surface closed")]
    SurfaceClosed,

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// Settings write or read failed.
    ///
    /// Surfaced to the caller; the in-memory state change has already
    /// taken effect when a write fails.
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the storage failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Unknown or malformed request.
    ///
    /// Surfaced as a rejected response envelope.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a window resolution error.
    #[inline]
    pub fn window_resolution(message: impl Into<String>) -> Self {
        Self::WindowResolution {
            message: message.into(),
        }
    }

    /// Creates an injection error.
    #[inline]
    pub fn injection(tab_id: TabId) -> Self {
        Self::Injection { tab_id }
    }

    /// Creates a capture error.
    #[inline]
    pub fn capture(tab_id: TabId, message: impl Into<String>) -> Self {
        Self::Capture {
            tab_id,
            message: message.into(),
        }
    }

    /// Creates a persistence error.
    #[inline]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is an injection error.
    ///
    /// Injection errors trigger the capture-path fallback.
    #[inline]
    #[must_use]
    pub fn is_injection(&self) -> bool {
        matches!(self, Self::Injection { .. })
    }

    /// Returns `true` if this is a capture error.
    #[inline]
    #[must_use]
    pub fn is_capture(&self) -> bool {
        matches!(self, Self::Capture { .. } | Self::SurfaceClosed)
    }

    /// Returns `true` if this error is recovered inside a batch apply.
    ///
    /// Recovered errors demote a tab to skipped instead of failing the
    /// whole operation.
    #[inline]
    #[must_use]
    pub fn is_recovered_locally(&self) -> bool {
        matches!(
            self,
            Self::Injection { .. } | Self::Capture { .. } | Self::SurfaceClosed
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
