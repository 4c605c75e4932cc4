//! Orchestrator command types.
//!
//! Defines the request/response message format between a control surface
//! (popup widget, settings page, embedder UI) and the orchestrator.
//!
//! # Format
//!
//! Requests are tagged on `type`:
//!
//! ```json
//! { "type": "SET_VOLUME", "windowId": 3, "volume": 80 }
//! ```
//!
//! Responses use a uniform envelope:
//!
//! ```json
//! { "ok": true, "windowId": 3, "volume": 80, "muted": false,
//!   "attachedCount": 2, "skippedCount": 1 }
//! ```
//!
//! ```json
//! { "ok": false, "error": "Window resolution failed: no focused window" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::identifiers::WindowId;
use crate::settings::AudioSettings;

// ============================================================================
// Request
// ============================================================================

/// A command accepted by the orchestrator.
///
/// `windowId` is optional everywhere: when omitted, the orchestrator
/// resolves the target from the sender's originating tab, falling back to
/// the focused window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Reads a window's current volume/mute state.
    #[serde(rename = "GET_STATE")]
    GetState {
        /// Target window, if the sender knows it.
        #[serde(rename = "windowId", default, skip_serializing_if = "Option::is_none")]
        window_id: Option<WindowId>,
    },

    /// Re-applies the window's current state to all of its tabs.
    #[serde(rename = "APPLY_TO_WINDOW")]
    ApplyToWindow {
        /// Target window, if the sender knows it.
        #[serde(rename = "windowId", default, skip_serializing_if = "Option::is_none")]
        window_id: Option<WindowId>,
    },

    /// Sets a window's volume and re-applies.
    ///
    /// Volume 0 also sets muted; the raw value is sanitized before use.
    #[serde(rename = "SET_VOLUME")]
    SetVolume {
        /// Target window, if the sender knows it.
        #[serde(rename = "windowId", default, skip_serializing_if = "Option::is_none")]
        window_id: Option<WindowId>,
        /// Requested volume percentage (raw, may be dirty).
        volume: f64,
    },

    /// Sets a window's mute flag and re-applies.
    ///
    /// Muting forces the window and global volume to 0.
    #[serde(rename = "SET_MUTED")]
    SetMuted {
        /// Target window, if the sender knows it.
        #[serde(rename = "windowId", default, skip_serializing_if = "Option::is_none")]
        window_id: Option<WindowId>,
        /// Requested mute flag.
        muted: bool,
    },
}

// ============================================================================
// ApplySummary
// ============================================================================

/// Outcome counts of a window-wide application pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    /// Tabs now under control (either path).
    #[serde(rename = "attachedCount")]
    pub attached_count: u32,

    /// Tabs skipped (restricted URL or both paths failed).
    #[serde(rename = "skippedCount")]
    pub skipped_count: u32,
}

// ============================================================================
// Response
// ============================================================================

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// `true` on success.
    pub ok: bool,

    /// Success payload, flattened into the envelope.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,

    /// Error description when `ok` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Success payload variants.
///
/// Untagged: the field set identifies the variant, widest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// SET_VOLUME / SET_MUTED result.
    Settings {
        /// Resolved target window.
        #[serde(rename = "windowId")]
        window_id: WindowId,
        /// Window volume after the change.
        volume: u16,
        /// Window mute flag after the change.
        muted: bool,
        /// Application outcome counts.
        #[serde(flatten)]
        summary: ApplySummary,
    },

    /// APPLY_TO_WINDOW result.
    Apply {
        /// Resolved target window.
        #[serde(rename = "windowId")]
        window_id: WindowId,
        /// Application outcome counts.
        #[serde(flatten)]
        summary: ApplySummary,
    },

    /// GET_STATE result.
    State {
        /// Resolved target window.
        #[serde(rename = "windowId")]
        window_id: WindowId,
        /// Window volume.
        volume: u16,
        /// Window mute flag.
        muted: bool,
    },
}

impl Response {
    /// Builds a GET_STATE success response.
    #[inline]
    #[must_use]
    pub fn state(window_id: WindowId, settings: AudioSettings) -> Self {
        Self {
            ok: true,
            payload: Some(Payload::State {
                window_id,
                volume: settings.volume,
                muted: settings.muted,
            }),
            error: None,
        }
    }

    /// Builds an APPLY_TO_WINDOW success response.
    #[inline]
    #[must_use]
    pub fn apply(window_id: WindowId, summary: ApplySummary) -> Self {
        Self {
            ok: true,
            payload: Some(Payload::Apply { window_id, summary }),
            error: None,
        }
    }

    /// Builds a SET_VOLUME / SET_MUTED success response.
    #[inline]
    #[must_use]
    pub fn settings(window_id: WindowId, settings: AudioSettings, summary: ApplySummary) -> Self {
        Self {
            ok: true,
            payload: Some(Payload::Settings {
                window_id,
                volume: settings.volume,
                muted: settings.muted,
                summary,
            }),
            error: None,
        }
    }

    /// Builds a rejected response from an error.
    #[inline]
    #[must_use]
    pub fn failure(error: &Error) -> Self {
        Self {
            ok: false,
            payload: None,
            error: Some(error.to_string()),
        }
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.ok
    }
}

// ============================================================================
// Tests
// ============================================================================
