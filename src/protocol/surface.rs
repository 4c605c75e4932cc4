//! Capture-surface message types.
//!
//! Defines the messages between the orchestrator and the pipeline
//! surface hosting capture pipelines. Fire-and-forget-with-ack: every
//! request carries a correlation [`RequestId`] echoed in its ack, and
//! every operation is idempotent on the surface side.
//!
//! # Format
//!
//! ```json
//! { "id": "uuid", "type": "ATTACH_TAB_STREAM", "tabId": 4, "streamId": "s-1" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{RequestId, StreamId, TabId};

// ============================================================================
// SurfaceRequest
// ============================================================================

/// A request to the pipeline surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRequest {
    /// Correlation ID echoed in the ack.
    pub id: RequestId,

    /// The operation to perform.
    #[serde(flatten)]
    pub command: SurfaceCommand,
}

impl SurfaceRequest {
    /// Creates a request with a fresh correlation ID.
    #[inline]
    #[must_use]
    pub fn new(command: SurfaceCommand) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }
}

// ============================================================================
// SurfaceCommand
// ============================================================================

/// Operations on the pipeline surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceCommand {
    /// Builds a capture pipeline for a tab from a stream handle.
    ///
    /// A tab that already has a pipeline acks success without building
    /// a second one.
    #[serde(rename = "ATTACH_TAB_STREAM")]
    AttachTabStream {
        /// Target tab.
        #[serde(rename = "tabId")]
        tab_id: TabId,
        /// Capturable stream handle for the tab.
        #[serde(rename = "streamId")]
        stream_id: StreamId,
    },

    /// Updates the gain of a tab's pipeline.
    ///
    /// No-op for tabs without a pipeline.
    #[serde(rename = "SET_TAB_AUDIO")]
    SetTabAudio {
        /// Target tab.
        #[serde(rename = "tabId")]
        tab_id: TabId,
        /// Volume percentage, `0..=200`.
        volume: u16,
        /// Mute flag.
        muted: bool,
    },

    /// Tears down a tab's pipeline.
    ///
    /// No-op for tabs without a pipeline.
    #[serde(rename = "RELEASE_TAB_STREAM")]
    ReleaseTabStream {
        /// Target tab.
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

impl SurfaceCommand {
    /// The tab this command targets.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::AttachTabStream { tab_id, .. }
            | Self::SetTabAudio { tab_id, .. }
            | Self::ReleaseTabStream { tab_id } => *tab_id,
        }
    }
}

// ============================================================================
// SurfaceAck
// ============================================================================

/// Acknowledgement of a surface request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceAck {
    /// Correlation ID of the request being acked.
    pub id: RequestId,

    /// `true` on success.
    pub ok: bool,

    /// Error description when `ok` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SurfaceAck {
    /// Builds a success ack.
    #[inline]
    #[must_use]
    pub fn success(id: RequestId) -> Self {
        Self {
            id,
            ok: true,
            error: None,
        }
    }

    /// Builds a failure ack.
    #[inline]
    #[must_use]
    pub fn failure(id: RequestId, error: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_serialization() {
        let request = SurfaceRequest::new(SurfaceCommand::AttachTabStream {
            tab_id: TabId::new(4),
            stream_id: StreamId::new("s-1"),
        });
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains("\"type\":\"ATTACH_TAB_STREAM\""));
        assert!(json.contains("\"tabId\":4"));
        assert!(json.contains("\"streamId\":\"s-1\""));
    }

    #[test]
    fn test_command_tab_id() {
        let command = SurfaceCommand::SetTabAudio {
            tab_id: TabId::new(7),
            volume: 120,
            muted: false,
        };
        assert_eq!(command.tab_id(), TabId::new(7));
    }

    #[test]
    fn test_ack_roundtrip() {
        let id = RequestId::generate();
        let ack = SurfaceAck::failure(id, "no stream");
        let json = serde_json::to_string(&ack).expect("serialize");
        let parsed: SurfaceAck = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, ack);
        assert!(!parsed.ok);
    }
}
