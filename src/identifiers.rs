//! Type-safe identifiers for browser entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time:
//! passing a [`WindowId`] where a [`TabId`] is expected is a type error,
//! not a silent bookkeeping bug.
//!
//! | Type | Wraps | Used for |
//! |------|-------|----------|
//! | [`TabId`] | `u32` | A single browsing context within a window |
//! | [`WindowId`] | `u32` | A top-level window grouping tabs |
//! | [`StreamId`] | `String` | Opaque capturable media-stream handle |
//! | [`RequestId`] | `Uuid` | Surface request/ack correlation |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// TabId
// ============================================================================

/// Identifier of a browser tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(u32);

impl TabId {
    /// Creates a tab ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// WindowId
// ============================================================================

/// Identifier of a browser window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(u32);

impl WindowId {
    /// Creates a window ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// StreamId
// ============================================================================

/// Opaque handle for a capturable tab media stream.
///
/// Produced by the host's capture capability and consumed by the pipeline
/// surface; the engine never inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Creates a stream ID from its raw handle string.
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw handle string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Unique identifier correlating a surface request with its ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_id_roundtrip() {
        let id = TabId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_ids_are_distinct_types() {
        fn takes_tab(_: TabId) {}
        takes_tab(TabId::new(1));
        // takes_tab(WindowId::new(1)); // must not compile
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&TabId::new(7)).expect("serialize");
        assert_eq!(json, "7");

        let id: WindowId = serde_json::from_str("9").expect("parse");
        assert_eq!(id, WindowId::new(9));
    }

    #[test]
    fn test_request_id_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_stream_id_display() {
        let id = StreamId::new("stream-abc");
        assert_eq!(id.as_str(), "stream-abc");
        assert_eq!(id.to_string(), "stream-abc");
    }
}
