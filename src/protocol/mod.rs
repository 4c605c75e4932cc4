//! Typed message formats.
//!
//! Two message families cross the engine's boundaries:
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Request`] | control surface → orchestrator | User intent |
//! | [`Response`] | orchestrator → control surface | Uniform `{ok, ...}` envelope |
//! | [`SurfaceRequest`] | orchestrator → pipeline surface | Pipeline operation |
//! | [`SurfaceAck`] | pipeline surface → orchestrator | Idempotent ack |
//!
//! Requests are tagged on a SCREAMING_CASE `type` field with camelCase
//! payload keys, so embedders can bridge them to extension messaging
//! verbatim.

// ============================================================================
// Submodules
// ============================================================================

/// Orchestrator command types.
pub mod request;

/// Capture-surface message types.
pub mod surface;

// ============================================================================
// Re-exports
// ============================================================================

pub use request::{ApplySummary, Payload, Request, Response};
pub use surface::{SurfaceAck, SurfaceCommand, SurfaceRequest};
