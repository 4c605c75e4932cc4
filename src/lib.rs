//! Per-window tab volume control engine.
//!
//! This library lets an embedder control playback volume (0–200%) and
//! mute state independently per browser window, applied across every tab
//! of that window, including tabs whose audio cannot be reached by page
//! scripting.
//!
//! # Architecture
//!
//! Two control paths cover every tab, with automatic fallback:
//!
//! - **Page path** (primary): a gain controller runs inside the page's
//!   script context, scaling each media element while tracking its own
//!   base volume ([`PageGainController`]).
//! - **Capture path** (fallback): the tab's audio is captured into a
//!   stream and routed through a gain node on a hidden pipeline surface
//!   ([`CapturePipeline`], [`PipelineSurface`]).
//!
//! The [`Orchestrator`] decides per tab, reconciles state as tabs and
//! windows come and go, and answers typed commands over a uniform
//! `{ok, ...}` envelope.
//!
//! Browser APIs are not reimplemented: tab enumeration, page script
//! execution, stream capture, and audio-graph primitives are capability
//! traits ([`BrowserHost`], [`AudioBackend`]) the embedder backs with
//! the real host.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tab_volume::{Orchestrator, PipelineSurface, Result};
//!
//! # async fn example(
//! #     host: Arc<dyn tab_volume::BrowserHost>,
//! #     backend: Arc<dyn tab_volume::AudioBackend>,
//! # ) -> Result<()> {
//! let engine = Orchestrator::builder()
//!     .host(host)
//!     .surface(Arc::new(PipelineSurface::new(backend)))
//!     .build()?;
//! engine.initialize().await?;
//!
//! // Dispatch a command as the popup would send it.
//! let reply = engine
//!     .handle_raw(r#"{"type":"SET_VOLUME","windowId":1,"volume":80}"#, None)
//!     .await;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | Tab metadata, capturability, [`BrowserHost`] capability |
//! | [`capture`] | Capture pipelines, surface host, audio-graph traits |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`orchestrator`] | Decision logic and lifecycle reconciliation |
//! | [`page`] | In-page media element gain control |
//! | [`protocol`] | Command and surface message types |
//! | [`registry`] | Tab/window bookkeeping |
//! | [`settings`] | Audio settings and persisted storage |
//! | [`volume`] | Volume sanitization and gain math |

// ============================================================================
// Modules
// ============================================================================

/// Tab metadata and the browser capability seam.
///
/// - [`TabInfo`] - Snapshot of a tab's identity and metadata
/// - [`BrowserHost`] - Capability trait the embedder implements
pub mod browser;

/// Tab-audio capture path.
///
/// Pipeline state machine, surface host, and audio-graph traits.
pub mod capture;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for browser entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Control orchestration and state reconciliation.
///
/// Use [`Orchestrator::builder()`] to wire the capability objects.
pub mod orchestrator;

/// In-page media element gain control.
pub mod page;

/// Typed message formats (internal wire shapes).
pub mod protocol;

/// Tab/window bookkeeping.
pub mod registry;

/// Audio settings and persisted storage.
pub mod settings;

/// Volume sanitization and gain math.
pub mod volume;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{BrowserHost, TabChange, TabInfo, TabStatus, is_capturable_url};

// Capture types
pub use capture::{
    AudioBackend, AudioContext, CapturePipeline, CaptureSurface, GainNode, MediaStream,
    PipelineState, PipelineSurface, SourceNode,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, StreamId, TabId, WindowId};

// Orchestrator types
pub use orchestrator::{Orchestrator, OrchestratorBuilder};

// Page types
pub use page::{ElementRef, PageDocument, PageGainController};

// Protocol types
pub use protocol::{ApplySummary, Request, Response};

// Registry types
pub use registry::TabWindowRegistry;

// Settings types
pub use settings::{AudioSettings, JsonFileStore, MemoryStore, SettingsStore};

// Volume math
pub use volume::{DEFAULT_VOLUME, MAX_VOLUME, gain_multiplier, sanitize_volume};
