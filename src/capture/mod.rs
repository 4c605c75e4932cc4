//! Tab-audio capture path.
//!
//! The fallback control mechanism for tabs whose pages reject script
//! injection: capture the tab's audio into a stream and route it through
//! a gain node.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CapturePipeline`] | Per-tab stream + audio graph state machine |
//! | [`PipelineHost`] | Event-loop task owning all pipelines |
//! | [`PipelineSurface`] | Lazily-created singleton surface handle |
//! | [`CaptureSurface`] | Surface capability trait |
//! | [`AudioBackend`] | Audio-graph primitives capability trait |

// ============================================================================
// Submodules
// ============================================================================

/// Pipeline surface host and handles.
pub mod host;

/// Per-tab capture pipeline and audio-graph traits.
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use host::{CaptureSurface, PipelineHost, PipelineSurface, SurfaceHandle};
pub use pipeline::{
    AudioBackend, AudioContext, CapturePipeline, GainNode, MediaStream, PipelineState, SourceNode,
};
