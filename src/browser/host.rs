//! Browser capability seam.
//!
//! The engine never talks to browser APIs directly; everything it needs
//! from the host is behind [`BrowserHost`]. An embedder backs these
//! methods with the real extension APIs (tab enumeration, page script
//! execution across frames, tab-capture stream handles); tests back them
//! with fakes.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::{StreamId, TabId, WindowId};

use super::tab::TabInfo;

// ============================================================================
// BrowserHost
// ============================================================================

/// External browser capabilities required by the orchestrator.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Enumerates the live tabs of a window.
    ///
    /// Always queried fresh; the engine never caches tab lists.
    async fn tabs_in_window(&self, window_id: WindowId) -> Result<Vec<TabInfo>>;

    /// Returns the currently focused window.
    ///
    /// # Errors
    ///
    /// [`crate::Error::WindowResolution`] if no window has focus.
    async fn focused_window(&self) -> Result<WindowId>;

    /// Applies volume/mute state to the page's media elements.
    ///
    /// Runs the page gain controller inside the tab's script context,
    /// across all same-origin frames. This is the primary control path.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Injection`] when the page rejects script execution
    /// (restricted origin, unsupported page); the caller falls back to
    /// the capture path.
    async fn apply_page_audio(&self, tab_id: TabId, volume: u16, muted: bool) -> Result<()>;

    /// Obtains a capturable media-stream handle for a tab.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Capture`] when the tab's audio cannot be captured.
    async fn media_stream_id(&self, tab_id: TabId) -> Result<StreamId>;
}
