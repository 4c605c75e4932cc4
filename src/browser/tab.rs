//! Tab metadata and capturability rules.
//!
//! The engine never owns live tab handles; it works on [`TabInfo`]
//! snapshots delivered by the host through lifecycle events and
//! enumeration queries.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::identifiers::{TabId, WindowId};

// ============================================================================
// Constants
// ============================================================================

/// URL schemes excluded from both control paths.
///
/// Internal browser pages, extension pages, devtools, and bare scheme
/// pages reject script injection and stream capture alike.
const BLOCKED_SCHEMES: [&str; 5] = ["edge", "chrome", "chrome-extension", "devtools", "about"];

// ============================================================================
// TabStatus
// ============================================================================

/// Load status of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    /// Page is still loading.
    Loading,
    /// Page finished loading.
    Complete,
}

// ============================================================================
// TabInfo
// ============================================================================

/// Snapshot of a tab's identity and audio-relevant metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    /// Tab identifier.
    pub id: TabId,

    /// Owning window.
    #[serde(rename = "windowId")]
    pub window_id: WindowId,

    /// Current URL; empty until the first navigation commits.
    #[serde(default)]
    pub url: String,

    /// Load status, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,

    /// Whether the tab is currently playing audio, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audible: Option<bool>,
}

impl TabInfo {
    /// Creates a snapshot with only identity and URL set.
    #[must_use]
    pub fn new(id: TabId, window_id: WindowId, url: impl Into<String>) -> Self {
        Self {
            id,
            window_id,
            url: url.into(),
            status: None,
            audible: None,
        }
    }

    /// Returns `true` if this tab is eligible for either control path.
    #[inline]
    #[must_use]
    pub fn is_capturable(&self) -> bool {
        is_capturable_url(&self.url)
    }
}

// ============================================================================
// TabChange
// ============================================================================

/// Delta delivered with a tab-updated lifecycle event.
///
/// Mirrors the host's change notification: only fields that actually
/// changed are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabChange {
    /// New load status, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,

    /// New URL, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// New audible flag, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audible: Option<bool>,
}

impl TabChange {
    /// Returns `true` if this change warrants re-applying audio control.
    ///
    /// Only load completion, a URL change, or an audible-flag change are
    /// worth acting on; every other update event is noise.
    #[inline]
    #[must_use]
    pub fn triggers_reapply(&self) -> bool {
        matches!(self.status, Some(TabStatus::Complete))
            || self.url.is_some()
            || self.audible.is_some()
    }
}

// ============================================================================
// Capturability
// ============================================================================

/// Returns `true` if a URL belongs to a tab eligible for audio control.
///
/// Empty and unparseable URLs are not capturable; neither is any URL
/// whose scheme is in the blocked set.
#[must_use]
pub fn is_capturable_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => !BLOCKED_SCHEMES.contains(&parsed.scheme()),
        Err(_) => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
