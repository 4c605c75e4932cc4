//! Tab/window bookkeeping.
//!
//! [`TabWindowRegistry`] tracks which window each controlled tab belongs
//! to and which tabs currently run a capture pipeline. Pure synchronous
//! bookkeeping: no method touches the host, and membership in the
//! attached set is the single source of truth for "this tab is on the
//! fallback path".

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::{FxHashMap, FxHashSet};

use crate::identifiers::{TabId, WindowId};

// ============================================================================
// TabWindowRegistry
// ============================================================================

/// Bookkeeping of tab→window association and pipeline attachment.
#[derive(Debug, Default)]
pub struct TabWindowRegistry {
    /// Owning window of each controlled tab.
    tab_to_window: FxHashMap<TabId, WindowId>,

    /// Tabs with a live capture pipeline.
    attached: FxHashSet<TabId>,
}

impl TabWindowRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a tab with its owning window.
    ///
    /// Unconditional; the orchestrator guards insertion against untracked
    /// windows on lifecycle events, while the capture-attach path always
    /// records the mapping.
    #[inline]
    pub fn map_tab(&mut self, tab_id: TabId, window_id: WindowId) {
        self.tab_to_window.insert(tab_id, window_id);
    }

    /// Drops all bookkeeping for a tab.
    ///
    /// Returns `true` if the tab had a live capture pipeline, so the
    /// caller knows a release is owed.
    pub fn forget_tab(&mut self, tab_id: TabId) -> bool {
        self.tab_to_window.remove(&tab_id);
        self.attached.remove(&tab_id)
    }

    /// Returns the window a tab is mapped to, if any.
    #[inline]
    #[must_use]
    pub fn window_of(&self, tab_id: TabId) -> Option<WindowId> {
        self.tab_to_window.get(&tab_id).copied()
    }

    /// Tabs currently mapped to a window.
    #[must_use]
    pub fn tabs_mapped_to(&self, window_id: WindowId) -> Vec<TabId> {
        self.tab_to_window
            .iter()
            .filter(|&(_, &mapped)| mapped == window_id)
            .map(|(&tab, _)| tab)
            .collect()
    }

    /// Marks a tab as running a capture pipeline.
    #[inline]
    pub fn mark_attached(&mut self, tab_id: TabId) {
        self.attached.insert(tab_id);
    }

    /// Clears a tab's attached mark (without touching the window map).
    #[inline]
    pub fn clear_attached(&mut self, tab_id: TabId) {
        self.attached.remove(&tab_id);
    }

    /// Returns `true` if a tab is on the capture fallback path.
    #[inline]
    #[must_use]
    pub fn is_attached(&self, tab_id: TabId) -> bool {
        self.attached.contains(&tab_id)
    }

    /// Number of tabs with a live capture pipeline.
    #[inline]
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Number of tabs with a window association.
    #[inline]
    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.tab_to_window.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
