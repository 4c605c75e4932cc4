//! In-page media element gain control.
//!
//! [`PageGainController`] is the logic the host deploys into a page's
//! script context: it makes every media element reflect the window's
//! volume/mute setting while preserving the page's own notion of its
//! desired volume. It communicates with the orchestrator only through
//! the injection capability's return value, never shared memory.
//!
//! # Base volume tracking
//!
//! A media element's raw volume is always the *product* of the page's
//! intended volume and the applied multiplier, never the intention alone.
//! Each element therefore carries a `base_volume` derived on first sight
//! by dividing the raw volume by the last-applied multiplier. Organic
//! volume changes (the page or user adjusting a player) rebase the
//! element so the intention survives the next control application;
//! system-applied writes are recognized by value and never rebase.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::volume::{clamp_unit, gain_multiplier};

// ============================================================================
// ElementRef
// ============================================================================

/// Page-scoped reference to a media element.
///
/// Valid only within one page's lifetime; a navigation discards the
/// controller together with its references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef(u64);

impl ElementRef {
    /// Creates a reference from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// PageDocument
// ============================================================================

/// The page seam: enumerate media elements and access their raw volume.
///
/// The host implements this over the live DOM (including same-origin
/// frames) and routes `volumechange` events and subtree insertions to the
/// controller's handlers.
pub trait PageDocument {
    /// References to every media element currently in the document.
    fn media_elements(&self) -> Vec<ElementRef>;

    /// Raw volume of an element in `[0.0, 1.0]`, or `None` if it is gone.
    fn volume(&self, element: ElementRef) -> Option<f64>;

    /// Assigns an element's raw volume.
    fn set_volume(&mut self, element: ElementRef, value: f64);
}

// ============================================================================
// Types
// ============================================================================

/// Last-applied page-global control state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AppliedState {
    /// Gain multiplier in `[0.0, 2.0]`.
    multiplier: f64,
    /// Mute flag.
    muted: bool,
}

impl Default for AppliedState {
    fn default() -> Self {
        // Before the first application the page is its own master.
        Self {
            multiplier: 1.0,
            muted: false,
        }
    }
}

/// Per-element tracked state.
#[derive(Debug, Clone, Copy)]
struct ElementState {
    /// The element's own intended volume, normalized to `[0.0, 1.0]`.
    base_volume: f64,
    /// Raw value of the last system-applied write.
    last_applied: f64,
    /// Whether the change-observer has been installed.
    observed: bool,
}

// ============================================================================
// PageGainController
// ============================================================================

/// Per-page gain controller.
///
/// One instance lives for one page's lifetime. Applying repeatedly is
/// idempotent: element state is cached and reused across invocations.
#[derive(Debug, Default)]
pub struct PageGainController {
    /// Last-applied control state.
    applied: AppliedState,
    /// Tracked media elements.
    elements: FxHashMap<ElementRef, ElementState>,
}

impl PageGainController {
    /// Creates a controller for a fresh page.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a volume/mute setting to every media element in the page.
    pub fn apply(&mut self, page: &mut dyn PageDocument, volume: u16, muted: bool) {
        let previous_multiplier = self.applied.multiplier;
        self.applied = AppliedState {
            multiplier: gain_multiplier(volume),
            muted,
        };

        for element in page.media_elements() {
            self.control_element(page, element, previous_multiplier);
        }
    }

    /// Handles media elements discovered in inserted subtrees.
    ///
    /// Newly inserted elements receive the current control state; their
    /// base volume is derived against the active multiplier.
    pub fn handle_elements_added(&mut self, page: &mut dyn PageDocument, added: &[ElementRef]) {
        let active_multiplier = self.applied.multiplier;
        for &element in added {
            self.control_element(page, element, active_multiplier);
        }
    }

    /// Handles a `volumechange` event for a tracked element.
    ///
    /// System-applied writes are recognized by value and ignored. An
    /// organic change rebases the element, unless muted or at zero
    /// multiplier, where the raw volume carries no base information.
    pub fn handle_volume_change(&mut self, page: &dyn PageDocument, element: ElementRef) {
        let Some(raw) = page.volume(element) else {
            return;
        };

        let Some(state) = self.elements.get_mut(&element) else {
            return;
        };

        if (raw - state.last_applied).abs() <= f64::EPSILON {
            return;
        }

        if self.applied.muted || self.applied.multiplier <= 0.0 {
            return;
        }

        state.base_volume = clamp_unit(raw / self.applied.multiplier);
        trace!(element = %element, base = state.base_volume, "Element rebased");
    }

    /// Returns the tracked base volume of an element.
    #[inline]
    #[must_use]
    pub fn base_volume(&self, element: ElementRef) -> Option<f64> {
        self.elements.get(&element).map(|s| s.base_volume)
    }

    /// Returns `true` if an element has its change-observer installed.
    #[inline]
    #[must_use]
    pub fn is_observed(&self, element: ElementRef) -> bool {
        self.elements
            .get(&element)
            .is_some_and(|state| state.observed)
    }

    /// Number of media elements currently tracked.
    #[inline]
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.elements.len()
    }

    /// Applies the active state to one element, deriving its base volume
    /// on first sight against `derive_multiplier`.
    fn control_element(
        &mut self,
        page: &mut dyn PageDocument,
        element: ElementRef,
        derive_multiplier: f64,
    ) {
        let Some(raw) = page.volume(element) else {
            return;
        };

        let state = self.elements.entry(element).or_insert_with(|| {
            let derived = if derive_multiplier > 0.0 {
                raw / derive_multiplier
            } else {
                raw
            };
            ElementState {
                base_volume: clamp_unit(derived),
                last_applied: raw,
                observed: false,
            }
        });

        let effective = if self.applied.muted {
            0.0
        } else {
            clamp_unit(state.base_volume * self.applied.multiplier)
        };

        state.last_applied = effective;
        state.observed = true;
        page.set_volume(element, effective);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory page with addressable media elements.
    #[derive(Debug, Default)]
    struct FakePage {
        volumes: FxHashMap<ElementRef, f64>,
    }

    impl FakePage {
        fn with_elements(volumes: &[(u64, f64)]) -> Self {
            Self {
                volumes: volumes
                    .iter()
                    .map(|&(id, v)| (ElementRef::new(id), v))
                    .collect(),
            }
        }

        fn insert(&mut self, id: u64, volume: f64) -> ElementRef {
            let element = ElementRef::new(id);
            self.volumes.insert(element, volume);
            element
        }
    }

    impl PageDocument for FakePage {
        fn media_elements(&self) -> Vec<ElementRef> {
            let mut ids: Vec<_> = self.volumes.keys().copied().collect();
            ids.sort_unstable();
            ids
        }

        fn volume(&self, element: ElementRef) -> Option<f64> {
            self.volumes.get(&element).copied()
        }

        fn set_volume(&mut self, element: ElementRef, value: f64) {
            self.volumes.insert(element, value);
        }
    }

    #[test]
    fn test_apply_scales_elements() {
        let mut page = FakePage::with_elements(&[(1, 0.8), (2, 0.5)]);
        let mut controller = PageGainController::new();

        controller.apply(&mut page, 50, false);

        assert_eq!(page.volume(ElementRef::new(1)), Some(0.4));
        assert_eq!(page.volume(ElementRef::new(2)), Some(0.25));
        assert_eq!(controller.base_volume(ElementRef::new(1)), Some(0.8));
    }

    #[test]
    fn test_base_volume_survives_reapply() {
        let mut page = FakePage::with_elements(&[(1, 0.8)]);
        let mut controller = PageGainController::new();
        let el = ElementRef::new(1);

        controller.apply(&mut page, 50, false);
        controller.apply(&mut page, 200, false);

        // 0.8 * 2.0 clamps to 1.0; the base itself is untouched.
        assert_eq!(page.volume(el), Some(1.0));
        assert_eq!(controller.base_volume(el), Some(0.8));

        controller.apply(&mut page, 100, false);
        assert_eq!(page.volume(el), Some(0.8));
    }

    #[test]
    fn test_mute_zeroes_without_losing_base() {
        let mut page = FakePage::with_elements(&[(1, 0.6)]);
        let mut controller = PageGainController::new();
        let el = ElementRef::new(1);

        controller.apply(&mut page, 100, true);
        assert_eq!(page.volume(el), Some(0.0));
        assert_eq!(controller.base_volume(el), Some(0.6));

        controller.apply(&mut page, 100, false);
        assert_eq!(page.volume(el), Some(0.6));
    }

    #[test]
    fn test_organic_change_rebases() {
        let mut page = FakePage::with_elements(&[(1, 1.0)]);
        let mut controller = PageGainController::new();
        let el = ElementRef::new(1);

        controller.apply(&mut page, 50, false);
        assert_eq!(page.volume(el), Some(0.5));

        // The user drags the player's own slider to 0.25 while the 0.5x
        // multiplier is active: intention is 0.5.
        page.set_volume(el, 0.25);
        controller.handle_volume_change(&page, el);
        assert_eq!(controller.base_volume(el), Some(0.5));

        controller.apply(&mut page, 100, false);
        assert_eq!(page.volume(el), Some(0.5));
    }

    #[test]
    fn test_system_write_does_not_rebase() {
        let mut page = FakePage::with_elements(&[(1, 0.8)]);
        let mut controller = PageGainController::new();
        let el = ElementRef::new(1);

        controller.apply(&mut page, 50, false);

        // The host echoes the system-applied write back as an event.
        controller.handle_volume_change(&page, el);
        assert_eq!(controller.base_volume(el), Some(0.8));
    }

    #[test]
    fn test_no_rebase_while_muted_or_zeroed() {
        let mut page = FakePage::with_elements(&[(1, 0.8)]);
        let mut controller = PageGainController::new();
        let el = ElementRef::new(1);

        controller.apply(&mut page, 100, true);
        page.set_volume(el, 0.3);
        controller.handle_volume_change(&page, el);
        assert_eq!(controller.base_volume(el), Some(0.8));

        controller.apply(&mut page, 0, false);
        page.set_volume(el, 0.9);
        controller.handle_volume_change(&page, el);
        assert_eq!(controller.base_volume(el), Some(0.8));
    }

    #[test]
    fn test_added_elements_receive_current_state() {
        let mut page = FakePage::with_elements(&[(1, 1.0)]);
        let mut controller = PageGainController::new();

        controller.apply(&mut page, 50, false);

        let added = page.insert(2, 1.0);
        controller.handle_elements_added(&mut page, &[added]);

        assert_eq!(page.volume(added), Some(0.5));
        assert!(controller.is_observed(added));
        assert_eq!(controller.tracked_count(), 2);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut page = FakePage::with_elements(&[(1, 0.8)]);
        let mut controller = PageGainController::new();
        let el = ElementRef::new(1);

        controller.apply(&mut page, 50, false);
        let first = page.volume(el);
        controller.apply(&mut page, 50, false);
        controller.apply(&mut page, 50, false);

        assert_eq!(page.volume(el), first);
        assert_eq!(controller.base_volume(el), Some(0.8));
    }

    #[test]
    fn test_vanished_element_is_skipped() {
        let mut page = FakePage::with_elements(&[(1, 0.8)]);
        let mut controller = PageGainController::new();

        controller.apply(&mut page, 50, false);
        page.volumes.remove(&ElementRef::new(1));

        // Neither handler panics on a stale reference.
        controller.handle_volume_change(&page, ElementRef::new(1));
        controller.handle_elements_added(&mut page, &[ElementRef::new(1)]);
    }
}
