//! Volume sanitization and gain math.
//!
//! Pure numeric policy shared by both control paths. The page path and the
//! capture path both derive their multiplier from [`gain_multiplier`], so
//! the two mechanisms agree numerically at the same volume setting.

// ============================================================================
// Constants
// ============================================================================

/// Default volume percentage applied when no setting is persisted.
pub const DEFAULT_VOLUME: u16 = 100;

/// Maximum volume percentage (200% = 2.0x gain boost).
pub const MAX_VOLUME: u16 = 200;

// ============================================================================
// Volume Math
// ============================================================================

/// Sanitizes a raw volume value into a valid percentage.
///
/// Non-finite input falls back to [`DEFAULT_VOLUME`]; anything else is
/// clamped to `0..=200` and rounded to the nearest integer.
#[inline]
#[must_use]
pub fn sanitize_volume(raw: f64) -> u16 {
    if !raw.is_finite() {
        return DEFAULT_VOLUME;
    }

    raw.clamp(0.0, f64::from(MAX_VOLUME)).round() as u16
}

/// Converts a volume percentage into a linear gain multiplier.
///
/// The result is bounded to `[0.0, 2.0]` and monotonic in the input.
#[inline]
#[must_use]
pub fn gain_multiplier(volume: u16) -> f64 {
    (f64::from(volume) / 100.0).clamp(0.0, 2.0)
}

/// Clamps a raw element volume into the valid `[0.0, 1.0]` range.
#[inline]
#[must_use]
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_sanitize_defaults_on_non_finite() {
        assert_eq!(sanitize_volume(f64::NAN), DEFAULT_VOLUME);
        assert_eq!(sanitize_volume(f64::INFINITY), DEFAULT_VOLUME);
        assert_eq!(sanitize_volume(f64::NEG_INFINITY), DEFAULT_VOLUME);
    }

    #[test]
    fn test_sanitize_clamps_and_rounds() {
        assert_eq!(sanitize_volume(-5.0), 0);
        assert_eq!(sanitize_volume(0.0), 0);
        assert_eq!(sanitize_volume(99.4), 99);
        assert_eq!(sanitize_volume(99.5), 100);
        assert_eq!(sanitize_volume(200.0), 200);
        assert_eq!(sanitize_volume(2_000.0), 200);
    }

    #[test]
    fn test_gain_multiplier_reference_points() {
        assert_eq!(gain_multiplier(0), 0.0);
        assert_eq!(gain_multiplier(50), 0.5);
        assert_eq!(gain_multiplier(100), 1.0);
        assert_eq!(gain_multiplier(200), 2.0);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(0.25), 0.25);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }

    proptest! {
        #[test]
        fn prop_sanitize_in_range(raw in proptest::num::f64::ANY) {
            let v = sanitize_volume(raw);
            prop_assert!(v <= MAX_VOLUME);
        }

        #[test]
        fn prop_sanitize_idempotent(raw in proptest::num::f64::ANY) {
            let once = sanitize_volume(raw);
            prop_assert_eq!(sanitize_volume(f64::from(once)), once);
        }

        #[test]
        fn prop_gain_bounded(volume in 0u16..=u16::MAX) {
            let gain = gain_multiplier(volume);
            prop_assert!((0.0..=2.0).contains(&gain));
        }

        #[test]
        fn prop_gain_monotonic(a in 0u16..=300, b in 0u16..=300) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(gain_multiplier(lo) <= gain_multiplier(hi));
        }
    }
}
