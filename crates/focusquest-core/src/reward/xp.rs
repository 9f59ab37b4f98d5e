//! Experience points and levels.
//!
//! Levels follow a geometric curve: reaching level `n` requires
//! `base * (growth^(n-1) - 1) / (growth - 1)` total XP, truncated. Level 1 is
//! free. There is no level cap.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XpCurve {
    pub base: u64,
    pub growth: f64,
}

impl XpCurve {
    pub fn new(base: u64, growth: f64) -> Result<Self> {
        if base == 0 {
            return Err(ValidationError::InvalidValue {
                field: "xp.base".to_string(),
                message: "must be positive".to_string(),
            }
            .into());
        }
        if !growth.is_finite() || growth <= 1.0 {
            return Err(ValidationError::InvalidValue {
                field: "xp.growth".to_string(),
                message: format!("must be greater than 1 (got {growth})"),
            }
            .into());
        }
        Ok(Self { base, growth })
    }

    /// Total XP required to reach `level`.
    ///
    /// Levels whose threshold does not fit in a `u64` report `u64::MAX` and
    /// can never be reached; see [`XpCurve::max_level`].
    pub fn threshold(&self, level: u32) -> u64 {
        self.checked_threshold(level).unwrap_or(u64::MAX)
    }

    /// Highest level with a representable threshold.
    pub fn max_level(&self) -> u32 {
        let (mut lo, mut hi) = (1u32, u32::MAX);
        while lo < hi {
            let mid = lo + (hi - lo) / 2 + 1;
            if self.checked_threshold(mid).is_some() {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    fn checked_threshold(&self, level: u32) -> Option<u64> {
        if level <= 1 {
            return Some(0);
        }
        let steps = i32::try_from(level - 1).ok()?;
        let total = self.base as f64 * (self.growth.powi(steps) - 1.0) / (self.growth - 1.0);
        // 2^64 is exactly representable; anything below it fits.
        if total.is_finite() && total < u64::MAX as f64 {
            Some(total as u64)
        } else {
            None
        }
    }
}

impl Default for XpCurve {
    fn default() -> Self {
        Self {
            base: 100,
            growth: 1.1,
        }
    }
}

/// Total XP required to reach `level` on the default curve.
pub fn xp_threshold(level: u32) -> u64 {
    XpCurve::default().threshold(level)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpProgress {
    pub xp: u64,
    pub level: u32,
}

pub struct XpLedger {
    curve: XpCurve,
    progress: Mutex<XpProgress>,
}

impl XpLedger {
    pub fn new() -> Self {
        Self::with_curve(XpCurve::default())
    }

    pub fn with_curve(curve: XpCurve) -> Self {
        Self {
            curve,
            progress: Mutex::new(XpProgress { xp: 0, level: 1 }),
        }
    }

    pub fn curve(&self) -> &XpCurve {
        &self.curve
    }

    /// Add XP. Returns whether at least one level was gained.
    pub fn add_xp(&self, amount: i64) -> Result<bool> {
        if amount < 0 {
            return Err(ValidationError::NegativeAmount { amount }.into());
        }
        if amount == 0 {
            return Ok(false);
        }
        let (before, after) = {
            let mut progress = self.progress.lock();
            let before = *progress;
            progress.xp = progress.xp.saturating_add(amount as u64);
            let cap = self.curve.max_level();
            while progress.level < cap {
                let next = self.curve.threshold(progress.level + 1);
                // A curve built without validation may be flat.
                if progress.xp < next || next <= self.curve.threshold(progress.level) {
                    break;
                }
                progress.level += 1;
            }
            (before, *progress)
        };
        let leveled_up = after.level > before.level;
        if leveled_up {
            tracing::info!(from = before.level, to = after.level, xp = after.xp, "level up");
        } else {
            tracing::debug!(amount, xp = after.xp, "xp added");
        }
        Ok(leveled_up)
    }

    pub fn current_xp(&self) -> u64 {
        self.progress.lock().xp
    }

    pub fn current_level(&self) -> u32 {
        self.progress.lock().level
    }

    pub fn progress(&self) -> XpProgress {
        *self.progress.lock()
    }

    /// Total XP at which the next level is reached.
    pub fn xp_for_next_level(&self) -> u64 {
        let level = self.current_level();
        self.curve.threshold(level.saturating_add(1))
    }

    pub fn xp_to_next_level(&self) -> u64 {
        let progress = self.progress();
        self.curve
            .threshold(progress.level.saturating_add(1))
            .saturating_sub(progress.xp)
    }

    /// 0.0 .. 1.0 progress from the current level to the next.
    pub fn level_progress(&self) -> f64 {
        let progress = self.progress();
        let floor = self.curve.threshold(progress.level);
        let ceiling = self.curve.threshold(progress.level.saturating_add(1));
        if ceiling <= floor {
            return 0.0;
        }
        (progress.xp.saturating_sub(floor)) as f64 / (ceiling - floor) as f64
    }
}

impl Default for XpLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for XpLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XpLedger")
            .field("curve", &self.curve)
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn threshold_curve_basics() {
        assert_eq!(xp_threshold(0), 0);
        assert_eq!(xp_threshold(1), 0);
        assert_eq!(xp_threshold(2), 100);
        assert!((209..=210).contains(&xp_threshold(3)));
    }

    #[test]
    fn negative_amount_rejected() {
        let ledger = XpLedger::new();
        assert!(matches!(
            ledger.add_xp(-5),
            Err(CoreError::Validation(ValidationError::NegativeAmount { amount: -5 }))
        ));
        assert_eq!(ledger.current_xp(), 0);
    }

    #[test]
    fn zero_amount_is_noop() {
        let ledger = XpLedger::new();
        assert!(!ledger.add_xp(0).unwrap());
        assert_eq!(ledger.current_xp(), 0);
        assert_eq!(ledger.current_level(), 1);
    }

    #[test]
    fn levels_up_at_threshold() {
        let ledger = XpLedger::new();
        assert!(!ledger.add_xp(99).unwrap());
        assert_eq!(ledger.current_level(), 1);
        assert!(ledger.add_xp(1).unwrap());
        assert_eq!(ledger.current_level(), 2);
        assert_eq!(ledger.xp_for_next_level(), xp_threshold(3));
    }

    #[test]
    fn large_grant_skips_several_levels() {
        let ledger = XpLedger::new();
        let target = xp_threshold(6);
        assert!(ledger.add_xp(target as i64).unwrap());
        assert_eq!(ledger.current_level(), 6);
        assert_eq!(ledger.xp_to_next_level(), xp_threshold(7) - target);
    }

    #[test]
    fn level_progress_is_fractional() {
        let ledger = XpLedger::new();
        ledger.add_xp(50).unwrap();
        assert!((ledger.level_progress() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn invalid_curves_rejected() {
        assert!(XpCurve::new(0, 1.1).is_err());
        assert!(XpCurve::new(100, 1.0).is_err());
        assert!(XpCurve::new(100, f64::NAN).is_err());
        assert!(XpCurve::new(50, 1.5).is_ok());
    }

    #[test]
    fn concurrent_grants_are_not_lost() {
        let ledger = Arc::new(XpLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        ledger.add_xp(3).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.current_xp(), 8 * 250 * 3);
        let level = ledger.current_level();
        assert!(ledger.current_xp() >= xp_threshold(level));
        assert!(ledger.current_xp() < xp_threshold(level + 1));
    }

    #[test]
    fn thresholds_stop_at_the_largest_representable_level() {
        let curve = XpCurve::default();
        let max = curve.max_level();
        assert!(max > 300);
        assert!(curve.threshold(max) < u64::MAX);
        assert_eq!(curve.threshold(max + 1), u64::MAX);
        assert_eq!(curve.threshold(u32::MAX), u64::MAX);
    }

    #[test]
    fn saturating_grants_stop_at_max_level() {
        let ledger = XpLedger::new();
        ledger.add_xp(i64::MAX).unwrap();
        ledger.add_xp(i64::MAX).unwrap();
        assert!(!ledger.add_xp(i64::MAX).unwrap());
        assert_eq!(ledger.current_xp(), u64::MAX);
        assert_eq!(ledger.current_level(), ledger.curve().max_level());
        assert_eq!(ledger.xp_to_next_level(), 0);
    }

    proptest! {
        #[test]
        fn threshold_strictly_increasing(level in 1u32..XpCurve::default().max_level()) {
            prop_assert!(xp_threshold(level + 1) > xp_threshold(level));
        }

        #[test]
        fn ledger_is_monotonic(amounts in proptest::collection::vec(0i64..5_000, 1..40)) {
            let ledger = XpLedger::new();
            let mut last = ledger.progress();
            for amount in amounts {
                ledger.add_xp(amount).unwrap();
                let now = ledger.progress();
                prop_assert!(now.xp >= last.xp);
                prop_assert!(now.level >= last.level);
                prop_assert!(now.xp >= xp_threshold(now.level));
                prop_assert!(now.xp < xp_threshold(now.level + 1));
                last = now;
            }
        }
    }
}
