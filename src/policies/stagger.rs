//! # Stagger policy for bulk connect sweeps.
//!
//! Connecting many accounts at the same instant looks automated and invites
//! rate limiting. [`StaggerPolicy`] spreads a sweep out: every handle waits a
//! random step in `[min_step, max_step]` longer than the previous one.
//!
//! ```text
//! index:   0     1          2               3
//! delay:   0 ── +rand ──► d1 ── +rand ──► d2 ── +rand ──► d3
//! bounds:  0   [5s,15s]   [10s,30s]       [15s,45s]
//! ```
//!
//! Delays are therefore non-decreasing and `delay[i]` always lies within
//! `[i × min_step, i × max_step]`.

use std::time::Duration;

use rand::Rng;

/// Randomized incremental delay between connect attempts of one sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaggerPolicy {
    /// Smallest gap between two consecutive handles.
    pub min_step: Duration,
    /// Largest gap between two consecutive handles.
    pub max_step: Duration,
}

impl Default for StaggerPolicy {
    /// Returns `min_step = 5s`, `max_step = 15s`.
    fn default() -> Self {
        Self {
            min_step: Duration::from_secs(5),
            max_step: Duration::from_secs(15),
        }
    }
}

impl StaggerPolicy {
    /// Computes delays for `count` handles in index order.
    ///
    /// With `stagger = false` every delay is zero.
    pub fn delays(&self, count: usize, stagger: bool) -> Vec<Duration> {
        if !stagger {
            return vec![Duration::ZERO; count];
        }

        let mut rng = rand::rng();
        let lo = self.min_step.min(self.max_step).as_millis() as u64;
        let hi = self.max_step.max(self.min_step).as_millis() as u64;

        let mut acc = Duration::ZERO;
        let mut out = Vec::with_capacity(count);
        for index in 0..count {
            if index > 0 {
                acc += Duration::from_millis(rng.random_range(lo..=hi));
            }
            out.push(acc);
        }
        out
    }
}
