use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::model::Action;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub cumulative_performance: f64,
    pub action_count: u64,
    pub wins: u64,
    /// Actions recorded through this ledger (excludes the opening count).
    pub recorded: u64,
}

impl LedgerSnapshot {
    pub fn win_rate(&self) -> Option<f64> {
        if self.recorded == 0 {
            None
        } else {
            Some(self.wins as f64 / self.recorded as f64)
        }
    }
}

/// Unbounded running aggregate of action outcomes.
///
/// Independent of the action history: eviction there never touches totals here.
#[derive(Debug, Default)]
pub struct Ledger {
    inner: Mutex<LedgerSnapshot>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opening(performance: f64, action_count: u64) -> Self {
        Self {
            inner: Mutex::new(LedgerSnapshot {
                cumulative_performance: performance,
                action_count,
                ..Default::default()
            }),
        }
    }

    /// Fold one completed action. Returns the snapshot right after the fold.
    pub fn record(&self, action: &Action) -> LedgerSnapshot {
        let delta = action.performance_delta.unwrap_or(0.0);
        let mut snap = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        snap.cumulative_performance += delta;
        snap.action_count += 1;
        snap.recorded += 1;
        if delta > 0.0 {
            snap.wins += 1;
        }
        *snap
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
