use std::sync::Mutex;

use crate::error::SentinelError;
use crate::ledger::LedgerSnapshot;
use crate::logging;
use crate::model::{Action, DetectedEvent, SystemStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Auto,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Auto => "auto",
            Trigger::Manual => "manual",
        }
    }
}

/// Notified after each state change. Callbacks run on the scheduling path and
/// must not call back into the sentinel.
pub trait CycleObserver: Send + Sync {
    fn on_status(&self, _prev: SystemStatus, _next: SystemStatus, _cycle_id: u64) {}
    fn on_detection(&self, _event: &DetectedEvent, _escalate: bool) {}
    fn on_action(&self, _action: &Action, _trigger: Trigger, _ledger: &LedgerSnapshot) {}
    fn on_failure(&self, _err: &SentinelError, _cycle_id: u64) {}
}

#[derive(Debug, Default)]
pub struct LoggingObserver;

impl CycleObserver for LoggingObserver {
    fn on_status(&self, prev: SystemStatus, next: SystemStatus, cycle_id: u64) {
        logging::log_status(prev, next, cycle_id);
    }

    fn on_detection(&self, event: &DetectedEvent, escalate: bool) {
        logging::log_detection(event, escalate);
    }

    fn on_action(&self, action: &Action, trigger: Trigger, ledger: &LedgerSnapshot) {
        logging::log_action(action, trigger.as_str(), ledger);
        logging::log_ledger(&action.id, ledger);
    }

    fn on_failure(&self, err: &SentinelError, cycle_id: u64) {
        logging::log_failure(err, cycle_id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Status(SystemStatus),
    Detection { event_id: String, escalate: bool },
    Action { symbol: String, trigger: Trigger },
    Failure(SentinelError),
}

/// Keeps every notification in order; used by tests and replay tooling.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Observed> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Status path starting from SCANNING, e.g. `[SCANNING, ANALYZING, SCANNING]`.
    pub fn status_path(&self) -> Vec<SystemStatus> {
        let mut path = vec![SystemStatus::Scanning];
        for e in self.events() {
            if let Observed::Status(s) = e {
                path.push(s);
            }
        }
        path
    }

    pub fn failures(&self) -> Vec<SentinelError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Failure(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    fn push(&self, o: Observed) {
        if let Ok(mut s) = self.seen.lock() {
            s.push(o);
        }
    }
}

impl CycleObserver for RecordingObserver {
    fn on_status(&self, _prev: SystemStatus, next: SystemStatus, _cycle_id: u64) {
        self.push(Observed::Status(next));
    }

    fn on_detection(&self, event: &DetectedEvent, escalate: bool) {
        self.push(Observed::Detection { event_id: event.id.clone(), escalate });
    }

    fn on_action(&self, action: &Action, trigger: Trigger, _ledger: &LedgerSnapshot) {
        self.push(Observed::Action { symbol: action.symbol.clone(), trigger });
    }

    fn on_failure(&self, err: &SentinelError, _cycle_id: u64) {
        self.push(Observed::Failure(err.clone()));
    }
}
