//! Shared mutable state of the monitoring loop.
//!
//! Lock order is status -> detections -> actions -> ledger. Nothing here is
//! held across an await point.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::config::SentinelConfig;
use crate::error::SentinelResult;
use crate::history::HistoryBuffer;
use crate::ledger::{Ledger, LedgerSnapshot};
use crate::model::{Action, DetectedEvent, Position, SystemStatus};

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub ticks: u64,
    /// Ticks that arrived while a cycle was in flight.
    pub busy_ticks: u64,
    pub cycles_started: u64,
    pub detections: u64,
    pub escalations: u64,
    pub failures: u64,
}

/// Latest portfolio rows handed over by the position feed.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    rows: Vec<Position>,
}

impl PositionBook {
    pub fn new(rows: Vec<Position>) -> Self {
        Self { rows }
    }

    pub fn seeded() -> Self {
        Self::new(vec![
            Position::new("$NVDA", 150.0, 875.32, 912.45),
            Position::new("$TSLA", 80.0, 245.00, 238.90),
            Position::new("$AMD", 200.0, 156.78, 168.92),
            Position::new("$META", 45.0, 485.20, 512.30),
        ])
    }

    pub fn replace_all(&mut self, rows: Vec<Position>) {
        self.rows = rows;
    }

    pub fn rows(&self) -> &[Position] {
        &self.rows
    }

    pub fn unrealized_total(&self) -> f64 {
        self.rows.iter().map(|p| p.unrealized_pnl).sum()
    }
}

#[derive(Debug)]
pub struct SharedState {
    status: Mutex<SystemStatus>,
    detections: Mutex<HistoryBuffer<DetectedEvent>>,
    actions: Mutex<HistoryBuffer<Action>>,
    ledger: Ledger,
    stats: Mutex<CycleStats>,
    positions: Mutex<PositionBook>,
}

impl SharedState {
    pub fn new(cfg: &SentinelConfig) -> SentinelResult<Self> {
        Ok(Self {
            status: Mutex::new(SystemStatus::Scanning),
            detections: Mutex::new(HistoryBuffer::new(cfg.detection_capacity)?),
            actions: Mutex::new(HistoryBuffer::new(cfg.action_capacity)?),
            ledger: Ledger::with_opening(cfg.opening_performance, cfg.opening_action_count),
            stats: Mutex::new(CycleStats::default()),
            positions: Mutex::new(PositionBook::seeded()),
        })
    }

    pub fn status(&self) -> SystemStatus {
        *lock(&self.status)
    }

    /// SCANNING -> ANALYZING if idle. The single-cycle guard.
    pub(crate) fn try_begin_cycle(&self) -> bool {
        let mut status = lock(&self.status);
        if status.is_idle() {
            *status = SystemStatus::Analyzing;
            true
        } else {
            false
        }
    }

    /// Returns the previous status.
    pub(crate) fn set_status(&self, next: SystemStatus) -> SystemStatus {
        std::mem::replace(&mut *lock(&self.status), next)
    }

    pub(crate) fn push_detection(&self, event: DetectedEvent) -> Option<DetectedEvent> {
        lock(&self.detections).push(event)
    }

    pub fn find_detection(&self, event_id: &str) -> Option<DetectedEvent> {
        lock(&self.detections).find(|e| e.id == event_id).cloned()
    }

    /// Append to the action history and fold into the ledger as one step.
    pub(crate) fn commit_action(&self, action: Action) -> LedgerSnapshot {
        let mut actions = lock(&self.actions);
        let snap = self.ledger.record(&action);
        actions.push(action);
        snap
    }

    pub(crate) fn update_stats(&self, f: impl FnOnce(&mut CycleStats)) {
        f(&mut *lock(&self.stats));
    }

    pub fn stats(&self) -> CycleStats {
        *lock(&self.stats)
    }

    pub fn ledger(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn detections(&self) -> Vec<DetectedEvent> {
        lock(&self.detections).to_vec()
    }

    pub fn actions(&self) -> Vec<Action> {
        lock(&self.actions).to_vec()
    }

    pub fn replace_positions(&self, rows: Vec<Position>) {
        lock(&self.positions).replace_all(rows);
    }

    pub fn positions(&self) -> Vec<Position> {
        lock(&self.positions).rows().to_vec()
    }

    pub fn unrealized_total(&self) -> f64 {
        lock(&self.positions).unrealized_total()
    }

    /// Consistent view of status, both histories and the ledger.
    pub fn view(&self) -> StateView {
        let status = lock(&self.status);
        let detections = lock(&self.detections);
        let actions = lock(&self.actions);
        StateView {
            status: *status,
            detections: detections.to_vec(),
            actions: actions.to_vec(),
            ledger: self.ledger.snapshot(),
            stats: self.stats(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    pub status: SystemStatus,
    pub detections: Vec<DetectedEvent>,
    pub actions: Vec<Action>,
    pub ledger: LedgerSnapshot,
    pub stats: CycleStats,
}
