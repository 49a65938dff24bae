//! Top-level wiring: clock, controller, executor, watch list and the
//! read-only dashboard view handed to the presentation layer.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;

use crate::clock::Clock;
use crate::config::SentinelConfig;
use crate::controller::{CycleController, CycleParams};
use crate::error::{SentinelError, SentinelResult};
use crate::executor::{ActionExecutor, ActionSynthesizer, RandomActionSynth};
use crate::ledger::LedgerSnapshot;
use crate::logging::{log, obj, state_digest, v_num, v_str, Domain, Level};
use crate::model::{Action, DetectedEvent, Position, SystemStatus, WatchedSource};
use crate::observer::{CycleObserver, LoggingObserver, Trigger};
use crate::source::{RandomSignalSource, SignalSource};
use crate::state::{lock, CycleStats, SharedState};
use crate::watchlist::WatchList;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub status: SystemStatus,
    pub processing: bool,
    pub detections: Vec<DetectedEvent>,
    pub actions: Vec<Action>,
    pub ledger: LedgerSnapshot,
    pub stats: CycleStats,
    pub positions: Vec<Position>,
    pub watchlist: Vec<WatchedSource>,
}

impl DashboardSnapshot {
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        state_digest(&bytes)
    }
}

/// Collaborators injected into a [`Sentinel`].
pub struct Wiring {
    pub source: Arc<dyn SignalSource>,
    pub synth: Arc<dyn ActionSynthesizer>,
    pub observer: Arc<dyn CycleObserver>,
    pub watchlist: Arc<Mutex<WatchList>>,
}

impl Wiring {
    /// Random source and synthesizer over the default watch list, logging observer.
    pub fn random(seed: Option<u64>) -> Self {
        let watchlist = Arc::new(Mutex::new(WatchList::with_defaults()));
        Self {
            source: Arc::new(RandomSignalSource::new(watchlist.clone(), seed)),
            synth: Arc::new(RandomActionSynth::new(seed.map(|s| s.wrapping_add(1)))),
            observer: Arc::new(LoggingObserver),
            watchlist,
        }
    }
}

pub struct Sentinel {
    clock: Clock,
    controller: CycleController,
    executor: ActionExecutor,
    state: Arc<SharedState>,
    watchlist: Arc<Mutex<WatchList>>,
}

impl Sentinel {
    /// Validates `cfg`; every configuration error surfaces here.
    pub fn new(cfg: SentinelConfig, wiring: Wiring) -> SentinelResult<Self> {
        let cfg = cfg.validate()?;
        let clock = Clock::new(cfg.tick_interval)?;
        let state = Arc::new(SharedState::new(&cfg)?);
        let executor = ActionExecutor::new(wiring.synth, state.clone(), wiring.observer.clone());
        let controller = CycleController::new(
            CycleParams::from(&cfg),
            state.clone(),
            wiring.source,
            executor.clone(),
            wiring.observer,
            clock.token(),
            cfg.seed,
        );
        Ok(Self { clock, controller, executor, state, watchlist: wiring.watchlist })
    }

    pub fn random(cfg: SentinelConfig) -> SentinelResult<Self> {
        let seed = cfg.seed;
        Self::new(cfg, Wiring::random(seed))
    }

    pub fn start(&self) -> SentinelResult<()> {
        let controller = self.controller.clone();
        self.clock.start(move || {
            controller.handle_tick();
        })?;
        log(
            Level::Info,
            Domain::System,
            "sentinel_start",
            obj(&[("period_ms", json!(self.clock.period().as_millis() as u64))]),
        );
        Ok(())
    }

    /// Tear down. Pending cycle resumptions are dropped without touching state.
    pub fn stop(&self) {
        self.clock.stop();
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn controller(&self) -> &CycleController {
        &self.controller
    }

    pub fn status(&self) -> SystemStatus {
        self.state.status()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let view = self.state.view();
        DashboardSnapshot {
            processing: view.status == SystemStatus::Analyzing,
            status: view.status,
            detections: view.detections,
            actions: view.actions,
            ledger: view.ledger,
            stats: view.stats,
            positions: self.state.positions(),
            watchlist: lock(&self.watchlist).all().to_vec(),
        }
    }

    /// Manual action on a retained detection, regardless of its confidence.
    ///
    /// Deliberately not serialized against an in-flight auto cycle; the
    /// history and ledger are lock-protected so both paths may interleave.
    pub fn execute_manual_action(&self, event_id: &str) -> SentinelResult<Action> {
        self.clock
            .token()
            .run(|| {
                let event = self
                    .state
                    .find_detection(event_id)
                    .ok_or_else(|| SentinelError::invalid(format!("event {} is not retained", event_id)))?;
                self.executor.execute(&event.symbol, Trigger::Manual)
            })
            .unwrap_or(Err(SentinelError::Stopped))
    }

    pub fn add_watched_source(&self, handle: &str) -> SentinelResult<WatchedSource> {
        let src = lock(&self.watchlist).add(handle)?;
        log(
            Level::Info,
            Domain::Watch,
            "add",
            obj(&[("id", v_str(&src.id)), ("handle", v_str(&src.handle))]),
        );
        Ok(src)
    }

    pub fn toggle_watched_source(&self, id: &str) -> SentinelResult<bool> {
        let active = lock(&self.watchlist).toggle(id)?;
        log(
            Level::Info,
            Domain::Watch,
            "toggle",
            obj(&[("id", v_str(id)), ("active", json!(active))]),
        );
        Ok(active)
    }

    pub fn remove_watched_source(&self, id: &str) -> SentinelResult<WatchedSource> {
        let src = lock(&self.watchlist).remove(id)?;
        log(
            Level::Info,
            Domain::Watch,
            "remove",
            obj(&[("id", v_str(id)), ("handle", v_str(&src.handle))]),
        );
        Ok(src)
    }

    pub fn update_positions(&self, rows: Vec<Position>) {
        self.state.replace_positions(rows);
    }

    pub fn log_session_summary(&self) {
        let snap = self.snapshot();
        log(
            Level::Info,
            Domain::System,
            "session_summary",
            obj(&[
                ("status", v_str(snap.status.as_str())),
                ("cumulative", v_num(snap.ledger.cumulative_performance)),
                ("actions", json!(snap.ledger.action_count)),
                ("win_rate", snap.ledger.win_rate().map(v_num).unwrap_or(serde_json::Value::Null)),
                ("ticks", json!(snap.stats.ticks)),
                ("busy_ticks", json!(snap.stats.busy_ticks)),
                ("cycles", json!(snap.stats.cycles_started)),
                ("escalations", json!(snap.stats.escalations)),
                ("failures", json!(snap.stats.failures)),
                ("unrealized_pnl", v_num(self.state.unrealized_total())),
                ("detections_retained", json!(snap.detections.len())),
                ("actions_retained", json!(snap.actions.len())),
                ("state_hash", v_str(&snap.digest())),
            ]),
        );
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.clock.stop();
    }
}
