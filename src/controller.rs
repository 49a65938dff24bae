//! Detection-to-execution state machine.
//!
//! ```text
//!   tick (p) ──► ANALYZING ──Ta──► detect ──conf > C──► EXECUTING ──Te──► act
//!      ▲                              │                                   │
//!      └──────────── SCANNING ◄───────┴───────────────────────────────────┘
//! ```
//!
//! Each cycle is one spawned task. Resumptions after `Ta` and `Te` run inside
//! the clock's liveness gate, so teardown stops them from touching state.
//! A tick while a cycle is in flight only bumps `busy_ticks`. A source call
//! that outlives `source_timeout` fails the cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use serde_json::json;
use tokio::time::{sleep, timeout};

use crate::clock::Liveness;
use crate::config::SentinelConfig;
use crate::error::SentinelError;
use crate::executor::ActionExecutor;
use crate::logging::{log, obj, Domain, Level};
use crate::model::{DetectedEvent, SystemStatus};
use crate::observer::{CycleObserver, Trigger};
use crate::source::{seeded_rng, SignalSource};
use crate::state::{lock, SharedState};

#[derive(Debug, Clone, Copy)]
pub struct CycleParams {
    pub trigger_probability: f64,
    pub analysis_latency: Duration,
    pub execution_latency: Duration,
    pub source_timeout: Duration,
    pub auto_trigger_confidence: f64,
}

impl From<&SentinelConfig> for CycleParams {
    fn from(cfg: &SentinelConfig) -> Self {
        Self {
            trigger_probability: cfg.trigger_probability,
            analysis_latency: cfg.analysis_latency,
            execution_latency: cfg.execution_latency,
            source_timeout: cfg.source_timeout,
            auto_trigger_confidence: cfg.auto_trigger_confidence,
        }
    }
}

#[derive(Clone)]
pub struct CycleController {
    inner: Arc<Inner>,
}

struct Inner {
    params: CycleParams,
    state: Arc<SharedState>,
    source: Arc<dyn SignalSource>,
    executor: ActionExecutor,
    observer: Arc<dyn CycleObserver>,
    liveness: Liveness,
    rng: Mutex<StdRng>,
    cycle_seq: AtomicU64,
}

impl CycleController {
    pub fn new(
        params: CycleParams,
        state: Arc<SharedState>,
        source: Arc<dyn SignalSource>,
        executor: ActionExecutor,
        observer: Arc<dyn CycleObserver>,
        liveness: Liveness,
        seed: Option<u64>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                params,
                state,
                source,
                executor,
                observer,
                liveness,
                rng: Mutex::new(seeded_rng(seed)),
                cycle_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn status(&self) -> SystemStatus {
        self.inner.state.status()
    }

    /// Tick entry for callers outside the clock. Returns the started cycle id.
    pub fn on_tick(&self) -> Option<u64> {
        self.inner.liveness.run(|| self.handle_tick()).flatten()
    }

    /// Start a cycle now, skipping the trigger roll. Still refuses to overlap.
    pub fn force_cycle(&self) -> Option<u64> {
        self.inner.liveness.run(|| self.inner.start_cycle()).flatten()
    }

    /// Tick body. The caller must already hold the liveness gate; the clock
    /// invokes this from inside [`Liveness::run`].
    pub(crate) fn handle_tick(&self) -> Option<u64> {
        let inner = &self.inner;
        inner.state.update_stats(|s| s.ticks += 1);

        let status = inner.state.status();
        if !status.is_idle() {
            inner.state.update_stats(|s| s.busy_ticks += 1);
            log(
                Level::Trace,
                Domain::Cycle,
                "busy_tick",
                obj(&[("status", json!(status.as_str()))]),
            );
            return None;
        }

        let roll: f64 = lock(&inner.rng).gen();
        if roll >= inner.params.trigger_probability {
            return None;
        }
        inner.start_cycle()
    }
}

impl Inner {
    fn start_cycle(self: &Arc<Self>) -> Option<u64> {
        if !self.state.try_begin_cycle() {
            self.state.update_stats(|s| s.busy_ticks += 1);
            return None;
        }
        let cycle_id = self.cycle_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.update_stats(|s| s.cycles_started += 1);
        self.observer.on_status(SystemStatus::Scanning, SystemStatus::Analyzing, cycle_id);

        let inner = self.clone();
        tokio::spawn(async move {
            let worker = tokio::spawn(inner.clone().run_cycle(cycle_id));
            if let Err(err) = worker.await {
                if err.is_panic() {
                    let failure = SentinelError::SourceFailure(format!("cycle {} panicked", cycle_id));
                    inner.liveness.run(|| inner.fail(cycle_id, failure));
                }
            }
        });
        Some(cycle_id)
    }

    async fn run_cycle(self: Arc<Self>, cycle_id: u64) {
        sleep(self.params.analysis_latency).await;
        if !self.liveness.is_alive() {
            return;
        }

        let candidate = match timeout(self.params.source_timeout, self.source.next_candidate()).await {
            Ok(result) => result,
            Err(_) => Err(SentinelError::SourceFailure(format!(
                "source {} timed out after {}ms",
                self.source.id(),
                self.params.source_timeout.as_millis()
            ))),
        };
        let escalated = match self.liveness.run(|| self.on_detected(cycle_id, candidate)) {
            Some(Some(event)) => event,
            _ => return,
        };

        sleep(self.params.execution_latency).await;
        self.liveness.run(|| self.on_execute(cycle_id, &escalated));
    }

    /// Append, then gate. Returns the candidate when it escalates.
    fn on_detected(
        &self,
        cycle_id: u64,
        candidate: Result<DetectedEvent, SentinelError>,
    ) -> Option<DetectedEvent> {
        let event = match candidate {
            Ok(event) => event,
            Err(err) => {
                self.fail(cycle_id, err);
                return None;
            }
        };

        self.state.push_detection(event.clone());
        let escalate = event.confidence > self.params.auto_trigger_confidence;
        self.state.update_stats(|s| {
            s.detections += 1;
            if escalate {
                s.escalations += 1;
            }
        });
        self.observer.on_detection(&event, escalate);

        if escalate {
            self.transition(SystemStatus::Executing, cycle_id);
            Some(event)
        } else {
            self.transition(SystemStatus::Scanning, cycle_id);
            None
        }
    }

    fn on_execute(&self, cycle_id: u64, event: &DetectedEvent) {
        match self.executor.execute(&event.symbol, Trigger::Auto) {
            Ok(_) => self.transition(SystemStatus::Scanning, cycle_id),
            Err(err) => self.fail(cycle_id, err),
        }
    }

    fn transition(&self, next: SystemStatus, cycle_id: u64) {
        let prev = self.state.set_status(next);
        self.observer.on_status(prev, next, cycle_id);
    }

    /// Back to SCANNING; buffers and ledger are left as they were.
    fn fail(&self, cycle_id: u64, err: SentinelError) {
        self.state.update_stats(|s| s.failures += 1);
        self.transition(SystemStatus::Scanning, cycle_id);
        self.observer.on_failure(&err, cycle_id);
    }
}
