//! End-to-end scenarios for the monitoring loop.
//!
//! All timing runs on tokio's paused clock, so every sleep below is virtual
//! and the cycle latencies (Ta = 2000 ms, Te = 1000 ms) are exact.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tapewatch::executor::{FixedActionSynth, RandomActionSynth};
use tapewatch::history::HistoryBuffer;
use tapewatch::ledger::LedgerSnapshot;
use tapewatch::model::{Action, DetectedEvent, Side, SystemStatus};
use tapewatch::observer::{CycleObserver, Observed, RecordingObserver, Trigger};
use tapewatch::source::{RandomSignalSource, ScriptedSignalSource};
use tapewatch::watchlist::WatchList;
use tapewatch::{Sentinel, SentinelConfig, SentinelError, Wiring};
use tokio::time::sleep;

use SystemStatus::{Analyzing, Executing, Scanning};

fn scripted(cfg: SentinelConfig, source: ScriptedSignalSource) -> (Sentinel, Arc<RecordingObserver>, Arc<ScriptedSignalSource>) {
    let observer = Arc::new(RecordingObserver::new());
    let source = Arc::new(source);
    let wiring = Wiring {
        source: source.clone(),
        synth: Arc::new(FixedActionSynth::new(Side::Buy, 10, 120.0, Some(42.0))),
        observer: observer.clone(),
        watchlist: Arc::new(Mutex::new(WatchList::with_defaults())),
    };
    (Sentinel::new(cfg, wiring).unwrap(), observer, source)
}

fn always_trigger() -> SentinelConfig {
    SentinelConfig { trigger_probability: 1.0, ..Default::default() }
}

// ---------------------------------------------------------------------------
// Scenario A: high confidence escalates into an auto action
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn scenario_a_high_confidence_executes() {
    let (s, observer, _) = scripted(always_trigger(), ScriptedSignalSource::with_confidences("$NVDA", &[90.0]));
    let before = s.snapshot();

    assert!(s.controller().force_cycle().is_some());
    sleep(Duration::from_millis(3100)).await;

    let after = s.snapshot();
    assert_eq!(observer.status_path(), vec![Scanning, Analyzing, Executing, Scanning]);
    assert_eq!(after.detections.len(), before.detections.len() + 1);
    assert_eq!(after.actions.len(), before.actions.len() + 1);
    assert_eq!(after.ledger.action_count, before.ledger.action_count + 1);
    assert_eq!(after.ledger.cumulative_performance, 42.0);
    assert_eq!(after.actions[0].symbol, "$NVDA");
    assert!(observer
        .events()
        .contains(&Observed::Action { symbol: "$NVDA".into(), trigger: Trigger::Auto }));
}

// ---------------------------------------------------------------------------
// Scenario B: low confidence is recorded but never acted on
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn scenario_b_low_confidence_skips_execution() {
    let (s, observer, _) = scripted(always_trigger(), ScriptedSignalSource::with_confidences("$TSLA", &[50.0]));

    s.controller().force_cycle();
    sleep(Duration::from_millis(5000)).await;

    let snap = s.snapshot();
    assert_eq!(observer.status_path(), vec![Scanning, Analyzing, Scanning]);
    assert_eq!(snap.detections.len(), 1);
    assert!(snap.actions.is_empty());
    assert_eq!(snap.ledger.action_count, 0);
}

// ---------------------------------------------------------------------------
// Scenario C: the detection history keeps the ten newest
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn scenario_c_detection_history_evicts_oldest() {
    let confidences = vec![10.0; 11];
    let (s, _, _) = scripted(always_trigger(), ScriptedSignalSource::with_confidences("$GME", &confidences));

    for _ in 0..11 {
        assert!(s.controller().force_cycle().is_some());
        sleep(Duration::from_millis(2100)).await;
    }

    let snap = s.snapshot();
    assert_eq!(snap.detections.len(), 10);
    let ids: Vec<&str> = snap.detections.iter().map(|e| e.id.as_str()).collect();
    let expected: Vec<String> = (2..=11).rev().map(|n| format!("evt-{}", n)).collect();
    assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(snap.ledger, LedgerSnapshot::default());
}

// ---------------------------------------------------------------------------
// Scenario D: manual action ignores the confidence gate
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn scenario_d_manual_action_on_low_confidence_event() {
    let (s, observer, _) = scripted(always_trigger(), ScriptedSignalSource::with_confidences("$AMD", &[20.0]));
    s.controller().force_cycle();
    sleep(Duration::from_millis(2100)).await;

    let event_id = s.snapshot().detections[0].id.clone();
    let action = s.execute_manual_action(&event_id).unwrap();

    let snap = s.snapshot();
    assert_eq!(action.symbol, "$AMD");
    assert_eq!(snap.actions.len(), 1);
    assert_eq!(snap.ledger.action_count, 1);
    assert_eq!(snap.ledger.cumulative_performance, 42.0);
    assert!(observer
        .events()
        .contains(&Observed::Action { symbol: "$AMD".into(), trigger: Trigger::Manual }));
}

#[tokio::test(start_paused = true)]
async fn manual_action_during_auto_cycle_is_allowed() {
    let (s, _, _) = scripted(always_trigger(), ScriptedSignalSource::with_confidences("$MSFT", &[10.0, 95.0]));
    s.controller().force_cycle();
    sleep(Duration::from_millis(2100)).await;
    let low_id = s.snapshot().detections[0].id.clone();

    s.controller().force_cycle();
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(s.status(), Executing);

    s.execute_manual_action(&low_id).unwrap();
    sleep(Duration::from_millis(1000)).await;

    let snap = s.snapshot();
    assert_eq!(snap.status, Scanning);
    assert_eq!(snap.actions.len(), 2);
    assert_eq!(snap.ledger.action_count, 2);
    assert_eq!(snap.ledger.cumulative_performance, 84.0);
}

// ---------------------------------------------------------------------------
// Mutual exclusion under a fast clock
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn fast_ticks_never_overlap_cycles() {
    let cfg = SentinelConfig {
        tick_interval: Duration::from_millis(250),
        trigger_probability: 1.0,
        ..Default::default()
    };
    let confidences: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 95.0 } else { 30.0 }).collect();
    let (s, observer, _) = scripted(cfg, ScriptedSignalSource::with_confidences("$AAPL", &confidences));
    s.start().unwrap();
    sleep(Duration::from_millis(30_000)).await;
    s.stop();

    let snap = s.snapshot();
    assert!(snap.stats.busy_ticks > 0);
    assert!(snap.stats.cycles_started > 5);

    // Every ANALYZING must be closed by SCANNING before the next ANALYZING.
    let path = observer.status_path();
    let mut in_flight = false;
    for st in &path[1..] {
        match st {
            Analyzing => {
                assert!(!in_flight, "second cycle started while one was in flight: {:?}", path);
                in_flight = true;
            }
            Scanning => in_flight = false,
            Executing => assert!(in_flight),
        }
    }
    assert_eq!(snap.ledger.action_count as usize, snap.actions.len());
}

// ---------------------------------------------------------------------------
// Cancellation: nothing moves after stop()
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn stop_freezes_state_with_cycle_in_flight() {
    let cfg = SentinelConfig {
        tick_interval: Duration::from_millis(100),
        trigger_probability: 1.0,
        ..Default::default()
    };
    let (s, _, source) = scripted(cfg, ScriptedSignalSource::with_confidences("$COIN", &[99.0, 99.0, 99.0]));
    s.start().unwrap();

    // first tick at 100ms, detection at 2100ms, execution due at 3100ms
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(s.status(), Executing);
    s.stop();
    let frozen = s.snapshot();

    sleep(Duration::from_millis(20_000)).await;
    let later = s.snapshot();
    assert_eq!(later.digest(), frozen.digest());
    assert!(later.actions.is_empty());
    assert_eq!(source.remaining(), 2);
    assert!(!s.is_running());
    assert_eq!(s.start(), Err(SentinelError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn stop_during_analysis_skips_source_call() {
    let cfg = SentinelConfig {
        tick_interval: Duration::from_millis(100),
        trigger_probability: 1.0,
        ..Default::default()
    };
    let (s, _, source) = scripted(cfg, ScriptedSignalSource::with_confidences("$COIN", &[99.0]));
    s.start().unwrap();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(s.status(), Analyzing);
    s.stop();
    sleep(Duration::from_millis(5000)).await;
    assert_eq!(source.remaining(), 1);
    assert!(s.snapshot().detections.is_empty());
}

// ---------------------------------------------------------------------------
// Failures never strand the controller
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn execution_failure_returns_to_scanning() {
    let observer = Arc::new(RecordingObserver::new());
    let wiring = Wiring {
        source: Arc::new(ScriptedSignalSource::with_confidences("$AMZN", &[97.0])),
        synth: Arc::new(FixedActionSynth::failing()),
        observer: observer.clone(),
        watchlist: Arc::new(Mutex::new(WatchList::new())),
    };
    let s = Sentinel::new(always_trigger(), wiring).unwrap();
    s.controller().force_cycle();
    sleep(Duration::from_millis(3100)).await;

    let snap = s.snapshot();
    assert_eq!(snap.status, Scanning);
    assert_eq!(snap.detections.len(), 1);
    assert!(snap.actions.is_empty());
    assert_eq!(snap.ledger.action_count, 0);
    assert_eq!(snap.stats.failures, 1);
    assert_eq!(observer.status_path(), vec![Scanning, Analyzing, Executing, Scanning]);
    assert!(matches!(observer.failures()[0], SentinelError::ExecutionFailure(_)));
}

// ---------------------------------------------------------------------------
// Long randomized run: bounds and ledger consistency
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DeltaSum {
    total: Mutex<f64>,
    count: Mutex<u64>,
}

impl CycleObserver for DeltaSum {
    fn on_action(&self, action: &Action, _trigger: Trigger, _ledger: &LedgerSnapshot) {
        *self.total.lock().unwrap() += action.performance_delta.unwrap_or(0.0);
        *self.count.lock().unwrap() += 1;
    }

    fn on_detection(&self, event: &DetectedEvent, _escalate: bool) {
        assert!((0.0..=100.0).contains(&event.confidence));
        assert!((0.0..=100.0).contains(&event.virality));
        assert!((0.0..=100.0).contains(&event.trend_strength));
    }
}

#[tokio::test(start_paused = true)]
async fn randomized_run_keeps_invariants() {
    let cfg = SentinelConfig {
        tick_interval: Duration::from_millis(100),
        analysis_latency: Duration::from_millis(20),
        execution_latency: Duration::from_millis(10),
        trigger_probability: 0.9,
        seed: Some(2024),
        ..Default::default()
    };
    let watchlist = Arc::new(Mutex::new(WatchList::with_defaults()));
    let sums = Arc::new(DeltaSum::default());
    let wiring = Wiring {
        source: Arc::new(RandomSignalSource::new(watchlist.clone(), Some(7))),
        synth: Arc::new(RandomActionSynth::new(Some(8))),
        observer: sums.clone(),
        watchlist,
    };
    let s = Sentinel::new(cfg, wiring).unwrap();
    s.start().unwrap();

    for _ in 0..60 {
        sleep(Duration::from_millis(1000)).await;
        let snap = s.snapshot();
        assert!(snap.detections.len() <= 10);
        assert!(snap.actions.len() <= 20);
        for a in &snap.actions {
            assert!(a.quantity > 0 && a.price > 0.0);
        }
    }
    s.stop();

    let snap = s.snapshot();
    assert!(snap.ledger.action_count > 20, "expected eviction to have happened");
    assert_eq!(snap.actions.len(), 20);
    assert_eq!(snap.ledger.action_count, *sums.count.lock().unwrap());
    let expected = *sums.total.lock().unwrap();
    assert!((snap.ledger.cumulative_performance - expected).abs() < 1e-6);
}

#[test]
fn history_buffer_is_shared_by_both_histories() {
    let mut events: HistoryBuffer<DetectedEvent> = HistoryBuffer::new(10).unwrap();
    let mut actions: HistoryBuffer<Action> = HistoryBuffer::new(20).unwrap();
    for i in 0..30 {
        events.push(DetectedEvent::new(format!("e{}", i), "$X".into(), "@s".into(), i, String::new(), 1.0, 1.0, 1.0, 0));
        actions.push(Action::executed(format!("a{}", i), "$X".into(), Side::Sell, 1, 1.0, i, None).unwrap());
    }
    assert_eq!(events.len(), 10);
    assert_eq!(actions.len(), 20);
    assert_eq!(events.newest().unwrap().id, "e29");
    assert_eq!(actions.iter().last().unwrap().id, "a10");
}
