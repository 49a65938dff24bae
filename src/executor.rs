use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{SentinelError, SentinelResult};
use crate::model::{now_ms, Action, Side};
use crate::observer::{CycleObserver, Trigger};
use crate::source::{seeded_rng, short_id};
use crate::state::SharedState;

/// Turns a symbol into a concrete action record.
pub trait ActionSynthesizer: Send + Sync {
    fn synthesize(&self, symbol: &str) -> SentinelResult<Action>;
}

/// Paper fills: 70% buys, 10..110 units at 50..550, delta skewed positive.
pub struct RandomActionSynth {
    rng: Mutex<StdRng>,
}

impl RandomActionSynth {
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: Mutex::new(seeded_rng(seed)) }
    }
}

impl ActionSynthesizer for RandomActionSynth {
    fn synthesize(&self, symbol: &str) -> SentinelResult<Action> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SentinelError::ExecutionFailure("rng lock poisoned".into()))?;
        let side = if rng.gen::<f64>() > 0.3 { Side::Buy } else { Side::Sell };
        let quantity = rng.gen_range(10..110);
        let price = rng.gen_range(50.0..550.0);
        let delta = (rng.gen::<f64>() - 0.4) * 1000.0;
        Action::executed(short_id(&mut *rng), symbol.to_string(), side, quantity, price, now_ms(), Some(delta))
    }
}

/// Deterministic synthesizer for tests; optionally always fails.
#[derive(Debug, Clone)]
pub struct FixedActionSynth {
    pub side: Side,
    pub quantity: u32,
    pub price: f64,
    pub delta: Option<f64>,
    pub fail: bool,
}

impl FixedActionSynth {
    pub fn new(side: Side, quantity: u32, price: f64, delta: Option<f64>) -> Self {
        Self { side, quantity, price, delta, fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new(Side::Buy, 1, 1.0, None) }
    }
}

impl ActionSynthesizer for FixedActionSynth {
    fn synthesize(&self, symbol: &str) -> SentinelResult<Action> {
        if self.fail {
            return Err(SentinelError::ExecutionFailure(format!("venue rejected {}", symbol)));
        }
        Action::executed(
            format!("fixed-{}", now_ms()),
            symbol.to_string(),
            self.side,
            self.quantity,
            self.price,
            now_ms(),
            self.delta,
        )
    }
}

/// Shared by the auto path (controller, after the confidence gate) and the
/// manual path (presentation boundary, no gate). Bookkeeping is identical.
#[derive(Clone)]
pub struct ActionExecutor {
    synth: Arc<dyn ActionSynthesizer>,
    state: Arc<SharedState>,
    observer: Arc<dyn CycleObserver>,
}

impl ActionExecutor {
    pub fn new(synth: Arc<dyn ActionSynthesizer>, state: Arc<SharedState>, observer: Arc<dyn CycleObserver>) -> Self {
        Self { synth, state, observer }
    }

    /// Synthesize, append to the action history, fold into the ledger.
    /// A failed synthesis leaves history and ledger untouched.
    pub fn execute(&self, symbol: &str, trigger: Trigger) -> SentinelResult<Action> {
        if symbol.trim().is_empty() {
            return Err(SentinelError::invalid("symbol must not be empty"));
        }
        let action = self.synth.synthesize(symbol)?;
        let ledger = self.state.commit_action(action.clone());
        self.observer.on_action(&action, trigger, &ledger);
        Ok(action)
    }
}
