//! Repeating tick source with race-free teardown.
//!
//! The clock owns a [`Liveness`] token. Every tick callback, and every delayed
//! resumption scheduled elsewhere with a clone of the token, runs inside
//! [`Liveness::run`]. `stop()` clears the token under the same gate, so once it
//! returns no callback is running and none will start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::{SentinelError, SentinelResult};
use crate::logging::{log, obj, Domain, Level};

#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
    gate: Arc<Mutex<()>>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self { alive: Arc::new(AtomicBool::new(true)), gate: Arc::new(Mutex::new(())) }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Run `f` only while alive. Not reentrant: `f` must not call `run` or `kill`.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _gate = match self.gate.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !self.alive.load(Ordering::SeqCst) {
            return None;
        }
        Some(f())
    }

    /// Clear the token. Waits for any in-flight `run` to finish. Returns whether
    /// this call did the clearing.
    pub fn kill(&self) -> bool {
        let _gate = match self.gate.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.alive.swap(false, Ordering::SeqCst)
    }
}

pub struct Clock {
    period: Duration,
    liveness: Liveness,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Clock {
    pub fn new(period: Duration) -> SentinelResult<Self> {
        if period.is_zero() {
            return Err(SentinelError::config("clock interval must be positive"));
        }
        Ok(Self {
            period,
            liveness: Liveness::new(),
            task: Mutex::new(None),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Token shared with anything that resumes after a delay.
    pub fn token(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn is_running(&self) -> bool {
        self.liveness.is_alive() && self.task.lock().map(|t| t.is_some()).unwrap_or(false)
    }

    /// Begin ticking. The first tick fires one period after the call.
    /// A stopped clock cannot be restarted.
    pub fn start<F>(&self, handler: F) -> SentinelResult<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if !self.liveness.is_alive() {
            return Err(SentinelError::Stopped);
        }
        let mut slot = self
            .task
            .lock()
            .map_err(|_| SentinelError::invalid("clock state poisoned"))?;
        if slot.is_some() {
            return Err(SentinelError::invalid("clock already running"));
        }

        let liveness = self.liveness.clone();
        let period = self.period;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if liveness.run(&handler).is_none() {
                    break;
                }
            }
        }));

        log(
            Level::Info,
            Domain::Clock,
            "start",
            obj(&[("period_ms", json!(period.as_millis() as u64))]),
        );
        Ok(())
    }

    /// Idempotent. No tick handler runs after this returns.
    pub fn stop(&self) {
        let cleared = self.liveness.kill();
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            task.abort();
        }
        if cleared {
            log(
                Level::Info,
                Domain::Clock,
                "stop",
                obj(&[("period_ms", json!(self.period.as_millis() as u64))]),
            );
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.liveness.kill();
        if let Ok(mut t) = self.task.lock() {
            if let Some(task) = t.take() {
                task.abort();
            }
        }
    }
}
