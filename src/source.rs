//! Signal sources feeding the detection cycle.
//!
//! The controller only sees the [`SignalSource`] trait. [`RandomSignalSource`]
//! synthesizes plausible candidates for demos; [`ScriptedSignalSource`] replays
//! a fixed sequence and is what the scenario tests drive.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{SentinelError, SentinelResult};
use crate::model::{now_ms, DetectedEvent};
use crate::watchlist::WatchList;

pub const SYMBOLS: &[&str] = &[
    "$NVDA", "$TSLA", "$AAPL", "$AMD", "$META", "$GOOGL", "$MSFT", "$AMZN", "$COIN", "$GME",
];

const NARRATIVES: &[&str] = &[
    "Just loaded up on more shares. This is going to the moon! 🚀",
    "Technical analysis showing strong breakout pattern forming.",
    "Insider info: Big announcement coming next week.",
    "This dip is a gift. Loading the boat.",
    "Chart looking absolutely bullish. Entry point right here.",
];

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub(crate) fn short_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..9)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

#[async_trait]
pub trait SignalSource: Send + Sync {
    fn id(&self) -> &'static str;
    async fn next_candidate(&self) -> SentinelResult<DetectedEvent>;
}

/// Uniform-random candidates attributed to the active watch list.
pub struct RandomSignalSource {
    rng: Mutex<StdRng>,
    watchlist: Arc<Mutex<WatchList>>,
}

impl RandomSignalSource {
    pub fn new(watchlist: Arc<Mutex<WatchList>>, seed: Option<u64>) -> Self {
        Self { rng: Mutex::new(seeded_rng(seed)), watchlist }
    }

    fn pick_source(&self, rng: &mut StdRng) -> String {
        let Ok(list) = self.watchlist.lock() else {
            return "@unknown".to_string();
        };
        let active: Vec<&str> = list.active().map(|s| s.handle.as_str()).collect();
        if active.is_empty() {
            "@unknown".to_string()
        } else {
            active[rng.gen_range(0..active.len())].to_string()
        }
    }

    fn synthesize(&self) -> SentinelResult<DetectedEvent> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SentinelError::SourceFailure("rng lock poisoned".into()))?;
        let source_ref = self.pick_source(&mut rng);
        Ok(DetectedEvent::new(
            short_id(&mut *rng),
            SYMBOLS[rng.gen_range(0..SYMBOLS.len())].to_string(),
            source_ref,
            now_ms(),
            NARRATIVES[rng.gen_range(0..NARRATIVES.len())].to_string(),
            rng.gen_range(60..100) as f64,
            rng.gen_range(0..100) as f64,
            rng.gen_range(0..100) as f64,
            rng.gen_range(1_000..51_000),
        ))
    }
}

#[async_trait]
impl SignalSource for RandomSignalSource {
    fn id(&self) -> &'static str {
        "random"
    }

    async fn next_candidate(&self) -> SentinelResult<DetectedEvent> {
        self.synthesize()
    }
}

/// Replays queued results in order; fails once the script runs dry.
#[derive(Default)]
pub struct ScriptedSignalSource {
    script: Mutex<VecDeque<SentinelResult<DetectedEvent>>>,
    seq: Mutex<u64>,
}

impl ScriptedSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// One candidate per confidence value, all on `symbol`.
    pub fn with_confidences(symbol: &str, confidences: &[f64]) -> Self {
        let src = Self::new();
        for &c in confidences {
            src.push_confidence(symbol, c);
        }
        src
    }

    pub fn push_event(&self, event: DetectedEvent) {
        if let Ok(mut q) = self.script.lock() {
            q.push_back(Ok(event));
        }
    }

    pub fn push_confidence(&self, symbol: &str, confidence: f64) {
        let n = match self.seq.lock() {
            Ok(mut seq) => {
                *seq += 1;
                *seq
            }
            Err(_) => 0,
        };
        self.push_event(DetectedEvent::new(
            format!("evt-{}", n),
            symbol.to_string(),
            "@scripted".to_string(),
            n,
            "scripted candidate".to_string(),
            confidence,
            50.0,
            50.0,
            1_000,
        ));
    }

    pub fn push_failure(&self, msg: &str) {
        if let Ok(mut q) = self.script.lock() {
            q.push_back(Err(SentinelError::SourceFailure(msg.to_string())));
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SignalSource for ScriptedSignalSource {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn next_candidate(&self) -> SentinelResult<DetectedEvent> {
        let next = self
            .script
            .lock()
            .map_err(|_| SentinelError::SourceFailure("script lock poisoned".into()))?
            .pop_front();
        next.unwrap_or_else(|| Err(SentinelError::SourceFailure("script exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_random_source_ranges() {
        let list = Arc::new(Mutex::new(WatchList::with_defaults()));
        let src = RandomSignalSource::new(list, Some(7));
        for _ in 0..500 {
            let e = src.next_candidate().await.unwrap();
            assert!((60.0..100.0).contains(&e.confidence));
            assert!((0.0..=100.0).contains(&e.virality));
            assert!((0.0..=100.0).contains(&e.trend_strength));
            assert!((1_000..51_000).contains(&e.mention_count));
            assert!(SYMBOLS.contains(&e.symbol.as_str()));
            assert_ne!(e.source_ref, "@TraderMike", "inactive sources never attributed");
            assert_eq!(e.id.len(), 9);
        }
    }

    #[tokio::test]
    async fn test_random_source_without_active_sources() {
        let list = Arc::new(Mutex::new(WatchList::new()));
        let src = RandomSignalSource::new(list, Some(1));
        let e = src.next_candidate().await.unwrap();
        assert_eq!(e.source_ref, "@unknown");
    }

    #[tokio::test]
    async fn test_seeded_sources_repeat() {
        let list = Arc::new(Mutex::new(WatchList::with_defaults()));
        let a = RandomSignalSource::new(list.clone(), Some(42));
        let b = RandomSignalSource::new(list, Some(42));
        let ea = a.next_candidate().await.unwrap();
        let eb = b.next_candidate().await.unwrap();
        assert_eq!(ea.symbol, eb.symbol);
        assert_eq!(ea.confidence, eb.confidence);
    }

    #[tokio::test]
    async fn test_scripted_source_in_order_then_exhausted() {
        let src = ScriptedSignalSource::with_confidences("$AMD", &[90.0, 50.0]);
        src.push_failure("feed down");
        assert_eq!(src.next_candidate().await.unwrap().confidence, 90.0);
        assert_eq!(src.next_candidate().await.unwrap().confidence, 50.0);
        assert!(matches!(src.next_candidate().await, Err(SentinelError::SourceFailure(m)) if m == "feed down"));
        assert!(src.next_candidate().await.is_err());
        assert_eq!(src.remaining(), 0);
    }
}
