//! Records produced by the monitoring loop.
//!
//! Everything here is immutable once built; constructors clamp or reject
//! out-of-range values so the invariants hold for every instance.

use serde::{Deserialize, Serialize};

use crate::error::{SentinelError, SentinelResult};

pub type Timestamp = u64;

pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    Scanning,
    Analyzing,
    Executing,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::Scanning => "SCANNING",
            SystemStatus::Analyzing => "ANALYZING",
            SystemStatus::Executing => "EXECUTING",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SystemStatus::Scanning)
    }
}

fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

/// A scored candidate produced by a signal source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEvent {
    pub id: String,
    pub symbol: String,
    pub source_ref: String,
    pub ts: Timestamp,
    pub narrative: String,
    pub confidence: f64,
    pub virality: f64,
    pub trend_strength: f64,
    pub mention_count: u64,
}

impl DetectedEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        symbol: String,
        source_ref: String,
        ts: Timestamp,
        narrative: String,
        confidence: f64,
        virality: f64,
        trend_strength: f64,
        mention_count: u64,
    ) -> Self {
        Self {
            id,
            symbol,
            source_ref,
            ts,
            narrative,
            confidence: clamp_score(confidence),
            virality: clamp_score(virality),
            trend_strength: clamp_score(trend_strength),
            mention_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Executed,
    Pending,
    Cancelled,
}

/// An executed (simulated) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub price: f64,
    pub ts: Timestamp,
    pub status: ActionStatus,
    /// Absent deltas are excluded from ledger aggregation.
    pub performance_delta: Option<f64>,
}

impl Action {
    pub fn executed(
        id: String,
        symbol: String,
        side: Side,
        quantity: u32,
        price: f64,
        ts: Timestamp,
        performance_delta: Option<f64>,
    ) -> SentinelResult<Self> {
        if quantity == 0 {
            return Err(SentinelError::ExecutionFailure("quantity must be positive".into()));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(SentinelError::ExecutionFailure(format!("invalid price {}", price)));
        }
        if performance_delta.is_some_and(|d| !d.is_finite()) {
            return Err(SentinelError::ExecutionFailure("non-finite performance delta".into()));
        }
        Ok(Self {
            id,
            symbol,
            side,
            quantity,
            price,
            ts,
            status: ActionStatus::Executed,
            performance_delta,
        })
    }

    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// Portfolio snapshot row supplied by the position feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
}

impl Position {
    pub fn new(symbol: &str, quantity: f64, avg_entry_price: f64, current_price: f64) -> Self {
        let unrealized_pnl = (current_price - avg_entry_price) * quantity;
        let unrealized_pnl_pct = if avg_entry_price > 0.0 {
            (current_price / avg_entry_price - 1.0) * 100.0
        } else {
            0.0
        };
        Self {
            symbol: symbol.to_string(),
            quantity,
            avg_entry_price,
            current_price,
            unrealized_pnl,
            unrealized_pnl_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedSource {
    pub id: String,
    pub handle: String,
    pub glyph: String,
    pub follower_count: u64,
    pub active: bool,
}
