use rand::Rng;

use crate::error::{SentinelError, SentinelResult};
use crate::model::WatchedSource;

const GLYPHS: &[&str] = &["🎯", "💰", "📊", "🔥", "⚡"];

/// Monitored accounts that detected events are attributed to.
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    sources: Vec<WatchedSource>,
    next_id: u64,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let seed = [
            ("@elikiratuba", "🦈", 2_100_000, true),
            ("@CryptoWhale", "🐋", 890_000, true),
            ("@WallStBets", "🚀", 1_500_000, true),
            ("@TraderMike", "📈", 450_000, false),
            ("@FinanceGuru", "💎", 780_000, true),
        ];
        let mut list = Self::new();
        for (handle, glyph, followers, active) in seed {
            list.insert(handle.to_string(), glyph.to_string(), followers, active);
        }
        list
    }

    fn insert(&mut self, handle: String, glyph: String, follower_count: u64, active: bool) -> &WatchedSource {
        self.next_id += 1;
        self.sources.push(WatchedSource {
            id: format!("w{}", self.next_id),
            handle,
            glyph,
            follower_count,
            active,
        });
        &self.sources[self.sources.len() - 1]
    }

    pub fn add(&mut self, handle: &str) -> SentinelResult<WatchedSource> {
        let trimmed = handle.trim();
        if trimmed.is_empty() || trimmed == "@" {
            return Err(SentinelError::invalid("handle must not be empty"));
        }
        let handle = if trimmed.starts_with('@') {
            trimmed.to_string()
        } else {
            format!("@{}", trimmed)
        };
        let mut rng = rand::thread_rng();
        let glyph = GLYPHS[rng.gen_range(0..GLYPHS.len())].to_string();
        let followers = rng.gen_range(100..1000) * 1000;
        Ok(self.insert(handle, glyph, followers, true).clone())
    }

    pub fn toggle(&mut self, id: &str) -> SentinelResult<bool> {
        let src = self
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SentinelError::invalid(format!("unknown source id {}", id)))?;
        src.active = !src.active;
        Ok(src.active)
    }

    pub fn remove(&mut self, id: &str) -> SentinelResult<WatchedSource> {
        let idx = self
            .sources
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SentinelError::invalid(format!("unknown source id {}", id)))?;
        Ok(self.sources.remove(idx))
    }

    pub fn active(&self) -> impl Iterator<Item = &WatchedSource> {
        self.sources.iter().filter(|s| s.active)
    }

    pub fn all(&self) -> &[WatchedSource] {
        &self.sources
    }
}
