use std::collections::VecDeque;

use serde::Serialize;

use crate::error::{SentinelError, SentinelResult};

/// Fixed-capacity history, newest entry first.
///
/// Pushing past capacity silently evicts the oldest entry.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    #[serde(skip)]
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> SentinelResult<Self> {
        if capacity == 0 {
            return Err(SentinelError::config("history capacity must be positive"));
        }
        Ok(Self { items: VecDeque::with_capacity(capacity + 1), capacity })
    }

    /// Prepend `item`, returning the evicted tail entry if the buffer overflowed.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.items.push_front(item);
        if self.items.len() > self.capacity {
            self.items.pop_back()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<&T> {
        self.items.iter().find(|item| pred(*item))
    }
}

impl<T: Clone> HistoryBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
