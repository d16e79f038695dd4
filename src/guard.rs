//! Fetch gate and traversal guard
//!
//! Two independent ceilings bound every session: network fetch attempts,
//! and visited nodes plus harvested results. Neither raises an error when
//! reached; the walker stops and keeps what it has. They are the only
//! cycle protection the walker has.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counts network fetch attempts against a ceiling
#[derive(Debug)]
pub struct FetchGate {
    enabled: bool,
    limit: usize,
    attempts: AtomicUsize,
    exhausted: AtomicBool,
}

impl FetchGate {
    /// `enabled = false` refuses every fetch
    pub fn new(enabled: bool, limit: usize) -> Self {
        Self {
            enabled,
            limit,
            attempts: AtomicUsize::new(0),
            exhausted: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_fetch(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    /// Check and record in one step, so concurrent callers cannot
    /// overshoot the ceiling
    pub fn try_acquire(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let acquired = self
            .attempts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok();
        if !acquired && !self.exhausted.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                limit = self.limit,
                "Fetch ceiling reached; further references are skipped"
            );
        }
        acquired
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn limit_reached(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

/// Counts visited nodes and accumulated results against a ceiling
#[derive(Debug)]
pub struct TraversalGuard {
    limit: usize,
    visits: AtomicUsize,
    exhausted: AtomicBool,
}

impl TraversalGuard {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            visits: AtomicUsize::new(0),
            exhausted: AtomicBool::new(false),
        }
    }

    pub fn should_continue(&self) -> bool {
        if self.visits.load(Ordering::SeqCst) < self.limit {
            return true;
        }
        if !self.exhausted.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                limit = self.limit,
                "Visit ceiling reached; returning partial results"
            );
        }
        false
    }

    /// Visits left before the ceiling
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.visits.load(Ordering::SeqCst))
    }

    pub fn record_visit(&self) {
        self.visits.fetch_add(1, Ordering::SeqCst);
    }

    /// Harvested results count against the same ceiling as visits
    pub fn record_result(&self) {
        self.visits.fetch_add(1, Ordering::SeqCst);
    }

    pub fn visits(&self) -> usize {
        self.visits.load(Ordering::SeqCst)
    }

    pub fn limit_reached(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}
