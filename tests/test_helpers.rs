// tests/test_helpers.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gruenerator_worker::{BatchProcessor, BatchSettings};

/// Settings with short delays so retry/timeout tests stay fast.
pub fn fast_settings(batch_size: usize, max_concurrent: usize) -> BatchSettings {
    BatchSettings::default()
        .with_batch_size(batch_size)
        .with_max_concurrent(max_concurrent)
        .with_max_retries(0)
        .with_retry_delay(Duration::from_millis(5))
        .with_timeout(Duration::from_millis(500))
}

pub fn processor(settings: BatchSettings) -> BatchProcessor {
    BatchProcessor::new(settings).expect("valid settings")
}

/// Counts processor invocations that are currently unsettled and remembers the peak.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { tracker: self.clone() }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count on drop, including when a timeout drops the future.
pub struct InFlightGuard {
    tracker: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.current.fetch_sub(1, Ordering::SeqCst);
    }
}
