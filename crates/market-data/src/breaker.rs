use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Latching availability flag for the upstream provider.
///
/// Once tripped it stays open until `reset` is called; there is no automatic
/// half-open probing. Clones share state.
#[derive(Clone, Default)]
pub struct CircuitBreaker {
    open: Arc<AtomicBool>,
    trips: Arc<AtomicU64>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while calls must skip the network.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn trip(&self, reason: &str) {
        if !self.open.swap(true, Ordering::AcqRel) {
            let n = self.trips.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                "Circuit breaker OPEN: market data provider marked unavailable ({}); trip #{}",
                reason,
                n
            );
        }
    }

    pub fn reset(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::info!("Circuit breaker reset: market data provider re-enabled");
        }
    }

    pub fn trip_count(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_latches_until_reset() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_open());

        breaker.trip("timeout");
        assert!(breaker.is_open());
        breaker.trip("timeout again");
        assert_eq!(breaker.trip_count(), 1);

        breaker.reset();
        assert!(!breaker.is_open());
        breaker.trip("later");
        assert_eq!(breaker.trip_count(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let breaker = CircuitBreaker::new();
        let view = breaker.clone();
        breaker.trip("x");
        assert!(view.is_open());
        view.reset();
        assert!(!breaker.is_open());
    }
}
