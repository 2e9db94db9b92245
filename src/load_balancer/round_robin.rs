// src/load_balancer/round_robin.rs
use crate::load_balancer::LoadBalancer;
use crate::proxy::Backend;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Round-robin selection over a registry snapshot.
///
/// One ticket counter is shared across every concurrent caller and advances
/// on failed attempts too, so an unhealthy backend costs its slot in the
/// sweep instead of being re-checked from the same start point. Under
/// concurrent load fairness is approximate: another caller may advance the
/// counter between a caller's attempts.
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    fn with_counter(start: usize) -> Self {
        Self {
            counter: AtomicUsize::new(start),
        }
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoadBalancer for RoundRobinBalancer {
    async fn select_backend(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        // Pre-increment, then index: with the counter at 0 the first ticket
        // inspects index 1 mod len.
        for _ in 0..backends.len() {
            let ticket = self.counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
            let candidate = &backends[ticket % backends.len()];
            if candidate.is_healthy() {
                return Some(candidate.clone());
            }
        }

        None
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
