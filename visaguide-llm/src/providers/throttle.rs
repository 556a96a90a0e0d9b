//! Client-side request throttle shared by the provider clients.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, SemaphorePermit};
use visaguide_core::{GuideResult, Provider};

use super::request_failed;

/// Caps concurrent requests at `requests_per_minute` and spaces request
/// starts at least `60s / requests_per_minute` apart (floor 10ms).
#[derive(Debug)]
pub struct RequestThrottle {
    provider: Provider,
    permits: Arc<Semaphore>,
    last_request_ms: AtomicU64,
    min_interval_ms: u64,
    start: Instant,
}

impl RequestThrottle {
    pub fn new(provider: Provider, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self {
            provider,
            permits: Arc::new(Semaphore::new(rpm as usize)),
            last_request_ms: AtomicU64::new(0),
            min_interval_ms: (60_000 / u64::from(rpm)).max(10),
            start: Instant::now(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Wait for a slot. Hold the permit for the duration of the request.
    pub async fn acquire(&self) -> GuideResult<SemaphorePermit<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| request_failed(self.provider, 0, format!("Rate limiter error: {}", e)))?;

        let now_ms = self.start.elapsed().as_millis() as u64;
        let last_ms = self.last_request_ms.load(Ordering::Relaxed);
        let elapsed = now_ms.saturating_sub(last_ms);
        if last_ms != 0 && elapsed < self.min_interval_ms {
            tokio::time::sleep(Duration::from_millis(self.min_interval_ms - elapsed)).await;
        }
        self.last_request_ms
            .store(self.start.elapsed().as_millis().max(1) as u64, Ordering::Relaxed);

        Ok(permit)
    }
}
