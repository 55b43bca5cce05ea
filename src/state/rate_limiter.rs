//! Politeness limiter shared by every worker of a board run
//!
//! Each traffic class owns its own serialized section, so a file download
//! waiting out its interval never delays a catalog or thread request.

use crate::config::ScraperConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Class of outbound request, each with its own minimum spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficClass {
    /// Catalog and thread JSON requests
    Metadata,
    /// Image and thumbnail downloads
    File,
}

/// Serialized section guarding the "last call" timestamp of one class
#[derive(Debug)]
struct ClassGate {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl ClassGate {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }
}

/// Enforces a minimum gap between consecutive calls of the same traffic class
///
/// Also accounts for the time it made callers wait: `sleep_time` is the
/// self-inflicted sleep only, `wait_time_with_lock` additionally includes the
/// time spent queueing for a class's critical section.
#[derive(Debug)]
pub struct RateLimiter {
    metadata: ClassGate,
    file: ClassGate,
    sleep_nanos: AtomicU64,
    wait_with_lock_nanos: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter with explicit per-class intervals
    pub fn new(metadata_interval: Duration, file_interval: Duration) -> Self {
        Self {
            metadata: ClassGate::new(metadata_interval),
            file: ClassGate::new(file_interval),
            sleep_nanos: AtomicU64::new(0),
            wait_with_lock_nanos: AtomicU64::new(0),
        }
    }

    /// Creates a limiter from the scraper pacing settings
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(
            Duration::from_millis(config.api_wait_ms),
            Duration::from_millis(config.file_wait_ms),
        )
    }

    /// Returns the configured interval of a traffic class
    pub fn interval(&self, class: TrafficClass) -> Duration {
        self.gate(class).interval
    }

    /// Waits until the class's interval has elapsed since its previous call returned
    ///
    /// The new "last call" timestamp is recorded before the class lock is
    /// released, so concurrent callers of one class are strictly spaced.
    pub async fn wait_turn(&self, class: TrafficClass) {
        let started = Instant::now();
        let gate = self.gate(class);

        {
            let mut last_call = gate.last_call.lock().await;

            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < gate.interval {
                    let pause = gate.interval - elapsed;
                    tracing::trace!("Rate limiter pausing {:?} for {:?}", class, pause);
                    add_duration(&self.sleep_nanos, pause);
                    tokio::time::sleep(pause).await;
                }
            }

            *last_call = Some(Instant::now());
        }

        add_duration(&self.wait_with_lock_nanos, started.elapsed());
    }

    /// Total time callers were put to sleep to honour the intervals
    pub fn sleep_time(&self) -> Duration {
        Duration::from_nanos(self.sleep_nanos.load(Ordering::Relaxed))
    }

    /// Total time spent inside `wait_turn`, including lock contention
    pub fn wait_time_with_lock(&self) -> Duration {
        Duration::from_nanos(self.wait_with_lock_nanos.load(Ordering::Relaxed))
    }

    fn gate(&self, class: TrafficClass) -> &ClassGate {
        match class {
            TrafficClass::Metadata => &self.metadata,
            TrafficClass::File => &self.file,
        }
    }
}

fn add_duration(counter: &AtomicU64, duration: Duration) {
    let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
    counter.fetch_add(nanos, Ordering::Relaxed);
}
