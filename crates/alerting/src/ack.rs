//! Shared Acknowledgment State
//!
//! Written by the acknowledgment endpoint, read by the monitor loop.
//! The debounce reads a monotonic offset from the state's creation
//! `Instant`, so wall-clock steps never stretch or shorten a cool-down.
//! The wall-clock time is kept alongside for reporting only. Each value
//! lives in its own atomic, so a reader always observes either the
//! previous or the latest acknowledgment.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

const NOT_ACKNOWLEDGED: i64 = i64::MIN;

/// Last-write-wins holder for the most recent acknowledgment
#[derive(Debug)]
pub struct AckState {
    /// Reference point for monotonic offsets
    origin: Instant,
    /// Nanoseconds from `origin` to the last acknowledgment
    last_ack_offset_ns: AtomicI64,
    /// Wall-clock epoch milliseconds of the last acknowledgment
    last_ack_wall_ms: AtomicI64,
    count: AtomicU64,
}

impl AckState {
    /// Create with no acknowledgment recorded
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ack_offset_ns: AtomicI64::new(NOT_ACKNOWLEDGED),
            last_ack_wall_ms: AtomicI64::new(NOT_ACKNOWLEDGED),
            count: AtomicU64::new(0),
        }
    }

    /// Record an acknowledgment now
    pub fn acknowledge(&self) -> DateTime<Utc> {
        self.record(Instant::now(), Utc::now())
    }

    /// Record an acknowledgment taken at monotonic instant `at`, displayed as
    /// `wall`. Overwrites any previous one and returns the stored wall time
    /// (millisecond precision).
    pub fn record(&self, at: Instant, wall: DateTime<Utc>) -> DateTime<Utc> {
        let offset_ns = match at.checked_duration_since(self.origin) {
            Some(after) => nanos(after),
            None => -nanos(self.origin.duration_since(at)),
        };
        let wall_ms = wall.timestamp_millis();

        self.last_ack_offset_ns.store(offset_ns, Ordering::Release);
        self.last_ack_wall_ms.store(wall_ms, Ordering::Release);
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;

        let stored = DateTime::from_timestamp_millis(wall_ms).unwrap_or(wall);
        info!("Alert acknowledged at {} (count: {})", stored, count);
        stored
    }

    /// Monotonic instant of the most recent acknowledgment, if any
    pub fn last_acknowledged_instant(&self) -> Option<Instant> {
        match self.last_ack_offset_ns.load(Ordering::Acquire) {
            NOT_ACKNOWLEDGED => None,
            ns if ns >= 0 => self.origin.checked_add(Duration::from_nanos(ns as u64)),
            ns => self.origin.checked_sub(Duration::from_nanos(ns.unsigned_abs())),
        }
    }

    /// Time elapsed between the most recent acknowledgment and `now`.
    /// Zero if the acknowledgment is not before `now`.
    pub fn elapsed_since_ack(&self, now: Instant) -> Option<Duration> {
        self.last_acknowledged_instant()
            .map(|at| now.saturating_duration_since(at))
    }

    /// Wall-clock time of the most recent acknowledgment, for reporting
    pub fn last_acknowledged_at(&self) -> Option<DateTime<Utc>> {
        match self.last_ack_wall_ms.load(Ordering::Acquire) {
            NOT_ACKNOWLEDGED => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// Number of acknowledgments since start-up
    pub fn acknowledgment_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for AckState {
    fn default() -> Self {
        Self::new()
    }
}

fn nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn wall_ms(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_absent_at_startup() {
        let state = AckState::new();
        assert_eq!(state.last_acknowledged_at(), None);
        assert_eq!(state.last_acknowledged_instant(), None);
        assert_eq!(state.elapsed_since_ack(Instant::now()), None);
        assert_eq!(state.acknowledgment_count(), 0);
    }

    #[test]
    fn test_last_write_wins() {
        let state = AckState::new();
        let first = Instant::now();
        let second = first + Duration::from_secs(60);
        state.record(first, wall_ms(1_700_000_000_000));
        state.record(second, wall_ms(1_700_000_060_000));

        assert_eq!(state.last_acknowledged_instant(), Some(second));
        assert_eq!(state.last_acknowledged_at(), Some(wall_ms(1_700_000_060_000)));
        assert_eq!(state.acknowledgment_count(), 2);
    }

    #[test]
    fn test_acknowledge_uses_current_time() {
        let state = AckState::new();
        let before = Utc::now() - chrono::Duration::milliseconds(1);
        let stored = state.acknowledge();

        assert!(stored >= before && stored <= Utc::now());
        assert_eq!(state.last_acknowledged_at(), Some(stored));
        assert!(state.elapsed_since_ack(Instant::now()).is_some());
    }

    #[test]
    fn test_acknowledgment_before_creation() {
        let later = AckState::new();
        let at = later.origin - Duration::from_secs(5);
        later.record(at, Utc::now());

        assert_eq!(later.last_acknowledged_instant(), Some(at));
        assert_eq!(later.elapsed_since_ack(later.origin), Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_ignores_wall_clock() {
        let state = AckState::new();
        // Wall clock later stepped back six hours
        state.record(Instant::now(), Utc::now() + chrono::Duration::hours(6));

        tokio::time::advance(Duration::from_secs(3 * 3600)).await;
        assert_eq!(
            state.elapsed_since_ack(Instant::now()),
            Some(Duration::from_secs(3 * 3600))
        );
    }

    #[test]
    fn test_concurrent_reads_never_torn() {
        let state = Arc::new(AckState::new());
        let base = Instant::now();
        let written: Vec<Instant> = (0..8u64)
            .map(|w| base + Duration::from_nanos(w * 1_000_000_007))
            .collect();
        let allowed: HashSet<Instant> = written.iter().copied().collect();

        let writers: Vec<_> = written
            .iter()
            .copied()
            .map(|at| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        state.record(at, Utc::now());
                    }
                })
            })
            .collect();

        let reader = {
            let state = Arc::clone(&state);
            let allowed = allowed.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    if let Some(seen) = state.last_acknowledged_instant() {
                        assert!(allowed.contains(&seen));
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let last = state.last_acknowledged_instant().unwrap();
        assert!(allowed.contains(&last));
        assert_eq!(state.acknowledgment_count(), 8_000);
    }
}
