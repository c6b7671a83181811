use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Mutex;

/// `message_count`/`error_count`, incremented on admission and on every
/// completed non-`SUCCESS` outcome respectively (spec §3).
///
/// Each field is its own atomic for lock-free increments on the hot path,
/// but `snapshot`/`reset` take a guard mutex so readers always observe a
/// coherent `(message_count, error_count)` pair, per spec §5's requirement —
/// grounded on the teacher's `Manager`, which mixes independent `AtomicU64`
/// counters with a `Mutex`-guarded map for the fields that must agree.
#[derive(Default)]
pub struct Counters {
    message_count: AtomicU32,
    error_count: AtomicU32,
    coherence: Mutex<()>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admission(&self) {
        self.message_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> u32 {
        self.message_count.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> (u32, u32) {
        let _guard = self.coherence.lock().await;
        (
            self.message_count.load(Ordering::SeqCst),
            self.error_count.load(Ordering::SeqCst),
        )
    }

    pub async fn reset(&self) {
        let _guard = self.coherence.lock().await;
        self.message_count.store(0, Ordering::SeqCst);
        self.error_count.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reset_yields_zero_pair() {
        let counters = Counters::new();
        counters.record_admission();
        counters.record_admission();
        counters.record_error();

        counters.reset().await;
        assert_eq!(counters.snapshot().await, (0, 0));
    }

    #[tokio::test]
    async fn message_count_tracks_admissions() {
        let counters = Counters::new();
        for _ in 0..5 {
            counters.record_admission();
        }
        assert_eq!(counters.message_count(), 5);
    }
}
