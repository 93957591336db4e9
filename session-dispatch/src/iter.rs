//! Blocking iterator over delivered cycles
//!
//! Provides the same patterns as the listener path for synchronous
//! consumers:
//! - Blocking: `recv()`, `for cycle in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use session_model::{EventSet, Snapshot};

/// One cycle as seen after delivery to the listeners
#[derive(Debug, Clone)]
pub struct DeliveredCycle {
    pub version: u64,
    pub events: EventSet,
    /// Snapshot with the cycle applied
    pub snapshot: Arc<Snapshot>,
}

/// Blocking iterator over delivered cycles
///
/// Each iterator gets every cycle delivered after it was created, in
/// delivery order. The channel closes when the dispatch worker stops.
///
/// # Example
///
/// ```rust,ignore
/// // Blocking iteration
/// for cycle in controller.iter()? {
///     println!("v{}: {:?}", cycle.version, cycle.events);
/// }
///
/// // With timeout
/// if let Some(cycle) = controller.iter()?.recv_timeout(Duration::from_secs(1)) {
///     println!("Got cycle: {:?}", cycle.events);
/// }
/// ```
pub struct CycleIterator {
    rx: Arc<Mutex<mpsc::Receiver<DeliveredCycle>>>,
}

impl CycleIterator {
    pub(crate) fn new(rx: mpsc::Receiver<DeliveredCycle>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Block until the next cycle is delivered
    ///
    /// Returns `None` once the worker has stopped.
    pub fn recv(&self) -> Option<DeliveredCycle> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Block until the next cycle or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DeliveredCycle> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Try to receive a cycle without blocking
    pub fn try_recv(&self) -> Option<DeliveredCycle> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Non-blocking iterator over cycles already delivered
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Iterator that waits up to `timeout` for each cycle
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for CycleIterator {
    type Item = DeliveredCycle;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently available cycles
pub struct TryIter<'a> {
    inner: &'a CycleIterator,
}

impl<'a> Iterator for TryIter<'a> {
    type Item = DeliveredCycle;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a> {
    inner: &'a CycleIterator,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIter<'a> {
    type Item = DeliveredCycle;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_model::FieldTag;
    use std::thread;
    use std::time::Instant;

    fn cycle(version: u64) -> DeliveredCycle {
        DeliveredCycle {
            version,
            events: [FieldTag::PlayWhenReady].into_iter().collect(),
            snapshot: Arc::new(Snapshot::default()),
        }
    }

    #[test]
    fn test_try_recv_empty() {
        let (_tx, rx) = mpsc::channel::<DeliveredCycle>();
        let iter = CycleIterator::new(rx);
        assert!(iter.try_recv().is_none());
    }

    #[test]
    fn test_try_iter_drains_in_order() {
        let (tx, rx) = mpsc::channel();
        let iter = CycleIterator::new(rx);
        for version in 1..=3 {
            tx.send(cycle(version)).unwrap();
        }

        let versions: Vec<u64> = iter.try_iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert!(iter.try_recv().is_none());
    }

    #[test]
    fn test_recv_timeout() {
        let (_tx, rx) = mpsc::channel::<DeliveredCycle>();
        let iter = CycleIterator::new(rx);

        let start = Instant::now();
        assert!(iter.recv_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_blocking_recv() {
        let (tx, rx) = mpsc::channel();
        let iter = CycleIterator::new(rx);

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(cycle(9)).unwrap();
        });

        assert_eq!(iter.recv().map(|c| c.version), Some(9));
    }

    #[test]
    fn test_channel_closed() {
        let (tx, rx) = mpsc::channel::<DeliveredCycle>();
        let iter = CycleIterator::new(rx);
        drop(tx);
        assert!(iter.recv().is_none());
    }
}
