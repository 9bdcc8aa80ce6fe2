//! Cancellable delayed-execution helpers for the UI loop.
//!
//! Both types are driven by explicit `Instant`s so the owner decides when to
//! look at them (typically once per event-loop iteration). They use
//! `tokio::time::Instant`, which follows tokio's paused clock in tests.

use std::time::Duration;

use tokio::time::Instant;

/// Delay applied to search input before it reaches the filter pipeline
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Minimum spacing between scroll boundary checks
pub const SCROLL_THROTTLE: Duration = Duration::from_millis(100);

/// Holds the most recent value until no new value has arrived for `delay`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Replace any pending value and restart the delay
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Take the pending value if its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = matches!(self.pending, Some((_, deadline)) if now >= deadline);
        if due {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Sleep until the pending value is due. Never completes while nothing
    /// is pending, so it can sit in a `tokio::select!` arm.
    pub async fn ready(&self) {
        match self.deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

/// Leading-edge throttle: lets one call through per window.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_coalesces_burst() {
        let start = Instant::now();
        let mut d = Debouncer::new(SEARCH_DEBOUNCE);

        for (i, term) in ["c", "ca", "cat", "cats", "cat"].iter().enumerate() {
            let t = start + Duration::from_millis(i as u64 * 10);
            d.push(term.to_string(), t);
            assert_eq!(d.poll(t), None);
        }

        let last = start + Duration::from_millis(40);
        assert_eq!(d.poll(last + Duration::from_millis(299)), None);
        assert_eq!(d.poll(last + Duration::from_millis(300)), Some("cat".to_string()));
        assert_eq!(d.poll(last + Duration::from_millis(900)), None);
        assert_eq!(d.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_ready_waits_for_deadline() {
        let mut d = Debouncer::new(SEARCH_DEBOUNCE);
        let start = Instant::now();
        d.push("cat", start);

        d.ready().await;
        assert!(Instant::now() >= start + SEARCH_DEBOUNCE);
        assert_eq!(d.poll(Instant::now()), Some("cat"));
    }

    #[test]
    fn test_throttle_window() {
        let start = Instant::now();
        let mut t = Throttle::new(SCROLL_THROTTLE);

        assert!(t.try_acquire(start));
        assert!(!t.try_acquire(start + Duration::from_millis(1)));
        assert!(!t.try_acquire(start + Duration::from_millis(99)));
        assert!(t.try_acquire(start + Duration::from_millis(100)));

        t.reset();
        assert!(t.try_acquire(start + Duration::from_millis(101)));
    }
}
