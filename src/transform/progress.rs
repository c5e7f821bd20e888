//! Job Progress Feed
//!
//! Watch-channel progress publisher for one transformation job. Values are
//! clamped to [0, 1] and never regress within a job; stale or out-of-order
//! reports are dropped rather than surfaced.

use tokio::sync::watch;

/// Monotone progress publisher for one job
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<f64>,
}

impl ProgressReporter {
    /// Creates a reporter and the receiver observing it, starting at 0.0.
    pub fn new() -> (Self, watch::Receiver<f64>) {
        let (tx, rx) = watch::channel(0.0);
        (Self { tx }, rx)
    }

    /// Publishes a progress value. Clamped to [0, 1]; values below the
    /// current one are ignored.
    pub fn report(&self, value: f64) {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            return;
        };

        self.tx.send_if_modified(|current| {
            if value > *current {
                *current = value;
                true
            } else {
                false
            }
        });
    }

    /// Current progress value
    pub fn value(&self) -> f64 {
        *self.tx.borrow()
    }

    /// Additional observer for the same feed
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        let (reporter, rx) = ProgressReporter::new();
        assert_eq!(reporter.value(), 0.0);
        assert_eq!(*rx.borrow(), 0.0);
    }

    #[test]
    fn test_progress_is_monotone() {
        let (reporter, rx) = ProgressReporter::new();
        reporter.report(0.5);
        reporter.report(0.3); // regression dropped
        assert_eq!(*rx.borrow(), 0.5);
        reporter.report(0.7);
        assert_eq!(*rx.borrow(), 0.7);
    }

    #[test]
    fn test_progress_is_clamped() {
        let (reporter, rx) = ProgressReporter::new();
        reporter.report(2.5);
        assert_eq!(*rx.borrow(), 1.0);

        let (reporter, rx) = ProgressReporter::new();
        reporter.report(-1.0);
        reporter.report(f64::NAN);
        assert_eq!(*rx.borrow(), 0.0);
    }

    #[tokio::test]
    async fn test_receiver_sees_updates() {
        let (reporter, mut rx) = ProgressReporter::new();
        reporter.report(0.25);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 0.25);
    }
}
