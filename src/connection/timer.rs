//! Single-shot timers owned by the connection manager.

use std::time::Duration;

/// A single-shot countdown.
///
/// Expiry is not observed by the timer itself: the driver that owns the
/// reactor reports it through
/// [`ConnectionManager::handle_timeout`](super::ConnectionManager::handle_timeout).
pub trait Timer {
    /// Start (or restart) the countdown.
    fn arm(&mut self, duration: Duration);

    /// Stop the countdown. No-op if not armed.
    fn cancel(&mut self);

    /// Check if the countdown is running.
    fn is_armed(&self) -> bool;
}

/// Which of the manager's two timers expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Bound on a single connect attempt.
    ConnectTimeout,
    /// Pause before the next attempt.
    ReconnectSleep,
}

/// A timer whose expiry is signalled by hand.
///
/// Useful for tests and for drivers that keep their own timer wheel.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    armed: Option<Duration>,
    arm_count: u32,
}

impl ManualTimer {
    /// Create a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interval of the running countdown.
    pub fn interval(&self) -> Option<Duration> {
        self.armed
    }

    /// Number of times the timer has been armed.
    pub fn arm_count(&self) -> u32 {
        self.arm_count
    }
}

impl Timer for ManualTimer {
    fn arm(&mut self, duration: Duration) {
        self.armed = Some(duration);
        self.arm_count += 1;
    }

    fn cancel(&mut self) {
        self.armed = None;
    }

    fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

/// Stand-in deadline for intervals too large to represent, matching how
/// tokio clamps `sleep`.
#[cfg(feature = "tokio")]
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A timer backed by a tokio deadline.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Default)]
pub struct DeadlineTimer {
    deadline: Option<tokio::time::Instant>,
}

#[cfg(feature = "tokio")]
impl DeadlineTimer {
    /// Create a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instant at which the countdown expires.
    pub fn deadline(&self) -> Option<tokio::time::Instant> {
        self.deadline
    }
}

#[cfg(feature = "tokio")]
impl Timer for DeadlineTimer {
    fn arm(&mut self, duration: Duration) {
        let now = tokio::time::Instant::now();
        let deadline = now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE);
        self.deadline = Some(deadline);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timer() {
        let mut timer = ManualTimer::new();
        assert!(!timer.is_armed());

        timer.arm(Duration::from_millis(100));
        assert!(timer.is_armed());
        assert_eq!(timer.interval(), Some(Duration::from_millis(100)));

        timer.cancel();
        assert!(!timer.is_armed());
        timer.cancel();
        assert_eq!(timer.arm_count(), 1);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(start_paused = true)]
    async fn test_deadline_timer() {
        let mut timer = DeadlineTimer::new();
        let start = tokio::time::Instant::now();

        timer.arm(Duration::from_millis(100));
        assert_eq!(timer.deadline(), Some(start + Duration::from_millis(100)));

        timer.cancel();
        assert!(!timer.is_armed());
        assert!(timer.deadline().is_none());
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(start_paused = true)]
    async fn test_deadline_timer_saturates() {
        let mut timer = DeadlineTimer::new();
        let start = tokio::time::Instant::now();

        timer.arm(Duration::MAX);
        assert!(timer.is_armed());
        assert_eq!(timer.deadline(), Some(start + FAR_FUTURE));
    }
}
