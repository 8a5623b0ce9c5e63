#![forbid(unsafe_code)]

//! Loop wake-up and cancellation signal.
//!
//! One [`LoopSignal`] is shared by the orchestrator, the render loop, the
//! input loop and every reporter. It carries three pieces of state:
//!
//! - `stopped`: latched; once set every waiter returns immediately.
//! - `refresh`: a one-shot request consumed by the next `wait_timeout`.
//! - `fatal`: the reason a fatal error stopped the dashboard, if any.
//!
//! Waiting uses a condition variable, so a sleeping render loop wakes as soon
//! as `stop()` or `request_refresh()` is called.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The signal was stopped.
    Stopped,
    /// A refresh was requested.
    Refresh,
    /// The timeout elapsed.
    Timeout,
}

#[derive(Debug, Default)]
struct SignalState {
    stopped: bool,
    refresh: bool,
    fatal: Option<String>,
}

/// Cloneable stop/refresh signal.
#[derive(Debug, Clone, Default)]
pub struct LoopSignal {
    inner: Arc<(Mutex<SignalState>, Condvar)>,
}

impl LoopSignal {
    /// Create an unstopped signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded state is three flags that are valid in any combination,
    // so a poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latch the stop flag and wake every waiter.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.stopped = true;
        self.inner.1.notify_all();
    }

    /// Stop because of a fatal error. The first reason wins.
    pub fn stop_fatal(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        if state.fatal.is_none() {
            state.fatal = Some(reason.into());
        }
        state.stopped = true;
        self.inner.1.notify_all();
    }

    /// Whether the stop flag is set.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Reason recorded by [`stop_fatal`](Self::stop_fatal).
    #[must_use]
    pub fn fatal_reason(&self) -> Option<String> {
        self.lock().fatal.clone()
    }

    /// Ask the render loop to paint as soon as possible.
    pub fn request_refresh(&self) {
        let mut state = self.lock();
        state.refresh = true;
        self.inner.1.notify_all();
    }

    /// Wait until stopped, a refresh is requested, or `duration` elapses.
    ///
    /// A pending refresh request is consumed. Spurious wakeups are absorbed.
    pub fn wait_timeout(&self, duration: Duration) -> Wake {
        let deadline = Instant::now() + duration;
        let mut state = self.lock();
        loop {
            if state.stopped {
                return Wake::Stopped;
            }
            if state.refresh {
                state.refresh = false;
                return Wake::Refresh;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wake::Timeout;
            }
            let (guard, _) = self
                .inner
                .1
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Block until the stop flag is set.
    pub fn wait_stopped(&self) {
        let mut state = self.lock();
        while !state.stopped {
            state = self
                .inner
                .1
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_unstopped() {
        let signal = LoopSignal::new();
        assert!(!signal.is_stopped());
        assert_eq!(signal.fatal_reason(), None);
    }

    #[test]
    fn wait_times_out() {
        let signal = LoopSignal::new();
        assert_eq!(signal.wait_timeout(Duration::from_millis(10)), Wake::Timeout);
    }

    #[test]
    fn refresh_is_consumed_once() {
        let signal = LoopSignal::new();
        signal.request_refresh();
        assert_eq!(signal.wait_timeout(Duration::from_secs(1)), Wake::Refresh);
        assert_eq!(signal.wait_timeout(Duration::from_millis(5)), Wake::Timeout);
    }

    #[test]
    fn stop_takes_priority_over_refresh() {
        let signal = LoopSignal::new();
        signal.request_refresh();
        signal.stop();
        assert_eq!(signal.wait_timeout(Duration::from_secs(1)), Wake::Stopped);
    }

    #[test]
    fn stop_wakes_a_sleeping_waiter() {
        let signal = LoopSignal::new();
        let waiter = signal.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        signal.stop();
        assert_eq!(handle.join().unwrap(), Wake::Stopped);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn first_fatal_reason_wins() {
        let signal = LoopSignal::new();
        signal.stop_fatal("lock poisoned");
        signal.stop_fatal("second");
        assert!(signal.is_stopped());
        assert_eq!(signal.fatal_reason().as_deref(), Some("lock poisoned"));
    }

    #[test]
    fn wait_stopped_returns_after_stop() {
        let signal = LoopSignal::new();
        let remote = signal.clone();
        let handle = thread::spawn(move || remote.wait_stopped());
        thread::sleep(Duration::from_millis(10));
        signal.stop();
        handle.join().unwrap();
    }
}
