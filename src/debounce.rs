//! Debouncing of rapidly changing values.
//!
//! [`Debouncer`] is a runtime-independent state machine: callers feed it
//! values with [`Debouncer::schedule`] and ask it for a settled value with
//! [`Debouncer::poll`]. Time is passed in explicitly, so the search session
//! and the tests can drive it without real timers.
//!
//! [`debounce`] binds the same state machine to tokio timers and a callback,
//! producing a [`DebouncedFn`]:
//!
//! - **trailing** (default): only the last call in a quiet window reaches the
//!   callback, once the window has elapsed;
//! - **immediate**: the first call in a quiet window reaches the callback
//!   right away and the trailing call is suppressed.
//!
//! A zero delay still defers a trailing call to a spawned task, so the
//! callback never runs inside `call` unless `immediate` is set.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::{Duration, Instant};

/// Quiet-window state machine.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    immediate: bool,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration, immediate: bool) -> Self {
        Self {
            delay,
            immediate,
            pending: None,
            deadline: None,
        }
    }

    /// Trailing-edge debouncer.
    pub fn trailing(delay: Duration) -> Self {
        Self::new(delay, false)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new value at `now`, restarting the quiet window.
    ///
    /// Returns the value back only in immediate mode, and only when no quiet
    /// window was open; the caller must deliver it right away.
    pub fn schedule(&mut self, value: T, now: Instant) -> Option<T> {
        let window_open = self.deadline.is_some_and(|d| now < d);
        self.deadline = Some(now + self.delay);

        if self.immediate {
            self.pending = None;
            if window_open {
                None
            } else {
                Some(value)
            }
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Take the pending value if its quiet window has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop the pending value and close the window.
    pub fn cancel(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending.take()
    }

    /// When the pending value will settle, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_some() {
            self.deadline
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

struct Shared<T> {
    debouncer: Debouncer<T>,
    generation: u64,
}

/// A callback wrapped by [`debounce`]. Must be called from within a tokio
/// runtime.
pub struct DebouncedFn<T> {
    shared: Arc<Mutex<Shared<T>>>,
    callback: Arc<dyn Fn(T) + Send + Sync>,
    immediate: bool,
}

impl<T> Clone for DebouncedFn<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            callback: self.callback.clone(),
            immediate: self.immediate,
        }
    }
}

/// Wrap `callback` so that bursts of calls collapse into one invocation per
/// quiet window of `delay`.
pub fn debounce<T, F>(callback: F, delay: Duration, immediate: bool) -> DebouncedFn<T>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    DebouncedFn {
        shared: Arc::new(Mutex::new(Shared {
            debouncer: Debouncer::new(delay, immediate),
            generation: 0,
        })),
        callback: Arc::new(callback),
        immediate,
    }
}

impl<T: Send + 'static> DebouncedFn<T> {
    pub fn call(&self, value: T) {
        let now = Instant::now();
        let (generation, deadline, fire_now) = {
            let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.generation = shared.generation.wrapping_add(1);
            let fire_now = shared.debouncer.schedule(value, now);
            (
                shared.generation,
                now + shared.debouncer.delay(),
                fire_now,
            )
        };

        if let Some(value) = fire_now {
            (self.callback)(value);
            return;
        }
        if self.immediate {
            return;
        }

        let shared = self.shared.clone();
        let callback = self.callback.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let value = {
                let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
                // superseded by a later call or a cancel
                if shared.generation != generation {
                    return;
                }
                shared.debouncer.poll(Instant::now())
            };
            if let Some(value) = value {
                callback(value);
            }
        });
    }

    /// Drop any pending trailing call.
    pub fn cancel(&self) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.generation = shared.generation.wrapping_add(1);
        shared.debouncer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        let shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.debouncer.is_pending()
    }
}
