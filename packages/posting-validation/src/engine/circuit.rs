//! Process-wide circuit breaker for the inference engine.
//!
//! One `Mutex` guards the whole state so transitions are serialized across
//! concurrent runs. Callers obtain a [`BreakerPermit`] per engine attempt and
//! settle it with the attempt's result. A permit dropped unsettled, because
//! the caller stopped waiting, only releases its slot; it counts as a failure
//! when dropped by a panic.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::types::audit::CircuitState;

/// A state change made by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: CircuitState,
    pub to: CircuitState,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker shared by every run in the process.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    // A panic while holding the lock leaves the counters consistent, so
    // poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Current state, as last recorded.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Ask to send one attempt to the engine.
    ///
    /// Returns the state that refused the attempt when the breaker is open
    /// or a half-open trial is already in flight.
    pub fn acquire(&self) -> Result<BreakerPermit<'_>, CircuitState> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self, false, None)),
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if !cooled {
                    return Err(CircuitState::Open);
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                info!("Circuit breaker half-open, admitting trial call");
                Ok(BreakerPermit::new(
                    self,
                    true,
                    Some(StateChange {
                        from: CircuitState::Open,
                        to: CircuitState::HalfOpen,
                    }),
                ))
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(CircuitState::HalfOpen);
                }
                inner.trial_in_flight = true;
                Ok(BreakerPermit::new(self, true, None))
            }
        }
    }

    fn on_success(&self, trial: bool) -> Option<StateChange> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen if trial => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.trial_in_flight = false;
                info!("Circuit breaker closed after successful trial");
                Some(StateChange {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                })
            }
            // Stale attempt that started before the breaker opened.
            _ => None,
        }
    }

    /// An attempt ended without an answer either way.
    fn on_abandon(&self, trial: bool) {
        let mut inner = self.lock();
        if trial && inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn on_failure(&self, trial: bool) -> Option<StateChange> {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        match inner.state {
            CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                warn!(
                    failures = inner.consecutive_failures,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "Circuit breaker opened"
                );
                Some(StateChange {
                    from: CircuitState::Closed,
                    to: CircuitState::Open,
                })
            }
            CircuitState::HalfOpen if trial => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_in_flight = false;
                warn!("Circuit breaker trial failed, reopening");
                Some(StateChange {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Open,
                })
            }
            _ => None,
        }
    }
}

/// Right to send one attempt to the engine.
#[must_use = "settle the permit with succeed() or fail()"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    admitted: Option<StateChange>,
    settled: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool, admitted: Option<StateChange>) -> Self {
        Self {
            breaker,
            trial,
            admitted,
            settled: false,
        }
    }

    /// The transition made when this permit was granted (OPEN → HALF_OPEN).
    pub fn admitted_change(&self) -> Option<StateChange> {
        self.admitted
    }

    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// The engine answered.
    pub fn succeed(mut self) -> Option<StateChange> {
        self.settled = true;
        self.breaker.on_success(self.trial)
    }

    /// The engine timed out or was unreachable.
    pub fn fail(mut self) -> Option<StateChange> {
        self.settled = true;
        self.breaker.on_failure(self.trial)
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if std::thread::panicking() {
            warn!(trial = self.trial, "Engine attempt panicked, counting as failure");
            self.breaker.on_failure(self.trial);
        } else {
            debug!(trial = self.trial, "Engine attempt abandoned by caller");
            self.breaker.on_abandon(self.trial);
        }
    }
}
