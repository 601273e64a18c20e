use crate::Error;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker knobs, per callee.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Outcomes considered when evaluating the failure rate.
    pub window: usize,
    /// Below this many observed calls the breaker never opens.
    pub min_calls: usize,
    /// Failure rate at or above which the breaker opens.
    pub failure_rate: f64,
    /// How long an open breaker blocks before admitting trial calls.
    pub open_for: Duration,
    /// Trial calls admitted while half-open.
    pub half_open_trials: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: 10,
            min_calls: 5,
            failure_rate: 0.5,
            open_for: Duration::from_secs(10),
            half_open_trials: 5,
        }
    }
}

enum State {
    Closed { window: VecDeque<bool> },
    Open { until: Instant },
    HalfOpen { admitted: usize, outcomes: Vec<bool> },
}

/// A three-state guard suppressing calls to a failing callee.
///
/// Admission and outcome recording are two steps so that no lock is held
/// across the call itself.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(State::Closed {
                window: VecDeque::new(),
            }),
        }
    }

    /// Ask to place one call. Fails fast with [`Error::CircuitOpen`],
    /// which callers can tell apart from transport failure.
    pub fn try_acquire(&self) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Closed { .. } => Ok(()),
            State::Open { until } => {
                if Instant::now() < *until {
                    return Err(Error::CircuitOpen(self.name.clone()));
                }
                // Open period elapsed: admit trials without external stimulus.
                tracing::info!(peer = %self.name, "circuit breaker half-open");
                *state = State::HalfOpen {
                    admitted: 1,
                    outcomes: Vec::new(),
                };
                Ok(())
            }
            State::HalfOpen { admitted, .. } => {
                if *admitted < self.config.half_open_trials {
                    *admitted += 1;
                    Ok(())
                } else {
                    Err(Error::CircuitOpen(self.name.clone()))
                }
            }
        }
    }

    /// Record the outcome of an admitted call.
    pub fn record(&self, success: bool) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Closed { window } => {
                window.push_back(success);
                while window.len() > self.config.window {
                    window.pop_front();
                }
                if window.len() >= self.config.min_calls
                    && failure_rate(window.iter()) >= self.config.failure_rate
                {
                    tracing::warn!(peer = %self.name, "circuit breaker open");
                    *state = State::Open {
                        until: Instant::now() + self.config.open_for,
                    };
                }
            }
            // An outcome from a call admitted before the breaker opened.
            State::Open { .. } => (),
            State::HalfOpen { outcomes, .. } => {
                outcomes.push(success);
                if outcomes.len() < self.config.half_open_trials {
                    return;
                }
                if failure_rate(outcomes.iter()) <= self.config.failure_rate {
                    tracing::info!(peer = %self.name, "circuit breaker closed");
                    *state = State::Closed {
                        window: VecDeque::new(),
                    };
                } else {
                    tracing::warn!(peer = %self.name, "circuit breaker re-opened");
                    *state = State::Open {
                        until: Instant::now() + self.config.open_for,
                    };
                }
            }
        }
    }

    /// Force the breaker open, as if the failure threshold had tripped.
    pub fn force_open(&self) {
        let mut state = self.state.lock().unwrap();
        *state = State::Open {
            until: Instant::now() + self.config.open_for,
        };
    }
}

fn failure_rate<'i>(outcomes: impl Iterator<Item = &'i bool>) -> f64 {
    let (mut total, mut failed) = (0usize, 0usize);
    for ok in outcomes {
        total += 1;
        if !ok {
            failed += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    failed as f64 / total as f64
}
