use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error percentage is computed over this rolling window.
const ROLLING_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Wall-clock budget for one guarded call, retries included.
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    pub error_percent_threshold: u32,
    /// Below this many calls in the window the breaker never trips.
    pub request_volume_threshold: u32,
    pub sleep_window: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            max_concurrent_requests: 10,
            error_percent_threshold: 50,
            request_volume_threshold: 20,
            sleep_window: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BreakerError {
    #[error("circuit open")]
    Open,
    #[error("max concurrency reached")]
    AtCapacity,
}

struct BreakerWindow {
    state: CircuitState,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    /// Completion times and outcomes inside the rolling window.
    calls: VecDeque<(Instant, bool)>,
}

/// Per-command circuit breaker. Open circuits reject immediately; after the
/// sleep window a single half-open probe decides whether to close again.
pub struct CircuitBreaker {
    pub name: String,
    settings: BreakerSettings,
    window: Mutex<BreakerWindow>,
    permits: Arc<Semaphore>,
}

/// Capability to run one guarded call. Must be resolved with `complete`;
/// dropping it unresolved releases the half-open probe slot.
pub struct CallToken {
    breaker: Arc<CircuitBreaker>,
    _permit: OwnedSemaphorePermit,
    probe: bool,
    completed: bool,
}

impl CallToken {
    pub fn complete(mut self, success: bool) {
        self.completed = true;
        self.breaker.record(self.probe, success);
    }
}

impl Drop for CallToken {
    fn drop(&mut self) {
        if !self.completed && self.probe {
            self.breaker.release_probe();
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: &str, settings: BreakerSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_requests));
        Self {
            name: name.to_string(),
            settings,
            window: Mutex::new(BreakerWindow {
                state: CircuitState::Closed,
                opened_at: None,
                probe_in_flight: false,
                calls: VecDeque::new(),
            }),
            permits,
        }
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    pub fn state(&self) -> CircuitState {
        self.lock_window().state
    }

    pub fn try_acquire(self: &Arc<Self>) -> Result<CallToken, BreakerError> {
        let mut probe = false;
        {
            let mut window = self.lock_window();
            let now = Instant::now();

            if window.state == CircuitState::Open {
                let slept = window
                    .opened_at
                    .is_some_and(|at| now.duration_since(at) >= self.settings.sleep_window);
                if !slept {
                    return Err(BreakerError::Open);
                }
                window.state = CircuitState::HalfOpen;
                window.probe_in_flight = false;
            }

            if window.state == CircuitState::HalfOpen {
                if window.probe_in_flight {
                    return Err(BreakerError::Open);
                }
                window.probe_in_flight = true;
                probe = true;
            }
        }

        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                if probe {
                    self.release_probe();
                }
                return Err(BreakerError::AtCapacity);
            }
        };

        Ok(CallToken {
            breaker: self.clone(),
            _permit: permit,
            probe,
            completed: false,
        })
    }

    fn record(&self, probe: bool, success: bool) {
        let mut window = self.lock_window();
        let now = Instant::now();
        while window
            .calls
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) > ROLLING_WINDOW)
        {
            window.calls.pop_front();
        }

        match window.state {
            CircuitState::Closed => {
                window.calls.push_back((now, success));
                let total = window.calls.len() as u32;
                let failures = window.calls.iter().filter(|(_, ok)| !ok).count() as u32;
                if total >= self.settings.request_volume_threshold
                    && failures * 100 >= total * self.settings.error_percent_threshold
                {
                    tracing::warn!(command = %self.name, "circuit breaker tripped");
                    window.state = CircuitState::Open;
                    window.opened_at = Some(now);
                    window.calls.clear();
                }
            }
            CircuitState::HalfOpen if probe => {
                window.probe_in_flight = false;
                if success {
                    tracing::info!(command = %self.name, "circuit breaker closed after probe");
                    window.state = CircuitState::Closed;
                    window.opened_at = None;
                    window.calls.clear();
                } else {
                    window.state = CircuitState::Open;
                    window.opened_at = Some(now);
                }
            }
            // Completions that straddled a state change carry no signal.
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn release_probe(&self) {
        let mut window = self.lock_window();
        if window.state == CircuitState::HalfOpen {
            window.probe_in_flight = false;
        }
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, BreakerWindow> {
        self.window.lock().expect("circuit breaker lock poisoned")
    }
}
