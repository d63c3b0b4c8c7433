//! Token bucket limiter with blocking acquisition.
//!
//! The bucket holds up to `burst` tokens and refills continuously at `rate` tokens per second.
//! Waiting works by reservation: a caller takes a token immediately, letting the count go
//! negative, and sleeps until the debt it created has been repaid. Concurrent waiters therefore
//! queue up behind each other in roughly arrival order without holding a lock while asleep.
//!
//! Semantics:
//! - An already-done context fails before touching the bucket.
//! - A reservation that would complete after the context deadline is abandoned up front.
//! - Cancellation while asleep returns the reserved token, minus whatever later reservations
//!   already depend on it.
//! - `rate = +inf` never waits; `rate = 0` serves the initial burst only.

use crate::context::CancelContext;
use crate::error::ThrottleError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
    last_event: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Reservation {
    Granted,
    Scheduled(Instant),
    Unavailable,
}

/// Shared token bucket.
#[derive(Debug)]
pub struct Limiter {
    rate: f64,
    burst: u32,
    state: Mutex<BucketState>,
}

impl Limiter {
    /// Create a full bucket holding `burst` tokens, refilled at `rate` tokens per second.
    pub fn new(rate: f64, burst: u32) -> Self {
        let now = Instant::now();
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState { tokens: f64::from(burst), last: now, last_event: now }),
        }
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Tokens available right now. Negative while reservations are outstanding.
    pub fn tokens(&self) -> f64 {
        if self.is_unlimited() {
            return f64::from(self.burst);
        }
        let state = self.lock();
        self.advance(&state, Instant::now())
    }

    /// Take a token if one is available without waiting.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        matches!(self.reserve(now, Some(now)), Reservation::Granted)
    }

    /// Block until a token is granted or `ctx` is done.
    pub async fn wait(&self, ctx: &CancelContext) -> Result<(), ThrottleError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        match self.reserve(Instant::now(), ctx.deadline()) {
            Reservation::Granted => Ok(()),
            Reservation::Unavailable => match ctx.deadline() {
                Some(_) => Err(ThrottleError::DeadlineExceeded),
                None => Err(ctx.done().await),
            },
            Reservation::Scheduled(at) => {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep_until(at) => Ok(()),
                    err = ctx.done() => {
                        self.cancel_reservation(at, Instant::now());
                        Err(err)
                    }
                }
            }
        }
    }

    fn is_unlimited(&self) -> bool {
        self.rate == f64::INFINITY
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Token count after refilling up to `now`, without committing it.
    fn advance(&self, state: &BucketState, now: Instant) -> f64 {
        let last = state.last.min(now);
        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        let refill = if self.rate > 0.0 { elapsed * self.rate } else { 0.0 };
        (state.tokens + refill).min(f64::from(self.burst))
    }

    fn duration_for(&self, tokens: f64) -> Option<Duration> {
        if tokens <= 0.0 {
            return Some(Duration::ZERO);
        }
        if self.rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(tokens / self.rate).ok()
    }

    fn reserve(&self, now: Instant, deadline: Option<Instant>) -> Reservation {
        if self.is_unlimited() {
            return Reservation::Granted;
        }
        if self.burst == 0 {
            return Reservation::Unavailable;
        }
        let mut state = self.lock();
        let tokens = self.advance(&state, now) - 1.0;
        let Some(wait) = self.duration_for(-tokens) else {
            return Reservation::Unavailable;
        };
        let Some(at) = now.checked_add(wait) else {
            return Reservation::Unavailable;
        };
        if matches!(deadline, Some(deadline) if at > deadline) {
            return Reservation::Unavailable;
        }
        state.tokens = tokens;
        state.last = now;
        state.last_event = at;
        if wait.is_zero() {
            Reservation::Granted
        } else {
            Reservation::Scheduled(at)
        }
    }

    /// Undo a reservation scheduled for `at` that will not be used.
    fn cancel_reservation(&self, at: Instant, now: Instant) {
        if at <= now {
            return;
        }
        let mut state = self.lock();
        // Later reservations computed their waits assuming this token was gone.
        let dependent =
            state.last_event.saturating_duration_since(at).as_secs_f64() * self.rate.max(0.0);
        let restore = 1.0 - dependent;
        if restore <= 0.0 {
            return;
        }
        let tokens = (self.advance(&state, now) + restore).min(f64::from(self.burst));
        state.tokens = tokens;
        state.last = now;
        if at == state.last_event {
            if let Some(prev) = self.duration_for(1.0).and_then(|d| at.checked_sub(d)) {
                if prev >= now {
                    state.last_event = prev;
                }
            }
        }
    }
}
