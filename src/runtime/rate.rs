//! Shared rate budget over a `governor` GCRA limiter.
//!
//! Costs are in venue weight units: the quota refills `refill_per_sec`
//! units per second and allows bursts up to `capacity`. The limiter reads
//! time through [`TokioClock`], so waits follow tokio's clock (and its
//! paused test clock) rather than wall time.

use std::num::NonZeroU32;
use std::ops::Add;
use std::time::Duration;

use governor::clock::{Clock, Reference};
use governor::middleware::NoOpMiddleware;
use governor::nanos::Nanos;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::error::CycleError;

#[derive(Debug, Clone, Deserialize)]
pub struct RateBudgetConfig {
    /// Burst size in weight units.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Weight units restored per second.
    #[serde(default = "default_refill_per_sec")]
    pub refill_per_sec: u32,
}

const fn default_capacity() -> u32 {
    1200
}

const fn default_refill_per_sec() -> u32 {
    20
}

impl Default for RateBudgetConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_sec: default_refill_per_sec(),
        }
    }
}

/// Result of a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Granted,
    /// Not enough budget; the cost will conform after `retry_after`.
    Exhausted { retry_after: Duration },
}

/// A point on tokio's clock, as governor sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokioInstant(Instant);

impl Add<Nanos> for TokioInstant {
    type Output = Self;

    fn add(self, other: Nanos) -> Self {
        Self(self.0 + Duration::from(other))
    }
}

impl Reference for TokioInstant {
    fn duration_since(&self, earlier: Self) -> Nanos {
        Nanos::from(self.0.saturating_duration_since(earlier.0))
    }

    fn saturating_sub(&self, duration: Nanos) -> Self {
        self.0
            .checked_sub(Duration::from(duration))
            .map_or(*self, Self)
    }
}

/// Governor clock backed by `tokio::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Instant = TokioInstant;

    fn now(&self) -> Self::Instant {
        TokioInstant(Instant::now())
    }
}

type Limiter = RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<TokioInstant>>;

pub struct RateBudget {
    capacity: u32,
    clock: TokioClock,
    limiter: Limiter,
}

impl RateBudget {
    /// A full budget.
    #[must_use]
    pub fn new(config: &RateBudgetConfig) -> Self {
        let burst = NonZeroU32::new(config.capacity).unwrap_or(NonZeroU32::MIN);
        let refill = NonZeroU32::new(config.refill_per_sec).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(refill).allow_burst(burst);
        let clock = TokioClock;

        Self {
            capacity: config.capacity,
            clock,
            limiter: RateLimiter::direct_with_clock(quota, &clock),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take `cost` units if they conform now.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::BudgetUnsatisfiable` when `cost` exceeds the
    /// capacity, since waiting would never help.
    pub fn try_acquire(&self, cost: u32) -> Result<Acquire, CycleError> {
        let unsatisfiable = CycleError::BudgetUnsatisfiable {
            cost,
            capacity: self.capacity,
        };
        if cost > self.capacity {
            return Err(unsatisfiable);
        }
        let Some(cells) = NonZeroU32::new(cost) else {
            return Ok(Acquire::Granted);
        };

        match self.limiter.check_n(cells) {
            Ok(Ok(())) => Ok(Acquire::Granted),
            Ok(Err(not_until)) => Ok(Acquire::Exhausted {
                retry_after: not_until
                    .wait_time_from(self.clock.now())
                    .max(Duration::from_millis(1)),
            }),
            Err(_insufficient) => Err(unsatisfiable),
        }
    }

    /// Wait until `cost` units conform, then take them.
    ///
    /// Waits on tokio's timer; governor's own `until_n_ready` sleeps on a
    /// wall-clock timer that the tokio test clock cannot advance.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::BudgetUnsatisfiable` when `cost` exceeds the
    /// capacity.
    pub async fn acquire(&self, cost: u32) -> Result<(), CycleError> {
        loop {
            match self.try_acquire(cost)? {
                Acquire::Granted => return Ok(()),
                Acquire::Exhausted { retry_after } => {
                    trace!(
                        cost,
                        wait_ms = retry_after.as_millis() as u64,
                        "Rate budget exhausted, waiting"
                    );
                    sleep(retry_after).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for RateBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateBudget")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
