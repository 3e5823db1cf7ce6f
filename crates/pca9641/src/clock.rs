use embassy_time::{Duration, Instant};

/// Monotonic time source used to bound arbitration.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Point in time after which polling stops.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline(Instant);

impl Deadline {
    pub(crate) fn after<C: Clock>(clock: &C, timeout: Duration) -> Self {
        Self(clock.now() + timeout)
    }

    pub(crate) fn expired<C: Clock>(&self, clock: &C) -> bool {
        clock.now() >= self.0
    }
}

/// Clock backed by the global embassy time driver.
#[cfg(feature = "time")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "time")]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
