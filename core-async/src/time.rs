//! Time-related abstractions.
//!
//! Native targets use `tokio::time`, which honours a paused test clock.
//! WASM targets use `gloo-timers` (`setTimeout`/`setInterval`) and
//! `performance.now()`.

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::{sleep, timeout, Instant};

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::error::Elapsed as TimeoutError;

pub use std::time::Duration;

#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await
}

/// Monotonic instant backed by `performance.now()`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant {
    millis: u64,
}

#[cfg(target_arch = "wasm32")]
impl Instant {
    pub fn now() -> Self {
        let millis = web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now() as u64)
            .unwrap_or_default();
        Self { millis }
    }

    pub fn elapsed(&self) -> Duration {
        Self::now().saturating_duration_since(*self)
    }

    pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(earlier.millis))
    }
}

#[cfg(target_arch = "wasm32")]
impl std::ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Self::Output {
        Instant {
            millis: self.millis.saturating_add(duration.as_millis() as u64),
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, TimeoutError>
where
    F: std::future::Future,
{
    let sleep_fut = sleep(duration);

    futures::pin_mut!(future);
    futures::pin_mut!(sleep_fut);

    match futures::future::select(future, sleep_fut).await {
        futures::future::Either::Left((output, _)) => Ok(output),
        futures::future::Either::Right(_) => Err(TimeoutError),
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError;

#[cfg(target_arch = "wasm32")]
impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline has elapsed")
    }
}

#[cfg(target_arch = "wasm32")]
impl std::error::Error for TimeoutError {}

/// Fixed-period ticker whose schedule survives dropped `tick()` futures.
///
/// The first tick completes one full period after creation. A late tick
/// delays the following ones instead of bursting to catch up. Periods below
/// one millisecond are raised to one millisecond.
pub struct Interval {
    #[cfg(not(target_arch = "wasm32"))]
    inner: tokio::time::Interval,
    #[cfg(target_arch = "wasm32")]
    inner: gloo_timers::future::IntervalStream,
}

pub fn interval(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));

    #[cfg(not(target_arch = "wasm32"))]
    {
        let mut inner = tokio::time::interval_at(Instant::now() + period, period);
        inner.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Interval { inner }
    }

    #[cfg(target_arch = "wasm32")]
    {
        let millis = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
        Interval {
            inner: gloo_timers::future::IntervalStream::new(millis),
        }
    }
}

impl Interval {
    /// Completes at the next scheduled tick. Cancel safe.
    pub async fn tick(&mut self) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.inner.tick().await;
        }

        #[cfg(target_arch = "wasm32")]
        {
            use futures::StreamExt;
            let _ = self.inner.next().await;
        }
    }
}
