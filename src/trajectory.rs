use std::time::Duration;

use futures_util::stream::Stream;
use num_traits::Float;

use crate::{Error, Setting};

/// Monotonic time since the start of a movement
pub trait Clock {
    fn elapsed(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }
}

/// Clock started at construction, follows the tokio timer
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// exact at t = 0, 0.5 and 1
fn lerp<T: Float>(from: T, to: T, t: T) -> T {
    (T::one() - t) * from + t * to
}

/// Linear movement from `origin` to `destination` over `duration`.
///
/// The position is a function of the clock only, it can be queried any number of times.
#[derive(Debug, Clone)]
pub struct TimeTarget<C> {
    origin: Setting,
    destination: Setting,
    duration: Duration,
    clock: C,
}

impl<C: Clock> TimeTarget<C> {
    pub fn new(
        origin: Setting,
        destination: Setting,
        duration: Duration,
        clock: C,
    ) -> Result<Self, Error> {
        if duration.is_zero() {
            return Err(Error::InvalidDuration(duration));
        }

        Ok(Self {
            origin,
            destination,
            duration,
            clock,
        })
    }

    pub fn origin(&self) -> Setting {
        self.origin
    }

    pub fn destination(&self) -> Setting {
        self.destination
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Position to command now
    pub fn next_position(&self) -> Setting {
        self.position_at(self.clock.elapsed())
    }

    pub fn position_at(&self, elapsed: Duration) -> Setting {
        let t = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0);

        Setting::new(
            lerp(self.origin.pan_percent, self.destination.pan_percent, t),
            lerp(self.origin.tilt_percent, self.destination.tilt_percent, t),
        )
    }

    pub fn is_finished(&self) -> bool {
        self.clock.elapsed() >= self.duration
    }

    /// Head for a new destination starting from the current position.
    ///
    /// `clock` must start counting at the moment of the call.
    pub fn retarget<C2: Clock>(
        &self,
        destination: Setting,
        duration: Duration,
        clock: C2,
    ) -> Result<TimeTarget<C2>, Error> {
        TimeTarget::new(self.next_position(), destination, duration, clock)
    }

    /// Positions sampled every `tick`; the last item is the destination
    pub fn into_stream(self, tick: Duration) -> impl Stream<Item = Setting> {
        let tick = tick.max(Duration::from_millis(1));

        async_stream::stream! {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;

                let finished = self.is_finished();
                let position = if finished {
                    self.destination
                } else {
                    self.next_position()
                };
                yield position;

                if finished {
                    break;
                }
            }
        }
    }
}
