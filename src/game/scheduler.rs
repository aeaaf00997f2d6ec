//! Periodic tick scheduler owned by the game loop

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Slowest accepted rate, one tick every ten minutes
pub const MIN_RATE: f64 = 1.0 / 600.0;

/// Fastest accepted rate in ticks per second
pub const MAX_RATE: f64 = 1000.0;

/// Tick period for a rate in ticks per second, `None` outside
/// [`MIN_RATE`]..=[`MAX_RATE`]
pub fn period_for(rate: f64) -> Option<Duration> {
    if !(MIN_RATE..=MAX_RATE).contains(&rate) {
        return None;
    }
    Duration::try_from_secs_f64(rate.recip())
        .ok()
        .filter(|period| !period.is_zero())
}

/// Handle to the periodic tick. Changing the period is a restart: the old
/// interval is dropped and the next tick is one full new period away.
#[derive(Debug, Default)]
pub struct Scheduler {
    period: Option<Duration>,
    interval: Option<Interval>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the scheduler. A zero period leaves it stopped.
    pub fn start(&mut self, period: Duration) {
        self.period = Some(period).filter(|period| !period.is_zero());
        self.interval = None;
    }

    pub fn stop(&mut self) {
        self.period = None;
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.period.is_some()
    }

    #[cfg(test)]
    pub(crate) fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Wait for the next tick. Never resolves while stopped.
    pub async fn tick(&mut self) {
        let Some(period) = self.period else {
            return std::future::pending().await;
        };

        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await;
    }
}
