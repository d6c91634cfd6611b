use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Position refresh cadence of an open player
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic refresh schedule owned by a playback session.
///
/// Awaited from the same loop that handles user input, so ticks never
/// overlap with each other or with commands. A stopped ticker never fires.
#[derive(Debug)]
pub struct Ticker {
    interval: Option<Interval>,
}

impl Ticker {
    /// Starts ticking one period from now
    pub fn start(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval: Some(interval),
        }
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Completes at the next tick; pends forever once stopped
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let mut ticker = Ticker::start(TICK_INTERVAL);
        let started = Instant::now();

        ticker.tick().await;
        assert_eq!(started.elapsed(), TICK_INTERVAL);
        ticker.tick().await;
        assert_eq!(started.elapsed(), TICK_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_ticker_never_fires() {
        let mut ticker = Ticker::start(TICK_INTERVAL);
        ticker.stop();
        assert!(!ticker.is_running());

        let fired = tokio::time::timeout(Duration::from_secs(10), ticker.tick()).await;
        assert!(fired.is_err());
    }
}
