use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Keep-alive clock, only exists while connected
#[derive(Debug)]
pub(crate) struct Heartbeat {
    period: Duration,
    interval: Option<Interval>,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// first tick is one period after start
    pub fn start(&mut self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        log::trace!("Heartbeat started, every {:?}", self.period);
    }

    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            log::trace!("Heartbeat stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    /// Wait next tick, never finish while stopped
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => futures_util::future::pending().await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tick_after_one_period() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30));
        heartbeat.start();

        let start = Instant::now();
        heartbeat.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(30));

        heartbeat.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_never_ticks() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(1));
        heartbeat.start();
        heartbeat.stop();

        assert!(!heartbeat.is_active());

        let result = tokio::time::timeout(Duration::from_secs(10), heartbeat.tick()).await;
        assert!(result.is_err());
    }
}
