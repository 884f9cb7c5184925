use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::debug;

pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling(i64),
}

struct ActivePoll {
    inbound_id: i64,
    interval: Interval,
}

/// Owner of the one recurring stats refresh.
///
/// The timer lives only inside `active`; starting a new poll drops the old
/// interval first, so there is never more than one armed.
pub struct PollScheduler {
    period: Duration,
    active: Option<ActivePoll>,
}

impl PollScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            active: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> PollState {
        match &self.active {
            Some(active) => PollState::Polling(active.inbound_id),
            None => PollState::Idle,
        }
    }

    pub fn is_polling(&self, inbound_id: i64) -> bool {
        self.state() == PollState::Polling(inbound_id)
    }

    pub fn live_timers(&self) -> usize {
        usize::from(self.active.is_some())
    }

    /// Arm the timer for `inbound_id`; the first tick fires one period from now.
    pub fn start(&mut self, inbound_id: i64) {
        self.stop();

        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.active = Some(ActivePoll {
            inbound_id,
            interval,
        });
        debug!(inbound_id, period = ?self.period, "Stats polling armed");
    }

    /// Cancel the active timer, returning the inbound it was polling.
    pub fn stop(&mut self) -> Option<i64> {
        let stopped = self.active.take().map(|active| active.inbound_id);
        if let Some(inbound_id) = stopped {
            debug!(inbound_id, "Stats polling stopped");
        }
        stopped
    }

    pub fn stop_if(&mut self, inbound_id: i64) -> bool {
        if self.is_polling(inbound_id) {
            self.stop();
            true
        } else {
            false
        }
    }

    /// Resolve on the next tick with the polled inbound. Pending forever while idle.
    ///
    /// Cancel safe, so it can sit in a `select!` next to user input.
    pub async fn tick(&mut self) -> i64 {
        match self.active.as_mut() {
            Some(active) => {
                active.interval.tick().await;
                active.inbound_id
            }
            None => std::future::pending().await,
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_PERIOD)
    }
}
