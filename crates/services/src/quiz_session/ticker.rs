use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::events::SessionEvent;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Periodic task posting [`SessionEvent::Tick`] into a session queue.
///
/// The first tick fires one period after spawning. Missed periods are delivered
/// in a burst so the tick count keeps pace with elapsed time. Cancelling or
/// dropping the ticker aborts the task; ticks already queued are left for the
/// session to ignore. The ticker never keeps the queue open on its own; it
/// stops once every other sender is gone.
pub struct Ticker {
    task: JoinHandle<()>,
}

impl Ticker {
    #[must_use]
    pub fn spawn(period: Duration, events: mpsc::WeakUnboundedSender<SessionEvent>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;
                let Some(sender) = events.upgrade() else {
                    break;
                };
                if sender.send(SessionEvent::Tick).is_err() {
                    break;
                }
            }
        });
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    #[tokio::test(start_paused = true)]
    async fn first_tick_arrives_after_one_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = Instant::now();
        let _ticker = Ticker::spawn(TICK_PERIOD, tx.downgrade());

        assert_eq!(rx.recv().await, Some(SessionEvent::Tick));
        assert_eq!(started.elapsed(), TICK_PERIOD);
        assert_eq!(rx.recv().await, Some(SessionEvent::Tick));
        assert_eq!(started.elapsed(), TICK_PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(TICK_PERIOD, tx.downgrade());
        assert_eq!(rx.recv().await, Some(SessionEvent::Tick));

        ticker.cancel();
        time::sleep(TICK_PERIOD * 3).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(Ticker::spawn(TICK_PERIOD, tx.downgrade()));
        time::sleep(TICK_PERIOD * 3).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_alone_does_not_hold_the_queue_open() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _ticker = Ticker::spawn(TICK_PERIOD, tx.downgrade());
        drop(tx);

        assert_eq!(rx.recv().await, None);
    }
}
