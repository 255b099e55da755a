//! Cancellable timers that report back through the event channel

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::event::{Event, EventSender};

/// Handle to a spawned timer task
///
/// Dropping the handle aborts the timer. A firing that was already queued
/// before the abort still reaches the channel, so receivers check the token
/// carried by the event.
#[derive(Debug)]
pub struct TimerHandle(JoinHandle<()>);

impl TimerHandle {
    /// Stop the timer
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Post `event` once after `delay`
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn after(delay: Duration, events: &EventSender, event: Event) -> TimerHandle {
    let events = events.clone();
    TimerHandle(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events.send(event);
    }))
}

/// Post an event built by `make` every `period`, first firing after one period
///
/// Stops on its own once the receiving side is gone.
#[must_use]
pub fn every<F>(period: Duration, events: &EventSender, make: F) -> TimerHandle
where
    F: Fn() -> Event + Send + 'static,
{
    let events = events.clone();
    TimerHandle(tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            if events.send(make()).is_err() {
                break;
            }
        }
    }))
}
