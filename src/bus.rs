//! Event delivery into the dispatcher.
//!
//! Transport, discovery and call-out completions happen on their own tasks.
//! They never touch the control block, they post an [`Event`] through an
//! [`EventSender`] and the client consumes events one at a time.

use std::time::Duration;

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    event::Event,
    session::TimerPurpose,
};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: UnboundedSender<Event>,
}

impl EventSender {
    pub fn post(&self, event: Event) -> Result<()> {
        self.sender.send(event).map_err(|_| Error::BusClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub fn channel() -> (EventSender, UnboundedReceiver<Event>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (EventSender { sender }, receiver)
}

/// The single response timer of a session.
///
/// Every start bumps the generation. An expiry carries the generation it was
/// started with so a late expiry of a stopped timer can be told apart.
#[derive(Debug, Default)]
pub struct ResponseTimer {
    purpose: Option<TimerPurpose>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl ResponseTimer {
    pub fn start(&mut self, purpose: TimerPurpose, timeout: Duration, bus: &EventSender) {
        self.stop();
        self.generation += 1;
        self.purpose = Some(purpose);
        let generation = self.generation;
        let bus = bus.clone();
        debug!(?purpose, ?timeout, generation, "response timer started");
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // The session may be gone already
            let _ = bus.post(Event::ResponseTimeout {
                purpose,
                generation,
            });
        }));
    }

    /// Stop the timer. The purpose tag is kept until [`Self::clear_purpose`].
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            trace!(purpose = ?self.purpose, "response timer stopped");
            task.abort();
            self.generation += 1;
        }
    }

    pub fn clear_purpose(&mut self) {
        self.purpose = None;
    }

    pub fn purpose(&self) -> Option<TimerPurpose> {
        self.purpose
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Whether an expiry belongs to the timer as it is now.
    /// Consumes the running state so the expiry is only acted on once.
    pub fn expire(&mut self, purpose: TimerPurpose, generation: u64) -> bool {
        if self.task.is_some() && self.generation == generation && self.purpose == Some(purpose) {
            self.task = None;
            true
        } else {
            false
        }
    }
}

impl Drop for ResponseTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_expiry_is_posted() {
        let (bus, mut receiver) = channel();
        let mut timer = ResponseTimer::default();
        timer.start(TimerPurpose::Abort, Duration::from_millis(5), &bus);
        let Some(Event::ResponseTimeout {
            purpose,
            generation,
        }) = receiver.recv().await
        else {
            panic!("expected a timeout");
        };
        assert_eq!(purpose, TimerPurpose::Abort);
        assert!(timer.expire(purpose, generation));
        // Only once
        assert!(!timer.expire(purpose, generation));
    }

    #[tokio::test]
    async fn test_stopped_timer_expiry_is_stale() {
        let (bus, _receiver) = channel();
        let mut timer = ResponseTimer::default();
        timer.start(TimerPurpose::Stop, Duration::from_secs(60), &bus);
        let generation = timer.generation;
        timer.stop();
        assert!(!timer.expire(TimerPurpose::Stop, generation));
        // The purpose survives a stop
        assert_eq!(timer.purpose(), Some(TimerPurpose::Stop));
        timer.clear_purpose();
        assert_eq!(timer.purpose(), None);
    }
}
