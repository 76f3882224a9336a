//! Delivery of engine events to whoever is watching.
//!
//! crossbeam senders work from the blocking scan workers as well as from
//! async tasks, so the same sender can be handed to either.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Reports events from the scanner and the ingest pipeline
#[derive(Clone)]
pub struct EventSender {
    inner: Option<Sender<Event>>,
}

impl EventSender {
    /// A sender nobody listens to
    pub fn detached() -> Self {
        Self { inner: None }
    }

    /// Never blocks. Events sent after the receiver is dropped are lost.
    pub fn send(&self, event: Event) {
        if let Some(inner) = &self.inner {
            let _ = inner.send(event);
        }
    }
}

pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Blocks for each event until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }

    /// Events already queued, without waiting for more
    pub fn drain(&self) -> Vec<Event> {
        self.inner.try_iter().collect()
    }
}

/// Connected sender and receiver
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (sender, receiver) = unbounded();
    (
        EventSender {
            inner: Some(sender),
        },
        EventReceiver { inner: receiver },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IngestEvent;
    use std::thread;
    use uuid::Uuid;

    #[test]
    fn worker_thread_events_reach_receiver() {
        let (sender, receiver) = event_channel();
        let id = Uuid::new_v4();

        thread::spawn(move || sender.send(Event::Ingest(IngestEvent::Added { id })))
            .join()
            .unwrap();

        assert!(matches!(
            receiver.recv(),
            Some(Event::Ingest(IngestEvent::Added { id: got })) if got == id
        ));
        assert!(receiver.recv().is_none());
    }

    #[test]
    fn detached_sender_discards_events() {
        let sender = EventSender::detached();
        sender.send(Event::Ingest(IngestEvent::Started { size_bytes: 10 }));
    }

    #[test]
    fn drain_returns_only_queued_events() {
        let (sender, receiver) = event_channel();
        sender.send(Event::Ingest(IngestEvent::Started { size_bytes: 1 }));
        sender.send(Event::Ingest(IngestEvent::Undecodable {
            reason: "truncated".to_string(),
        }));

        assert_eq!(receiver.drain().len(), 2);
        assert!(receiver.drain().is_empty());
        drop(sender);
    }
}
