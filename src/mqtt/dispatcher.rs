//! Topic to subscriber routing
//!
//! Exact-match lookup only, one subscriber per topic. Registration order is
//! kept so callers can list subscribers the way they were configured.

use indexmap::IndexMap;
use tracing::{debug, warn};

/// Receives inbound payloads for one topic. `None` means the connection was
/// lost.
pub trait Subscriber {
    fn notify(&mut self, payload: Option<&str>);
}

impl<F> Subscriber for F
where
    F: FnMut(Option<&str>),
{
    fn notify(&mut self, payload: Option<&str>) {
        self(payload)
    }
}

#[derive(Debug)]
pub struct TopicDispatcher<S> {
    subscribers: IndexMap<String, S>,
}

impl<S> Default for TopicDispatcher<S> {
    fn default() -> Self {
        Self {
            subscribers: IndexMap::new(),
        }
    }
}

impl<S> TopicDispatcher<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `subscriber` for `topic`. A second registration for the same
    /// topic replaces the first and hands it back.
    pub fn register(&mut self, topic: impl Into<String>, subscriber: S) -> Option<S> {
        let topic = topic.into();
        let previous = self.subscribers.insert(topic.clone(), subscriber);
        if previous.is_some() {
            warn!("Topic '{}' registered twice, keeping the latest subscriber", topic);
        } else {
            debug!("Registered subscriber for '{}'", topic);
        }
        previous
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.subscribers.keys().map(String::as_str)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = (&str, &S)> {
        self.subscribers.iter().map(|(topic, s)| (topic.as_str(), s))
    }

    pub fn get(&self, topic: &str) -> Option<&S> {
        self.subscribers.get(topic)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<S: Subscriber> TopicDispatcher<S> {
    /// Hands `payload` to the subscriber of `topic`. Returns false when no
    /// subscriber is registered; the message is dropped.
    pub fn deliver(&mut self, topic: &str, payload: &str) -> bool {
        match self.subscribers.get_mut(topic) {
            Some(subscriber) => {
                subscriber.notify(Some(payload));
                true
            }
            None => {
                debug!("Dropping message for unregistered topic '{}'", topic);
                false
            }
        }
    }

    /// Tells every subscriber the connection is gone.
    pub fn disconnect_all(&mut self) {
        for subscriber in self.subscribers.values_mut() {
            subscriber.notify(None);
        }
    }
}
