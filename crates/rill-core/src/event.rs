//! Stream events
//!
//! Everything that can happen on a stream, as seen by a single consumer.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Event delivered to a subscriber
///
/// `Completed`, `Failed` and `Disposed` are terminal and mutually exclusive:
/// a subscription observes at most one of them, and nothing after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event<V, E> {
    /// A value produced by the stream
    Value(V),
    /// The stream finished normally
    Completed,
    /// The stream finished with an error
    Failed(E),
    /// The subscription was cancelled by its holder
    Disposed,
}

impl<V, E> Event<V, E> {
    /// Whether this event ends the subscription
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Value(_))
    }

    /// Short variant name, for log records
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Value(_) => "value",
            Event::Completed => "completed",
            Event::Failed(_) => "failed",
            Event::Disposed => "disposed",
        }
    }

    /// Borrow the value payload, if any
    pub fn value(&self) -> Option<&V> {
        match self {
            Event::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Transform the value payload; terminal variants pass through unchanged
    pub fn map<U, F>(self, transform: F) -> Event<U, E>
    where
        F: FnOnce(V) -> U,
    {
        match self {
            Event::Value(v) => Event::Value(transform(v)),
            Event::Completed => Event::Completed,
            Event::Failed(err) => Event::Failed(err),
            Event::Disposed => Event::Disposed,
        }
    }

    /// Transform the error payload; every other variant passes through unchanged
    pub fn map_err<F2, F>(self, transform: F) -> Event<V, F2>
    where
        F: FnOnce(E) -> F2,
    {
        match self {
            Event::Value(v) => Event::Value(v),
            Event::Completed => Event::Completed,
            Event::Failed(err) => Event::Failed(transform(err)),
            Event::Disposed => Event::Disposed,
        }
    }

    /// Re-type a terminal event for another value type.
    ///
    /// Returns the payload back as `Err` when called on a `Value`.
    pub fn cast<U>(self) -> Result<Event<U, E>, V> {
        match self {
            Event::Value(v) => Err(v),
            Event::Completed => Ok(Event::Completed),
            Event::Failed(err) => Ok(Event::Failed(err)),
            Event::Disposed => Ok(Event::Disposed),
        }
    }
}

/// Error type of streams that cannot fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Never {}

impl Serialize for Never {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        match *self {}
    }
}

impl<'de> Deserialize<'de> for Never {
    fn deserialize<D: Deserializer<'de>>(_deserializer: D) -> Result<Self, D::Error> {
        Err(D::Error::custom("stream cannot fail, no error payload is valid"))
    }
}

impl fmt::Display for Never {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl std::error::Error for Never {}
