//! Stream capability
//!
//! The producer-side contract plus the consumer trait. Concrete sources live in
//! [`sources`], the callback-style convenience subscription in [`callbacks`].

mod callbacks;
mod sources;

pub use callbacks::Callbacks;
pub use sources::{create, create_direct, just, BasicStream, DirectStream, Just};

use crate::disposable::BoxDisposable;
use crate::event::Event;
use crate::operators::{Collect, FlatMap, Map};

/// Receiver of stream events
///
/// Must tolerate any number of calls and is never called again after it has
/// received a terminal event.
pub trait Subscriber<V, E>: Send {
    fn send(&mut self, event: Event<V, E>);
}

impl<V, E, F> Subscriber<V, E> for F
where
    F: FnMut(Event<V, E>) + Send,
{
    fn send(&mut self, event: Event<V, E>) {
        self(event)
    }
}

/// A producer that can be subscribed to
///
/// Each `subscribe` call is independent. The returned handle (if any) cancels
/// that subscription; `None` means no cancelable work remains.
pub trait Stream: Send + Sync + 'static {
    type Value: Send + 'static;
    type Error: Send + 'static;

    fn subscribe<S>(&self, subscriber: S) -> Option<BoxDisposable>
    where
        S: Subscriber<Self::Value, Self::Error> + 'static;
}

/// Operators and conveniences available on every stream
pub trait StreamExt: Stream + Sized {
    /// Transform every value
    fn map<B, F>(self, transform: F) -> Map<Self, F>
    where
        B: Send + 'static,
        F: Fn(Self::Value) -> B + Send + Sync + 'static,
    {
        Map::new(self, transform)
    }

    /// Buffer every value and emit them as one `Vec` on completion
    fn collect(self) -> Collect<Self> {
        Collect::new(self)
    }

    /// Subscribe to a stream per value and merge their events
    fn flat_map<U, F>(self, transform: F) -> FlatMap<Self, F>
    where
        U: Stream<Error = Self::Error>,
        F: Fn(Self::Value) -> U + Send + Sync + 'static,
    {
        FlatMap::new(self, transform)
    }

    /// Subscribe with independent optional callbacks instead of one consumer
    fn subscribe_with(
        &self,
        callbacks: Callbacks<Self::Value, Self::Error>,
    ) -> Option<BoxDisposable> {
        self.subscribe(callbacks)
    }
}

impl<T: Stream> StreamExt for T {}
