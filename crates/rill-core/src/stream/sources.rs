//! Concrete sources
//!
//! - `Just`: one value, then completion, synchronously
//! - `BasicStream`: callback-driven producer gated by a `Subscription`
//! - `DirectStream`: callback-driven producer behind a bare terminal latch,
//!   for composing operators that already gate delivery themselves

use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

use super::{Stream, Subscriber};
use crate::disposable::BoxDisposable;
use crate::event::{Event, Never};
use crate::subscription::{Sink, Subscription};

/// Stream emitting a single value and completing
#[derive(Debug, Clone)]
pub struct Just<V> {
    value: V,
}

impl<V> Just<V> {
    pub fn new(value: V) -> Self {
        Self { value }
    }
}

/// `Value(value)` then `Completed`, delivered synchronously on subscribe
pub fn just<V>(value: V) -> Just<V>
where
    V: Clone + Send + Sync + 'static,
{
    Just::new(value)
}

impl<V> Stream for Just<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;
    type Error = Never;

    fn subscribe<S>(&self, mut subscriber: S) -> Option<BoxDisposable>
    where
        S: Subscriber<V, Never> + 'static,
    {
        subscriber.send(Event::Value(self.value.clone()));
        subscriber.send(Event::Completed);
        // Everything already happened; nothing to cancel
        None
    }
}

/// Callback-driven stream
///
/// The producer receives a [`Sink`] and may call it any number of times,
/// synchronously and/or later from any thread, ending with one terminal
/// event (or never, in which case only `dispose()` stops the subscription).
/// It returns an optional handle for its in-flight work, e.g. a timer.
pub struct BasicStream<V, E, F> {
    on_subscribe: F,
    _marker: PhantomData<fn() -> (V, E)>,
}

impl<V, E, F> BasicStream<V, E, F>
where
    F: Fn(Sink<V, E>) -> Option<BoxDisposable> + Send + Sync + 'static,
{
    pub fn new(on_subscribe: F) -> Self {
        Self {
            on_subscribe,
            _marker: PhantomData,
        }
    }
}

/// Build a callback-driven stream from a producer function
pub fn create<V, E, F>(on_subscribe: F) -> BasicStream<V, E, F>
where
    V: Send + 'static,
    E: Send + 'static,
    F: Fn(Sink<V, E>) -> Option<BoxDisposable> + Send + Sync + 'static,
{
    BasicStream::new(on_subscribe)
}

impl<V, E, F> Clone for BasicStream<V, E, F>
where
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            on_subscribe: self.on_subscribe.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V, E, F> Stream for BasicStream<V, E, F>
where
    V: Send + 'static,
    E: Send + 'static,
    F: Fn(Sink<V, E>) -> Option<BoxDisposable> + Send + Sync + 'static,
{
    type Value = V;
    type Error = E;

    fn subscribe<S>(&self, subscriber: S) -> Option<BoxDisposable>
    where
        S: Subscriber<V, E> + 'static,
    {
        let subscription = Arc::new(Subscription::new(subscriber));
        // The producer may emit (and even terminate) before handing back its
        // handle; `bind` disposes a handle that arrives after termination
        if let Some(handle) = (self.on_subscribe)(Sink::to(subscription.clone())) {
            if let Err(err) = subscription.bind(handle) {
                warn!("Producer handle not bound: {}", err);
            }
        }
        Some(Box::new(subscription))
    }
}

/// Callback-driven stream without its own cancellation gate
///
/// Events pass through a terminal latch straight to the consumer, so nothing
/// is delivered after the first terminal event, but disposing the returned
/// handle is left entirely to the producer's own handle: no synthetic
/// `Disposed` is generated here.
pub struct DirectStream<V, E, F> {
    on_subscribe: F,
    _marker: PhantomData<fn() -> (V, E)>,
}

impl<V, E, F> DirectStream<V, E, F>
where
    F: Fn(Sink<V, E>) -> Option<BoxDisposable> + Send + Sync + 'static,
{
    pub fn new(on_subscribe: F) -> Self {
        Self {
            on_subscribe,
            _marker: PhantomData,
        }
    }
}

/// Build a direct (pre-gated) stream from a producer function
pub fn create_direct<V, E, F>(on_subscribe: F) -> DirectStream<V, E, F>
where
    V: Send + 'static,
    E: Send + 'static,
    F: Fn(Sink<V, E>) -> Option<BoxDisposable> + Send + Sync + 'static,
{
    DirectStream::new(on_subscribe)
}

impl<V, E, F> Stream for DirectStream<V, E, F>
where
    V: Send + 'static,
    E: Send + 'static,
    F: Fn(Sink<V, E>) -> Option<BoxDisposable> + Send + Sync + 'static,
{
    type Value = V;
    type Error = E;

    fn subscribe<S>(&self, subscriber: S) -> Option<BoxDisposable>
    where
        S: Subscriber<V, E> + 'static,
    {
        // Never bound and never disposed: only the latch-and-serialize half
        // of the subscription is used
        let latch = Arc::new(Subscription::new(subscriber));
        (self.on_subscribe)(Sink::to(latch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposable::{BlockDisposable, Disposable};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_just() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        let handle = just(100).subscribe(move |event: Event<i32, Never>| e.lock().push(event));

        assert!(handle.is_none());
        assert_eq!(*events.lock(), vec![Event::Value(100), Event::Completed]);
    }

    #[test]
    fn test_just_resubscribes_independently() {
        let stream = just("hi".to_string());
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let c = count.clone();
            stream.subscribe(move |event: Event<String, Never>| {
                if event.value().is_some() {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_basic_sequential() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        create(|sink: Sink<i32, Never>| {
            sink.value(100);
            sink.value(200);
            sink.value(300);
            sink.complete();
            None
        })
        .subscribe(move |event: Event<i32, Never>| e.lock().push(event));

        assert_eq!(
            *events.lock(),
            vec![
                Event::Value(100),
                Event::Value(200),
                Event::Value(300),
                Event::Completed
            ]
        );
    }

    #[test]
    fn test_basic_handle_returned_after_completion_is_disposed() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let c = cleanups.clone();
        let stream = create(move |sink: Sink<i32, Never>| {
            sink.value(1);
            sink.complete();
            let c = c.clone();
            Some(Box::new(BlockDisposable::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })) as BoxDisposable)
        });

        let handle = stream.subscribe(|_event: Event<i32, Never>| {});
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        if let Some(handle) = handle {
            handle.dispose();
        }
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_basic_dispose_delivers_disposed() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        let handle = create(|sink: Sink<i32, String>| {
            sink.value(0);
            None
        })
        .subscribe(move |event: Event<i32, String>| e.lock().push(event));

        let handle = handle.unwrap();
        handle.dispose();
        handle.dispose();
        assert_eq!(*events.lock(), vec![Event::Value(0), Event::Disposed]);
    }

    #[test]
    fn test_direct_latches_after_terminal() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        let handle = create_direct(|sink: Sink<i32, String>| {
            sink.value(1);
            sink.fail("first".to_string());
            sink.value(2);
            sink.complete();
            None
        })
        .subscribe(move |event: Event<i32, String>| e.lock().push(event));

        assert!(handle.is_none());
        assert_eq!(
            *events.lock(),
            vec![Event::Value(1), Event::Failed("first".to_string())]
        );
    }

    #[test]
    fn test_direct_returns_producer_handle() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let c = cleanups.clone();
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        let handle = create_direct(move |_sink: Sink<i32, String>| {
            let c = c.clone();
            Some(Box::new(BlockDisposable::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })) as BoxDisposable)
        })
        .subscribe(move |event: Event<i32, String>| e.lock().push(event));

        handle.unwrap().dispose();
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        // No gate of its own, so no synthetic Disposed
        assert!(events.lock().is_empty());
    }
}
