//! Subscription state machine
//!
//! One `Subscription` exists per `subscribe` call. It owns the consumer and the
//! producer's cleanup handle, and gates every delivery so that:
//! - at most one terminal event reaches the consumer, and it is the last one
//! - nothing is delivered after termination or disposal
//! - the cleanup handle is disposed exactly once, even when it is bound late
//!
//! Deliveries are serialized. A `send` or `dispose` that arrives while another
//! delivery is in flight (re-entrantly from the consumer, or from another
//! thread) is queued and drained by the delivering context. The lock is never
//! held while consumer or cleanup code runs.

use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::disposable::{BoxDisposable, Disposable};
use crate::event::Event;
use crate::stream::Subscriber;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Errors raised by subscription bookkeeping
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("subscription {0} already has an upstream handle bound")]
    AlreadyBound(u64),
}

/// Lifecycle of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Consumer present, no upstream handle yet
    Active,
    /// Consumer present, upstream handle attached
    Bound,
    /// Terminal event accepted or disposal requested; nothing more is delivered
    Terminated,
}

struct State<V, E> {
    phase: Phase,
    consumer: Option<Box<dyn Subscriber<V, E>>>,
    upstream: Option<BoxDisposable>,
    bound: bool,
    /// Events accepted but not yet handed to the consumer
    queue: VecDeque<Event<V, E>>,
    /// Some context is currently draining `queue`
    delivering: bool,
}

/// Per-subscribe state machine
pub struct Subscription<V, E> {
    id: u64,
    state: Mutex<State<V, E>>,
}

impl<V, E> Subscription<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    pub fn new<S>(subscriber: S) -> Self
    where
        S: Subscriber<V, E> + 'static,
    {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        trace!(subscription = id, "Subscription created");
        Self {
            id,
            state: Mutex::new(State {
                phase: Phase::Active,
                consumer: Some(Box::new(subscriber)),
                upstream: None,
                bound: false,
                queue: VecDeque::new(),
                delivering: false,
            }),
        }
    }

    /// Process-unique id, used in log records
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn is_terminated(&self) -> bool {
        self.phase() == Phase::Terminated
    }

    /// Deliver an event from the producer.
    ///
    /// No-op once terminated. A terminal event terminates the subscription,
    /// releases the consumer after it has seen the event, and disposes the
    /// upstream handle if one is bound.
    pub fn send(&self, event: Event<V, E>) {
        let mut state = self.state.lock();
        if state.phase == Phase::Terminated {
            trace!(
                subscription = self.id,
                event = event.kind(),
                "Dropping event after termination"
            );
            return;
        }
        if event.is_terminal() {
            debug!(
                subscription = self.id,
                event = event.kind(),
                "Subscription terminated by producer"
            );
            state.phase = Phase::Terminated;
        }
        state.queue.push_back(event);
        if state.delivering {
            return;
        }
        state.delivering = true;
        self.drain(state);
    }

    /// Attach the producer's cleanup handle.
    ///
    /// If the subscription already terminated, the handle is disposed on the
    /// spot instead of being stored. Only one handle may ever be bound; a
    /// second one is disposed and reported as an error.
    pub fn bind(&self, handle: BoxDisposable) -> Result<(), SubscriptionError> {
        let mut state = self.state.lock();
        if state.bound {
            drop(state);
            warn!(subscription = self.id, "Rejecting second upstream handle");
            handle.dispose();
            return Err(SubscriptionError::AlreadyBound(self.id));
        }
        state.bound = true;

        if state.phase == Phase::Terminated {
            drop(state);
            debug!(
                subscription = self.id,
                "Upstream handle arrived after termination, disposing"
            );
            handle.dispose();
            return Ok(());
        }

        state.upstream = Some(handle);
        state.phase = Phase::Bound;
        Ok(())
    }

    /// Hand queued events to the consumer until the queue is empty or a
    /// terminal event has been delivered. Caller must have set `delivering`.
    fn drain(&self, mut state: MutexGuard<'_, State<V, E>>) {
        loop {
            let Some(event) = state.queue.pop_front() else {
                state.delivering = false;
                return;
            };
            let Some(mut consumer) = state.consumer.take() else {
                state.queue.clear();
                state.delivering = false;
                return;
            };

            let terminal = event.is_terminal();
            trace!(subscription = self.id, event = event.kind(), "Delivering");
            MutexGuard::unlocked(&mut state, || {
                let mut guard = PanicGuard {
                    subscription: self,
                    armed: true,
                };
                consumer.send(event);
                guard.armed = false;
            });

            if terminal {
                state.queue.clear();
                state.delivering = false;
                let upstream = state.upstream.take();
                drop(state);
                drop(consumer);
                if let Some(upstream) = upstream {
                    debug!(subscription = self.id, "Disposing upstream handle");
                    upstream.dispose();
                }
                return;
            }

            state.consumer = Some(consumer);
        }
    }
}

/// Terminates the subscription if the consumer unwinds out of a delivery.
///
/// Runs while the state lock is released, before the unwind re-acquires it.
struct PanicGuard<'a, V, E> {
    subscription: &'a Subscription<V, E>,
    armed: bool,
}

impl<V, E> Drop for PanicGuard<'_, V, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.subscription.state.lock();
        warn!(
            subscription = self.subscription.id,
            "Consumer panicked, terminating subscription"
        );
        state.phase = Phase::Terminated;
        state.queue.clear();
        state.delivering = false;
        let upstream = state.upstream.take();
        drop(state);
        if let Some(upstream) = upstream {
            upstream.dispose();
        }
    }
}

impl<V, E> Disposable for Subscription<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    /// Cancel from the holder's side.
    ///
    /// The consumer observes a synthetic `Disposed` event; values still queued
    /// behind an in-flight delivery are dropped.
    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.phase == Phase::Terminated {
            return;
        }
        debug!(subscription = self.id, "Subscription disposed");
        state.phase = Phase::Terminated;
        state.queue.clear();
        state.queue.push_back(Event::Disposed);

        if state.delivering {
            // The delivering context will hand over `Disposed`; stop the
            // producer now rather than after its current callback returns
            let upstream = state.upstream.take();
            drop(state);
            if let Some(upstream) = upstream {
                upstream.dispose();
            }
            return;
        }
        state.delivering = true;
        self.drain(state);
    }
}

impl<V, E> std::fmt::Debug for Subscription<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("phase", &self.state.lock().phase)
            .finish()
    }
}

/// Delivery callback handed to producers
///
/// Cheap to clone and safe to move to other threads; every clone feeds the
/// same subscription (or the same gate, for direct sources).
pub struct Sink<V, E> {
    deliver: Arc<dyn Fn(Event<V, E>) + Send + Sync>,
}

impl<V, E> Sink<V, E> {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(Event<V, E>) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn send(&self, event: Event<V, E>) {
        (self.deliver)(event);
    }

    pub fn value(&self, value: V) {
        self.send(Event::Value(value));
    }

    pub fn complete(&self) {
        self.send(Event::Completed);
    }

    pub fn fail(&self, error: E) {
        self.send(Event::Failed(error));
    }
}

impl<V, E> Sink<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    /// Sink feeding a subscription's `send`
    pub fn to(subscription: Arc<Subscription<V, E>>) -> Self {
        Self::new(move |event| subscription.send(event))
    }
}

impl<V, E> Clone for Sink<V, E> {
    fn clone(&self) -> Self {
        Self {
            deliver: self.deliver.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposable::BlockDisposable;
    use std::sync::atomic::AtomicUsize;

    type Log = Arc<Mutex<Vec<Event<i32, String>>>>;

    fn recording() -> (Log, impl FnMut(Event<i32, String>) + Send + 'static) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        (log, move |event: Event<i32, String>| l.lock().push(event))
    }

    fn counting_handle() -> (Arc<AtomicUsize>, BoxDisposable) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = Box::new(BlockDisposable::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        (count, handle)
    }

    #[test]
    fn test_phases() {
        let (_log, consumer) = recording();
        let sub = Subscription::<i32, String>::new(consumer);
        assert_eq!(sub.phase(), Phase::Active);

        let (_count, handle) = counting_handle();
        sub.bind(handle).unwrap();
        assert_eq!(sub.phase(), Phase::Bound);

        sub.send(Event::Completed);
        assert_eq!(sub.phase(), Phase::Terminated);
        assert!(sub.is_terminated());
    }

    #[test]
    fn test_nothing_after_terminal() {
        let (log, consumer) = recording();
        let sub = Subscription::<i32, String>::new(consumer);

        sub.send(Event::Value(1));
        sub.send(Event::Failed("boom".to_string()));
        sub.send(Event::Value(2));
        sub.send(Event::Completed);
        sub.dispose();

        assert_eq!(
            *log.lock(),
            vec![Event::Value(1), Event::Failed("boom".to_string())]
        );
    }

    #[test]
    fn test_dispose_delivers_disposed_once() {
        let (log, consumer) = recording();
        let sub = Subscription::<i32, String>::new(consumer);
        let (count, handle) = counting_handle();
        sub.bind(handle).unwrap();

        sub.send(Event::Value(1));
        sub.dispose();
        sub.dispose();
        sub.send(Event::Value(2));

        assert_eq!(*log.lock(), vec![Event::Value(1), Event::Disposed]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_terminal_disposes_bound_upstream() {
        let (_log, consumer) = recording();
        let sub = Subscription::<i32, String>::new(consumer);
        let (count, handle) = counting_handle();
        sub.bind(handle).unwrap();

        sub.send(Event::Completed);
        sub.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_bind_after_dispose_disposes_handle() {
        let (log, consumer) = recording();
        let sub = Subscription::<i32, String>::new(consumer);
        sub.dispose();

        let (count, handle) = counting_handle();
        sub.bind(handle).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock(), vec![Event::Disposed]);
    }

    #[test]
    fn test_late_bind_after_completion_disposes_handle() {
        let (_log, consumer) = recording();
        let sub = Subscription::<i32, String>::new(consumer);
        sub.send(Event::Value(1));
        sub.send(Event::Completed);

        let (count, handle) = counting_handle();
        sub.bind(handle).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_bind_rejected() {
        let (_log, consumer) = recording();
        let sub = Subscription::<i32, String>::new(consumer);
        let (first, a) = counting_handle();
        let (second, b) = counting_handle();

        sub.bind(a).unwrap();
        assert_eq!(sub.bind(b), Err(SubscriptionError::AlreadyBound(sub.id())));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        sub.dispose();
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_dispose_from_consumer() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Arc<Subscription<i32, String>>>>> =
            Arc::new(Mutex::new(None));

        let l = log.clone();
        let s = slot.clone();
        let sub = Arc::new(Subscription::new(move |event: Event<i32, String>| {
            let is_first_value = event == Event::Value(1);
            l.lock().push(event);
            if is_first_value {
                let me = s.lock().clone();
                if let Some(me) = me {
                    me.dispose();
                }
            }
        }));
        *slot.lock() = Some(sub.clone());
        let (count, handle) = counting_handle();
        sub.bind(handle).unwrap();

        sub.send(Event::Value(1));
        sub.send(Event::Value(2));

        assert_eq!(*log.lock(), vec![Event::Value(1), Event::Disposed]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        slot.lock().take();
    }

    #[test]
    fn test_reentrant_send_is_queued_in_order() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Sink<i32, String>>>> = Arc::new(Mutex::new(None));

        let l = log.clone();
        let s = slot.clone();
        let sub = Arc::new(Subscription::new(move |event: Event<i32, String>| {
            let echo = match &event {
                Event::Value(n) if *n < 3 => Some(*n + 1),
                _ => None,
            };
            l.lock().push(event);
            let sink = s.lock().clone();
            if let (Some(next), Some(sink)) = (echo, sink) {
                sink.value(next);
                if next == 3 {
                    sink.complete();
                }
            }
        }));
        *slot.lock() = Some(Sink::to(sub.clone()));

        sub.send(Event::Value(1));

        assert_eq!(
            *log.lock(),
            vec![
                Event::Value(1),
                Event::Value(2),
                Event::Value(3),
                Event::Completed
            ]
        );
        slot.lock().take();
    }

    #[test]
    fn test_panicking_consumer_terminates() {
        let (cleanups, handle) = counting_handle();
        let sub = Subscription::<i32, String>::new(|event: Event<i32, String>| {
            if event == Event::Value(1) {
                panic!("consumer failed");
            }
        });
        sub.bind(handle).unwrap();

        let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sub.send(Event::Value(1))
        }));
        assert!(delivered.is_err());
        assert!(sub.is_terminated());
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        for n in 2..100 {
            sub.send(Event::Value(n));
        }
        sub.dispose();

        let state = sub.state.lock();
        assert!(state.queue.is_empty());
        assert!(!state.delivering);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sink_helpers() {
        let (log, consumer) = recording();
        let sink = Sink::to(Arc::new(Subscription::<i32, String>::new(consumer)));
        let other = sink.clone();

        sink.value(5);
        other.fail("nope".to_string());
        sink.complete();

        assert_eq!(
            *log.lock(),
            vec![Event::Value(5), Event::Failed("nope".to_string())]
        );
    }
}
