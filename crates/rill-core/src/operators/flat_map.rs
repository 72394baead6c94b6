//! Stream-of-streams flattening
//!
//! Every outer value is turned into an inner stream which is subscribed right
//! away. All events of the outer and inner streams are merged into the one
//! downstream consumer as they arrive, terminal events included: an inner
//! `Completed` reaches downstream verbatim, and the outer `Completed` does not
//! wait for inner streams still in flight. Whichever terminal event arrives
//! first ends the downstream subscription.

use std::sync::Arc;
use tracing::debug;

use crate::disposable::{BoxDisposable, CompositeDisposable, Disposable};
use crate::event::Event;
use crate::stream::{create_direct, Stream, Subscriber};
use crate::subscription::Sink;

/// Stream subscribing to one inner stream per outer value
///
/// The outer subscription and every inner one are tracked in a single
/// [`CompositeDisposable`]; disposing the returned handle cancels them all.
/// The composite is also disposed once downstream has seen its terminal
/// event, since nothing more can be delivered.
pub struct FlatMap<S, F> {
    source: Arc<S>,
    transform: Arc<F>,
}

impl<S, F> FlatMap<S, F> {
    pub fn new(source: S, transform: F) -> Self {
        Self {
            source: Arc::new(source),
            transform: Arc::new(transform),
        }
    }
}

impl<S, F, U> Stream for FlatMap<S, F>
where
    S: Stream,
    U: Stream<Error = S::Error>,
    F: Fn(S::Value) -> U + Send + Sync + 'static,
{
    type Value = U::Value;
    type Error = S::Error;

    fn subscribe<Sub>(&self, subscriber: Sub) -> Option<BoxDisposable>
    where
        Sub: Subscriber<U::Value, S::Error> + 'static,
    {
        let source = self.source.clone();
        let transform = self.transform.clone();

        // Downstream gating comes from the direct source's latch; every
        // upstream handle goes into the composite returned to the caller
        create_direct(move |sink: Sink<U::Value, S::Error>| {
            let composite = Arc::new(CompositeDisposable::new());

            let outer = {
                let composite = composite.clone();
                let transform = transform.clone();
                source.subscribe(move |event: Event<S::Value, S::Error>| {
                    match event.cast::<U::Value>() {
                        Err(value) => {
                            let inner = subscribe_inner(transform(value), &sink, &composite);
                            if let Some(handle) = inner {
                                composite.add(handle);
                            }
                        }
                        Ok(terminal) => {
                            debug!("Outer stream ended with {}", terminal.kind());
                            sink.send(terminal);
                            composite.dispose();
                        }
                    }
                })
            };
            if let Some(handle) = outer {
                composite.add(handle);
            }

            Some(Box::new(composite) as BoxDisposable)
        })
        .subscribe(subscriber)
    }
}

/// Subscribe to one inner stream, forwarding everything it emits downstream
fn subscribe_inner<U>(
    inner: U,
    sink: &Sink<U::Value, U::Error>,
    composite: &Arc<CompositeDisposable>,
) -> Option<BoxDisposable>
where
    U: Stream,
{
    let sink = sink.clone();
    let composite = composite.clone();
    inner.subscribe(move |event: Event<U::Value, U::Error>| {
        let terminal = event.is_terminal();
        if terminal {
            debug!("Inner stream ended with {}", event.kind());
        }
        sink.send(event);
        if terminal {
            composite.dispose();
        }
    })
}
