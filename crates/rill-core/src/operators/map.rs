//! Value transform

use std::sync::Arc;

use crate::disposable::BoxDisposable;
use crate::event::Event;
use crate::stream::{Stream, Subscriber};

/// Stream transforming every value of its source
///
/// Terminal events pass through unchanged, and the returned handle is the
/// source's own, so disposing it disposes the source subscription.
pub struct Map<S, F> {
    source: S,
    transform: Arc<F>,
}

impl<S, F> Map<S, F> {
    pub fn new(source: S, transform: F) -> Self {
        Self {
            source,
            transform: Arc::new(transform),
        }
    }
}

impl<S, F, B> Stream for Map<S, F>
where
    S: Stream,
    B: Send + 'static,
    F: Fn(S::Value) -> B + Send + Sync + 'static,
{
    type Value = B;
    type Error = S::Error;

    fn subscribe<Sub>(&self, mut subscriber: Sub) -> Option<BoxDisposable>
    where
        Sub: Subscriber<B, S::Error> + 'static,
    {
        let transform = self.transform.clone();
        self.source.subscribe(move |event: Event<S::Value, S::Error>| {
            subscriber.send(event.map(&*transform))
        })
    }
}
