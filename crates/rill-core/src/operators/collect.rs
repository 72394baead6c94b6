//! Buffer-to-sequence

use crate::disposable::BoxDisposable;
use crate::event::Event;
use crate::stream::{Stream, Subscriber};

/// Stream buffering every value of its source into one `Vec`
///
/// On completion the buffer is emitted as a single value followed by
/// `Completed`. On failure the buffer is discarded and only the failure is
/// forwarded; no partial result is ever emitted.
pub struct Collect<S> {
    source: S,
}

impl<S> Collect<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S> Stream for Collect<S>
where
    S: Stream,
{
    type Value = Vec<S::Value>;
    type Error = S::Error;

    fn subscribe<Sub>(&self, mut subscriber: Sub) -> Option<BoxDisposable>
    where
        Sub: Subscriber<Vec<S::Value>, S::Error> + 'static,
    {
        let mut values = Vec::new();
        self.source.subscribe(move |event: Event<S::Value, S::Error>| match event {
            Event::Value(v) => values.push(v),
            Event::Failed(err) => {
                values.clear();
                subscriber.send(Event::Failed(err));
            }
            Event::Completed => {
                subscriber.send(Event::Value(std::mem::take(&mut values)));
                subscriber.send(Event::Completed);
            }
            Event::Disposed => subscriber.send(Event::Disposed),
        })
    }
}
