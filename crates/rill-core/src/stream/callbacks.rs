//! Callback-style subscriber
//!
//! Lets callers subscribe with up to four independent callbacks instead of a
//! single event handler. Omitted callbacks simply ignore their events.

use super::Subscriber;
use crate::event::Event;

/// Subscriber dispatching each event kind to its own optional callback
pub struct Callbacks<V, E> {
    value: Option<Box<dyn FnMut(V) + Send>>,
    failed: Option<Box<dyn FnOnce(E) + Send>>,
    completed: Option<Box<dyn FnOnce() + Send>>,
    disposed: Option<Box<dyn FnOnce() + Send>>,
}

impl<V, E> Callbacks<V, E> {
    pub fn new() -> Self {
        Self {
            value: None,
            failed: None,
            completed: None,
            disposed: None,
        }
    }

    pub fn on_value<F>(mut self, f: F) -> Self
    where
        F: FnMut(V) + Send + 'static,
    {
        self.value = Some(Box::new(f));
        self
    }

    pub fn on_failed<F>(mut self, f: F) -> Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        self.failed = Some(Box::new(f));
        self
    }

    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.completed = Some(Box::new(f));
        self
    }

    pub fn on_disposed<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.disposed = Some(Box::new(f));
        self
    }
}

impl<V, E> Default for Callbacks<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Subscriber<V, E> for Callbacks<V, E> {
    fn send(&mut self, event: Event<V, E>) {
        match event {
            Event::Value(v) => {
                if let Some(on_value) = self.value.as_mut() {
                    on_value(v);
                }
            }
            // Terminal callbacks are consumed; a terminal event only comes once
            Event::Failed(err) => {
                if let Some(on_failed) = self.failed.take() {
                    on_failed(err);
                }
            }
            Event::Completed => {
                if let Some(on_completed) = self.completed.take() {
                    on_completed();
                }
            }
            Event::Disposed => {
                if let Some(on_disposed) = self.disposed.take() {
                    on_disposed();
                }
            }
        }
    }
}
