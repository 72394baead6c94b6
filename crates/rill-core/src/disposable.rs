//! Disposables
//!
//! Idempotent cancellation and cleanup handles. Calling `dispose()` any number
//! of times has the same observable effect as calling it once.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Capability to cancel work or release a resource
pub trait Disposable: Send + Sync {
    /// Cancel/clean up. Idempotent.
    fn dispose(&self);
}

/// Type-erased disposable handle
pub type BoxDisposable = Box<dyn Disposable>;

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
    fn dispose(&self) {
        (**self).dispose();
    }
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&self) {
        (**self).dispose();
    }
}

type Action = Box<dyn FnOnce() + Send>;

/// Disposable wrapping an arbitrary cleanup action, run at most once
pub struct BlockDisposable {
    disposed: AtomicBool,
    action: Mutex<Option<Action>>,
}

impl BlockDisposable {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            disposed: AtomicBool::new(false),
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Disposable for BlockDisposable {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Take before running so the lock is not held across user code
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }
}

impl std::fmt::Debug for BlockDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDisposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Default)]
struct CompositeState {
    disposed: bool,
    children: Vec<BoxDisposable>,
}

/// Disposable owning a growing set of children
///
/// Children are disposed in insertion order. A child added after the
/// composite was disposed is disposed on the spot instead of being stored.
#[derive(Default)]
pub struct CompositeDisposable {
    state: Mutex<CompositeState>,
}

impl CompositeDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child, or dispose it immediately if this composite is already disposed
    pub fn add<D>(&self, child: D)
    where
        D: Disposable + 'static,
    {
        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            debug!("Composite already disposed, disposing late child");
            child.dispose();
            return;
        }
        state.children.push(Box::new(child));
    }

    /// Number of children currently held
    pub fn len(&self) -> usize {
        self.state.lock().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        let children = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.children)
        };
        debug!("Disposing composite with {} children", children.len());
        for child in children {
            child.dispose();
        }
    }
}

/// Build a composite from a list of optional handles; `None`s are skipped
impl FromIterator<Option<BoxDisposable>> for CompositeDisposable {
    fn from_iter<I: IntoIterator<Item = Option<BoxDisposable>>>(iter: I) -> Self {
        let children = iter.into_iter().flatten().collect();
        Self {
            state: Mutex::new(CompositeState {
                disposed: false,
                children,
            }),
        }
    }
}

impl std::fmt::Debug for CompositeDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CompositeDisposable")
            .field("disposed", &state.disposed)
            .field("children", &state.children.len())
            .finish()
    }
}
