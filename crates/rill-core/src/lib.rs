//! Rill core
//!
//! A minimal reactive event stream: a producer emits typed events to exactly
//! one consumer per subscription, with one protocol for cancellation and
//! cleanup.
//!
//! - [`Event`] - what can happen on a stream
//! - [`Disposable`] - idempotent cancellation/cleanup
//! - [`Subscription`] - per-subscribe state machine gating delivery
//! - [`Stream`] - the producer contract plus the concrete sources
//! - operators ([`StreamExt::map`], [`StreamExt::collect`], [`StreamExt::flat_map`])

pub mod disposable;
pub mod event;
pub mod operators;
pub mod stream;
pub mod subscription;

pub use disposable::{BlockDisposable, BoxDisposable, CompositeDisposable, Disposable};
pub use event::{Event, Never};
pub use operators::{Collect, FlatMap, Map};
pub use stream::{
    create, create_direct, just, BasicStream, Callbacks, DirectStream, Just, Stream, StreamExt,
    Subscriber,
};
pub use subscription::{Phase, Sink, Subscription, SubscriptionError};
