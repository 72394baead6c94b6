//! Demonstration producers
//!
//! Sources that exercise the core from the outside: synchronous bursts,
//! tokio timers, and a producer that gives up with an error.

use rill_core::{create, BlockDisposable, BoxDisposable, Sink, Stream};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Errors the demo producers report through `Failed`
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum DemoError {
    #[error("producer gave up after {0} values")]
    GaveUp(u64),
    #[error("timer period must be non-zero")]
    ZeroPeriod,
}

/// `step`, `2 * step`, ... `count * step`, then completion, all synchronously
pub fn sequential(step: u64, count: u64) -> impl Stream<Value = u64, Error = DemoError> {
    create(move |sink: Sink<u64, DemoError>| {
        for n in 1..=count {
            sink.value(n.saturating_mul(step));
        }
        sink.complete();
        None
    })
}

/// Like [`sequential`] but fails instead of completing
pub fn failing(step: u64, count: u64) -> impl Stream<Value = u64, Error = DemoError> {
    create(move |sink: Sink<u64, DemoError>| {
        for n in 1..=count {
            sink.value(n.saturating_mul(step));
        }
        sink.fail(DemoError::GaveUp(count));
        None
    })
}

/// Timer-driven source
///
/// Optionally emits `initial` synchronously during subscribe, then one value
/// per `period` from a tokio task, completing after `count` ticks. The
/// returned cleanup handle cancels the task. Must be subscribed from within a
/// tokio runtime. A zero `period` fails the stream with `ZeroPeriod`.
pub fn interval(
    period: Duration,
    step: u64,
    count: u64,
    initial: Option<u64>,
) -> impl Stream<Value = u64, Error = DemoError> {
    create(move |sink: Sink<u64, DemoError>| {
        if period.is_zero() {
            sink.fail(DemoError::ZeroPeriod);
            return None;
        }
        if let Some(initial) = initial {
            sink.value(initial);
        }

        let token = CancellationToken::new();
        let cancelled = token.child_token();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            for n in 1..=count {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        trace!("Timer cancelled after {} ticks", n - 1);
                        return;
                    }
                    _ = ticker.tick() => sink.value(n.saturating_mul(step)),
                }
            }
            sink.complete();
        });

        Some(Box::new(BlockDisposable::new(move || {
            debug!("Cancelling timer");
            token.cancel();
        })) as BoxDisposable)
    })
}
