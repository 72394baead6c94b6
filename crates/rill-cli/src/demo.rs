//! Demo scenarios
//!
//! Each scenario builds a pipeline, subscribes a printing consumer, and waits
//! for the terminal event (or the configured timeout).

use anyhow::{bail, Result};
use clap::ValueEnum;
use parking_lot::Mutex;
use rill_core::{just, Disposable, Event, Stream, StreamExt};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::RillConfig;
use crate::sources::{failing, interval, sequential};

/// Available demo pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// One value, then completion
    Just,
    /// Synchronous burst of values, then completion
    Sequential,
    /// Timer-driven values, then completion
    Interval,
    /// Timer-driven source cancelled before it finishes
    Dispose,
    /// Burst buffered into one vector
    Collect,
    /// Burst incremented by one, then buffered
    Map,
    /// Each value fanned out into its own timer-driven stream
    FlatMap,
    /// Producer failure discards the collected buffer
    Fail,
    /// Every scenario above, in order
    All,
}

impl Scenario {
    const EACH: [Scenario; 8] = [
        Scenario::Just,
        Scenario::Sequential,
        Scenario::Interval,
        Scenario::Dispose,
        Scenario::Collect,
        Scenario::Map,
        Scenario::FlatMap,
        Scenario::Fail,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Scenario::Just => "just",
            Scenario::Sequential => "sequential",
            Scenario::Interval => "interval",
            Scenario::Dispose => "dispose",
            Scenario::Collect => "collect",
            Scenario::Map => "map",
            Scenario::FlatMap => "flat-map",
            Scenario::Fail => "fail",
            Scenario::All => "all",
        }
    }
}

/// Run one scenario (or all of them)
pub async fn run(scenario: Scenario, config: &RillConfig) -> Result<()> {
    if scenario == Scenario::All {
        for each in Scenario::EACH {
            run_one(each, config).await?;
        }
        return Ok(());
    }
    run_one(scenario, config).await
}

async fn run_one(scenario: Scenario, config: &RillConfig) -> Result<()> {
    info!("Running scenario '{}'", scenario.label());
    let (step, count) = (config.step, config.count);

    let seen = match scenario {
        Scenario::Just => observe(scenario, just(step), config, None).await?,
        Scenario::Sequential => observe(scenario, sequential(step, count), config, None).await?,
        Scenario::Interval => {
            let source = interval(config.interval(), step, count, None);
            observe(scenario, source, config, None).await?
        }
        Scenario::Dispose => {
            // Ticks slower than the dispose delay, so only the synchronous value gets through
            let period = config.dispose_after() * 2;
            let source = interval(period, step, count, Some(0));
            observe(scenario, source, config, Some(config.dispose_after())).await?
        }
        Scenario::Collect => {
            observe(scenario, sequential(step, count).collect(), config, None).await?
        }
        Scenario::Map => {
            let pipeline = sequential(step, count).map(|n| n + 1).collect();
            observe(scenario, pipeline, config, None).await?
        }
        Scenario::FlatMap => {
            let period = config.interval();
            let pipeline = interval(period, step, count, None)
                .flat_map(move |n| interval(period, n, 2, Some(n)).map(move |m| (n, m)));
            observe(scenario, pipeline, config, None).await?
        }
        Scenario::Fail => observe(scenario, failing(step, count).collect(), config, None).await?,
        Scenario::All => bail!("'all' is expanded before scenarios run"),
    };

    info!(
        "Scenario '{}' finished after {} events",
        scenario.label(),
        seen
    );
    Ok(())
}

/// Subscribe a printing consumer and wait for the terminal event.
///
/// With `dispose_after`, the subscription is disposed after that delay.
/// Returns the number of events observed.
async fn observe<S>(
    scenario: Scenario,
    stream: S,
    config: &RillConfig,
    dispose_after: Option<Duration>,
) -> Result<usize>
where
    S: Stream,
    S::Value: Debug + Serialize,
    S::Error: Debug + Serialize,
{
    let (tx, rx) = oneshot::channel();
    let done = Arc::new(Mutex::new(Some(tx)));
    let seen = Arc::new(Mutex::new(0usize));

    let label = scenario.label();
    let json = config.json;
    let (d, s) = (done.clone(), seen.clone());
    let handle = stream.subscribe(move |event: Event<S::Value, S::Error>| {
        *s.lock() += 1;
        print_event(label, &event, json);
        if event.is_terminal() {
            if let Some(tx) = d.lock().take() {
                let _ = tx.send(());
            }
        }
    });

    if let Some(delay) = dispose_after {
        tokio::time::sleep(delay).await;
        if let Some(handle) = handle.as_ref() {
            handle.dispose();
        }
    }

    if tokio::time::timeout(config.timeout(), rx).await.is_err() {
        warn!("Scenario '{}' timed out, disposing", label);
        if let Some(handle) = handle {
            handle.dispose();
        }
        bail!(
            "scenario '{}' did not terminate within {:?}",
            label,
            config.timeout()
        );
    }

    let count = *seen.lock();
    Ok(count)
}

/// One JSON output line
#[derive(Serialize)]
struct EventLine<'a, V, E> {
    scenario: &'a str,
    event: &'a Event<V, E>,
}

fn print_event<V, E>(label: &str, event: &Event<V, E>, json: bool)
where
    V: Debug + Serialize,
    E: Debug + Serialize,
{
    if json {
        let line = EventLine {
            scenario: label,
            event,
        };
        match serde_json::to_string(&line) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode event: {}", e),
        }
    } else {
        println!("[{}] {:?}", label, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> RillConfig {
        RillConfig {
            interval_ms: 2,
            dispose_after_ms: 20,
            timeout_ms: 2000,
            ..RillConfig::default()
        }
    }

    #[tokio::test]
    async fn test_every_scenario_terminates() {
        run(Scenario::All, &quick_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_event_counts() {
        let config = quick_config();
        // Value, Completed
        assert_eq!(observe(Scenario::Just, just(1), &config, None).await.unwrap(), 2);
        // One collected value, Completed
        let collected = observe(Scenario::Collect, sequential(1, 5).collect(), &config, None)
            .await
            .unwrap();
        assert_eq!(collected, 2);
        // Failure only
        let failed = observe(Scenario::Fail, failing(1, 5).collect(), &config, None)
            .await
            .unwrap();
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_dispose_scenario_sees_initial_value_then_disposed() {
        let config = quick_config();
        let source = interval(Duration::from_secs(5), 100, 3, Some(0));
        let seen = observe(
            Scenario::Dispose,
            source,
            &config,
            Some(Duration::from_millis(10)),
        )
        .await
        .unwrap();
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn test_silent_stream_times_out() {
        let config = RillConfig {
            timeout_ms: 20,
            ..RillConfig::default()
        };
        let silent = interval(Duration::from_secs(5), 1, 1, None);
        assert!(observe(Scenario::Interval, silent, &config, None)
            .await
            .is_err());
    }
}
