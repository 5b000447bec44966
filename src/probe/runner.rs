//! Executes the fixed probe sequence and collects a [`Report`].

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use super::config::ClusterEndpointConfig;
use super::error::ProbeError;
use super::report::Report;
use super::step::{StepName, StepResult};
use super::store::{StoreConnection, StoreConnector};
use crate::cluster::{ClusterConnector, ClusterInfo};
use crate::Error;

/// Runs connect, ping, cluster_info, write_read and cleanup against one
/// endpoint.
///
/// A runner holds no per-run state; every [`run`](ProbeRunner::run) opens
/// its own connection and closes it before returning.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), muxprobe::ProbeError> {
/// use muxprobe::{ClusterEndpointConfig, ProbeRunner};
///
/// let config = ClusterEndpointConfig::builder()
///     .seeds_from_str("127.0.0.1:7000,127.0.0.1:7001,127.0.0.1:7002")
///     .build()?;
/// let report = ProbeRunner::cluster().run(&config).await?;
/// for step in report.steps() {
///     println!("{} {} {}", step.name(), step.status(), step.detail());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProbeRunner<C> {
    connector: C,
}

impl ProbeRunner<ClusterConnector> {
    /// Runner backed by the built-in cluster client.
    pub fn cluster() -> Self {
        Self::new(ClusterConnector)
    }
}

impl<C: StoreConnector> ProbeRunner<C> {
    /// Creates a runner that opens connections through `connector`.
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Probes the endpoint described by `config`.
    ///
    /// Store failures never surface as `Err`; they are recorded in the
    /// returned report. Once `connect` succeeds, the test key is deleted and
    /// the connection closed before this returns, whatever else failed.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Configuration`] if `config` is invalid. No I/O
    /// happens in that case.
    #[instrument(skip_all, fields(seeds = %config.seeds_display()))]
    pub async fn run(&self, config: &ClusterEndpointConfig) -> Result<Report, ProbeError> {
        config.validate()?;
        let key = config.key_for_run();
        let budget = config.step_timeout();
        let mut steps = Vec::with_capacity(StepName::ALL.len());

        let (connected, elapsed) =
            timed(StepName::Connect, budget, self.connector.connect(config)).await;
        let mut conn = match connected {
            Ok(conn) => {
                steps.push(passed(StepName::Connect, conn.describe(), elapsed));
                conn
            }
            Err(err) => {
                steps.push(failed(StepName::Connect, &err, elapsed));
                for name in [StepName::Ping, StepName::ClusterInfo, StepName::WriteRead] {
                    steps.push(skipped(name, "connect failed".to_string()));
                }
                steps.push(skipped(
                    StepName::Cleanup,
                    "no connection was opened".to_string(),
                ));
                return Ok(finish(steps));
            }
        };

        let mut first_failure = None;
        for name in [StepName::Ping, StepName::ClusterInfo, StepName::WriteRead] {
            if let Some(cause) = first_failure {
                steps.push(skipped(name, format!("{cause} failed")));
                continue;
            }

            let (outcome, elapsed) = match name {
                StepName::Ping => timed(name, budget, conn.ping()).await,
                StepName::ClusterInfo => timed(name, budget, cluster_info(&mut conn)).await,
                _ => timed(name, budget, write_read(&mut conn, &key, config.test_value())).await,
            };
            match outcome {
                Ok(detail) => steps.push(passed(name, detail, elapsed)),
                Err(err) => {
                    steps.push(failed(name, &err, elapsed));
                    first_failure = Some(name);
                }
            }
        }

        let (outcome, elapsed) = timed(StepName::Cleanup, budget, conn.del(&key)).await;
        steps.push(match outcome {
            Ok(true) => passed(StepName::Cleanup, format!("deleted {key}"), elapsed),
            Ok(false) => passed(StepName::Cleanup, format!("{key} was not present"), elapsed),
            Err(err) => failed(StepName::Cleanup, &err, elapsed),
        });

        match budget {
            Some(budget) => {
                if tokio::time::timeout(budget, conn.close()).await.is_err() {
                    warn!("close did not finish within {}ms", budget.as_millis());
                }
            }
            None => conn.close().await,
        }

        Ok(finish(steps))
    }
}

/// Runs one step under the optional budget and measures it.
async fn timed<T, F>(
    step: StepName,
    budget: Option<Duration>,
    fut: F,
) -> (Result<T, ProbeError>, Duration)
where
    F: Future<Output = crate::Result<T>>,
{
    let started = Instant::now();
    let outcome = match budget {
        Some(budget) => match tokio::time::timeout(budget, fut).await {
            Ok(result) => result.map_err(|e| ProbeError::from_step(step, e)),
            Err(_) => Err(ProbeError::Timeout { step, budget }),
        },
        None => fut.await.map_err(|e| ProbeError::from_step(step, e)),
    };
    (outcome, started.elapsed())
}

async fn cluster_info<S: StoreConnection>(conn: &mut S) -> crate::Result<String> {
    let text = conn.cluster_info().await?;
    Ok(ClusterInfo::parse(&text).summary())
}

async fn write_read<S: StoreConnection>(
    conn: &mut S,
    key: &str,
    value: &Bytes,
) -> crate::Result<String> {
    conn.set(key, value.clone()).await?;
    match conn.get(key).await? {
        Some(read) if read == *value => Ok(String::from_utf8_lossy(&read).into_owned()),
        Some(read) => Err(Error::Protocol {
            message: format!(
                "read back {:?}, expected {:?}",
                String::from_utf8_lossy(&read),
                String::from_utf8_lossy(value)
            ),
        }),
        None => Err(Error::Protocol {
            message: format!("{key} missing right after SET"),
        }),
    }
}

fn passed(name: StepName, detail: String, elapsed: Duration) -> StepResult {
    info!(step = %name, elapsed_ms = elapsed.as_millis() as u64, %detail, "step ok");
    StepResult::ok(name, detail, elapsed)
}

fn failed(name: StepName, err: &ProbeError, elapsed: Duration) -> StepResult {
    warn!(step = %name, kind = ?err.kind(), error = %err, "step failed");
    StepResult::failed(name, err, elapsed)
}

fn skipped(name: StepName, reason: String) -> StepResult {
    warn!(step = %name, %reason, "step skipped");
    StepResult::skipped(name, reason)
}

fn finish(steps: Vec<StepResult>) -> Report {
    let report = Report::new(steps);
    info!(
        status = ?report.status(),
        elapsed_ms = report.elapsed().as_millis() as u64,
        "probe finished"
    );
    report
}
