use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{ErrorKind, RedisError, RedisResult};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::MonitorError;
use crate::node::Node;
use crate::stats::{self, CommandFilter, DeltaTracker, Sample};

/// At most this many stats fetches are in flight at once, however many
/// nodes are being polled.
const MAX_IN_FLIGHT: usize = 8;

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// One node plus its long-lived connection, opened once at startup.
pub struct NodeConn {
    pub node: Node,
    pub conn: ConnectionManager,
}

/// The per-second polling loop: fan out one stats fetch per node, merge,
/// diff against the previous iteration, print one line.
pub struct Sampler {
    nodes: Vec<NodeConn>,
    filter: Arc<CommandFilter>,
    interval: Duration,
    tracker: DeltaTracker,
}

impl Sampler {
    pub fn new(nodes: Vec<NodeConn>, filter: CommandFilter, interval: Duration) -> Self {
        Self {
            nodes,
            filter: Arc::new(filter),
            interval,
            tracker: DeltaTracker::new(),
        }
    }

    /// Runs until the token is cancelled or a fatal Redis error surfaces.
    ///
    /// Cancellation is observed at iteration boundaries and during the
    /// pacing sleep: an iteration that has started runs to completion and
    /// prints its line, but once the token fires no new iteration begins,
    /// so there is never a partial line.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));

        while !shutdown.is_cancelled() {
            let (success, aggregated) = self.sample_once(&semaphore).await?;
            let deltas = self.tracker.advance(&aggregated);
            println!("{}", format_iteration(success, &deltas));

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        Ok(())
    }

    /// One fan-out/fan-in generation: every node is asked concurrently
    /// (semaphore-gated), all tasks are joined, and the per-node samples
    /// are merged single-threaded here in the coordinator.
    async fn sample_once(
        &self,
        semaphore: &Arc<Semaphore>,
    ) -> Result<(usize, Sample), MonitorError> {
        let mut handles = Vec::with_capacity(self.nodes.len());

        for nc in &self.nodes {
            let semaphore = semaphore.clone();
            let filter = self.filter.clone();
            let node = nc.node.clone();
            let mut conn = nc.conn.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                let result = fetch_command_stats(&mut conn).await;
                (node, result.map(|raw| stats::summarize(&raw, &filter)))
            }));
        }

        let mut success = 0;
        let mut parts = Vec::with_capacity(handles.len());

        for handle in handles {
            match handle.await {
                Ok((_, Ok(sample))) => {
                    success += 1;
                    parts.push(sample);
                }
                Ok((node, Err(err))) if is_transient(&err) => {
                    warn!(node = %node, %err, "stats fetch failed, skipping node this iteration");
                }
                Ok((_, Err(err))) => return Err(err.into()),
                Err(err) => {
                    warn!(%err, "stats task aborted");
                }
            }
        }

        Ok((success, stats::merge(parts)))
    }
}

async fn fetch_command_stats(conn: &mut ConnectionManager) -> RedisResult<Vec<(String, u64)>> {
    let raw: String = redis::cmd("INFO")
        .arg("commandstats")
        .query_async(conn)
        .await?;
    Ok(stats::parse_command_stats(&raw))
}

fn format_iteration(success: usize, deltas: &BTreeMap<String, i64>) -> String {
    let now = chrono::Local::now().format(TIMESTAMP_FMT).to_string();
    stats::format_line(&now, success, deltas)
}

/// Errors a node recovers from on its own: the node simply misses this
/// iteration and is retried by the next one. Everything else (auth,
/// protocol, type errors) is a setup problem and kills the loop.
fn is_transient(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || matches!(
            err.kind(),
            ErrorKind::BusyLoadingError
                | ErrorKind::TryAgain
                | ErrorKind::ClusterDown
                | ErrorKind::MasterDown
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_transient() {
        let err = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(is_transient(&err));
    }

    #[test]
    fn server_busy_is_transient() {
        let err = RedisError::from((ErrorKind::BusyLoadingError, "loading dataset"));
        assert!(is_transient(&err));
    }

    #[test]
    fn auth_failure_is_fatal() {
        let err = RedisError::from((ErrorKind::AuthenticationFailed, "invalid password"));
        assert!(!is_transient(&err));
    }

    #[test]
    fn protocol_error_is_fatal() {
        let err = RedisError::from((ErrorKind::ResponseError, "unexpected reply"));
        assert!(!is_transient(&err));
    }
}
