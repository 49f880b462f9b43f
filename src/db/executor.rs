//! Query execution gateway.
//!
//! Ad-hoc queries run as spawned tasks behind a fixed number of semaphore
//! permits. Tasks waiting for a permit are served in FIFO order and the wait
//! queue is unbounded: a burst of requests queues rather than being rejected,
//! so callers that need bounded latency must apply admission control upstream.
//!
//! A single deadline covers the readonly lookup, the queue wait and the
//! execution itself. When it passes, the local task is aborted. That is only
//! guaranteed to stop the query if it had not started yet; a query already
//! sent to the server gets a best-effort `KILL QUERY` and may keep running
//! there.

use crate::db::client::CatalogClient;
use crate::db::params::QueryParams;
use crate::db::readonly::{READONLY_SETTING, effective_readonly};
use crate::error::DbError;
use crate::models::{CatalogQuery, DEFAULT_QUERY_POOL_SIZE, DEFAULT_QUERY_TIMEOUT_SECS, QueryResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout_at;
use tracing::{debug, error, info, warn};

/// Upper bound on the background `KILL QUERY` request.
const KILL_TIMEOUT: Duration = Duration::from_secs(10);

// Task phases. The timeout path and the task race to move out of QUEUED.
const PHASE_QUEUED: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_CANCELLED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The deadline passed
    Timeout,
    /// The engine rejected or failed the query
    Execution,
    /// The gateway itself failed
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Execution => "execution",
            Self::Internal => "internal",
        }
    }
}

/// What happened to a timed-out query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancellation {
    /// Local waiting was abandoned
    pub requested: bool,
    /// The query is known not to have reached the server
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFailure {
    pub kind: FailureKind,
    pub message: String,
    pub cancellation: Option<Cancellation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success {
        result: QueryResult,
        execution_time_ms: u64,
    },
    Failed(QueryFailure),
}

impl QueryOutcome {
    fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed(QueryFailure {
            kind,
            message: message.into(),
            cancellation: None,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure(&self) -> Option<&QueryFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Success { .. } => None,
        }
    }
}

/// Decrements the waiting counter however the wait ends.
struct WaitingGuard(Arc<AtomicUsize>);

impl WaitingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded-concurrency executor for read-only ad-hoc queries.
pub struct QueryExecutor {
    catalog: Arc<dyn CatalogClient>,
    permits: Arc<Semaphore>,
    pool_size: usize,
    default_timeout: Duration,
    waiting: Arc<AtomicUsize>,
}

impl QueryExecutor {
    /// Create an executor with default pool size and timeout.
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        Self::with_limits(
            catalog,
            DEFAULT_QUERY_POOL_SIZE,
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        )
    }

    /// Create an executor with custom settings. A pool size of 0 is treated as 1.
    pub fn with_limits(
        catalog: Arc<dyn CatalogClient>,
        pool_size: usize,
        default_timeout: Duration,
    ) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            catalog,
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            default_timeout,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Queries currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.pool_size - self.permits.available_permits()
    }

    /// Queries waiting for a permit.
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Run a query with the default timeout.
    pub async fn run(&self, sql: &str) -> QueryOutcome {
        self.run_with_timeout(sql, self.default_timeout).await
    }

    /// Run a query under readonly enforcement, bounded by `limit`.
    pub async fn run_with_timeout(&self, sql: &str, limit: Duration) -> QueryOutcome {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + limit;

        let level = match timeout_at(deadline, effective_readonly(self.catalog.as_ref())).await {
            Ok(Ok(level)) => level,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to determine readonly level");
                return QueryOutcome::failed(
                    FailureKind::Execution,
                    format!("Query execution failed: {}", e),
                );
            }
            Err(_) => {
                warn!(timeout_secs = limit.as_secs_f64(), "Timed out reading readonly level");
                return timeout_outcome(limit, true);
            }
        };

        let query_id = format!("mcp-{}", uuid::Uuid::new_v4().simple());
        let query = CatalogQuery::new(sql)
            .setting(READONLY_SETTING, level.as_str())
            .query_id(query_id.clone());

        debug!(
            query_id = %query_id,
            readonly = %level,
            in_flight = self.in_flight(),
            queued = self.queued(),
            "Dispatching query"
        );

        let phase = Arc::new(AtomicU8::new(PHASE_QUEUED));
        let mut task = self.dispatch(query, phase.clone());

        match timeout_at(deadline, &mut task).await {
            Ok(Ok(Ok(result))) => {
                info!(
                    query_id = %query_id,
                    rows = result.row_count(),
                    "Query returned rows"
                );
                QueryOutcome::Success {
                    result,
                    execution_time_ms: start.elapsed().as_millis() as u64,
                }
            }
            Ok(Ok(Err(e))) => {
                error!(query_id = %query_id, error = %e, "Error executing query");
                QueryOutcome::failed(
                    FailureKind::Execution,
                    format!("Query execution failed: {}", e),
                )
            }
            Ok(Err(join_err)) => {
                error!(query_id = %query_id, error = %join_err, "Query task failed");
                QueryOutcome::failed(
                    FailureKind::Internal,
                    format!("Unexpected error during query execution: {}", join_err),
                )
            }
            Err(_) => {
                let never_ran = phase
                    .compare_exchange(
                        PHASE_QUEUED,
                        PHASE_CANCELLED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                task.abort();

                warn!(
                    query_id = %query_id,
                    timeout_secs = limit.as_secs_f64(),
                    started = !never_ran,
                    "Query timed out"
                );
                if !never_ran {
                    self.request_remote_kill(query_id);
                }
                timeout_outcome(limit, never_ran)
            }
        }
    }

    fn dispatch(
        &self,
        query: CatalogQuery,
        phase: Arc<AtomicU8>,
    ) -> tokio::task::JoinHandle<Result<QueryResult, DbError>> {
        let catalog = self.catalog.clone();
        let permits = self.permits.clone();
        let waiting = WaitingGuard::enter(&self.waiting);

        tokio::spawn(async move {
            let permit = permits.acquire_owned().await;
            drop(waiting);
            let _permit = permit.map_err(|_| DbError::internal("Query pool is closed"))?;

            if phase
                .compare_exchange(
                    PHASE_QUEUED,
                    PHASE_RUNNING,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                return Err(DbError::internal("Query cancelled before execution"));
            }

            catalog.query(query).await
        })
    }

    /// Ask the server to stop a query we no longer wait for. Fire and forget.
    fn request_remote_kill(&self, query_id: String) {
        let catalog = self.catalog.clone();
        tokio::spawn(async move {
            let mut params = QueryParams::new();
            let id = params.bind_string(query_id.as_str());
            let sql = format!("KILL QUERY WHERE query_id = {} ASYNC", id);
            let kill = catalog.query(CatalogQuery::with_params(sql, params));

            match tokio::time::timeout(KILL_TIMEOUT, kill).await {
                Ok(Ok(_)) => info!(query_id = %query_id, "Requested server-side cancellation"),
                Ok(Err(e)) => warn!(
                    query_id = %query_id,
                    error = %e,
                    "Server-side cancellation failed; query may still be running"
                ),
                Err(_) => warn!(
                    query_id = %query_id,
                    "Server-side cancellation timed out; query may still be running"
                ),
            }
        });
    }
}

fn timeout_outcome(limit: Duration, confirmed: bool) -> QueryOutcome {
    QueryOutcome::Failed(QueryFailure {
        kind: FailureKind::Timeout,
        message: format!("Query timed out after {} seconds", limit.as_secs_f64()),
        cancellation: Some(Cancellation {
            requested: true,
            confirmed,
        }),
    })
}
