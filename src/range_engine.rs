// src/range_engine.rs
//
// Bounded-parallel range fetch engine with ordered reassembly.
// Works with ANY backend that implements async fetch(range) -> Bytes

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::coalesce::{coalesce_ranges, FetchTask};
use crate::constants::{
    DEFAULT_COALESCE_GAP,
    DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_FETCHES,
};
use crate::error::{FetchError, Result};
use crate::range::ByteRange;

/// Configuration for coalesced concurrent range fetches
#[derive(Debug, Clone)]
pub struct RangeEngineConfig {
    /// Maximum backend fetches in flight across every batch sharing the engine (default: 10)
    pub max_concurrent_fetches: usize,

    /// Requested ranges closer than this are merged into one fetch (default: 10 MiB)
    pub coalesce_gap: u64,

    /// Timeout per backend fetch (default: 300s)
    pub fetch_timeout: Duration,
}

impl Default for RangeEngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            coalesce_gap: DEFAULT_COALESCE_GAP,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Statistics collected during a batch range fetch
#[derive(Debug, Clone)]
pub struct RangeFetchStats {
    /// Bytes returned to the caller (sum of requested ranges)
    pub bytes_returned: u64,

    /// Bytes pulled from the backend (sum of merged spans)
    pub bytes_fetched: u64,

    /// Number of ranges the caller asked for
    pub ranges_requested: usize,

    /// Number of backend calls after coalescing
    pub fetches_issued: usize,

    pub elapsed_time: Duration,

    /// Average backend throughput in bytes per second
    pub throughput_bps: u64,
}

impl RangeFetchStats {
    /// Stats for a batch that issued no I/O
    pub fn empty() -> Self {
        Self {
            bytes_returned: 0,
            bytes_fetched: 0,
            ranges_requested: 0,
            fetches_issued: 0,
            elapsed_time: Duration::ZERO,
            throughput_bps: 0,
        }
    }

    /// Same rate in MiB/s.
    pub fn throughput_mbps(&self) -> f64 {
        (self.throughput_bps as f64) / (1024.0 * 1024.0)
    }
}

/// Universal coalescing range engine
///
/// - Merges nearby ranges with [`coalesce_ranges`]
/// - Runs merged fetches with `stream::iter().buffer_unordered()`
/// - Hard in-flight cap via a semaphore shared by every call on this engine
/// - Optional cancellation token, timeout per fetch
/// - Slices merged buffers back into per-request `Bytes` (no copy) and
///   returns them in request order
///
/// # Example
///
/// ```no_run
/// use objfetch::range_engine::RangeEngine;
/// use objfetch::ByteRange;
///
/// # async fn example() -> objfetch::Result<()> {
/// let engine = RangeEngine::with_defaults();
/// let ranges = [ByteRange::new(500, 510)?, ByteRange::new(0, 10)?];
///
/// let fetch = |range: ByteRange| async move {
///     // Your backend's range read
///     Ok(bytes::Bytes::from(vec![0u8; range.len() as usize]))
/// };
///
/// let (buffers, stats) = engine.fetch_ranges(&ranges, fetch, None).await?;
/// assert_eq!(buffers.len(), 2);
/// println!("{} ranges in {} fetches", stats.ranges_requested, stats.fetches_issued);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RangeEngine {
    config: RangeEngineConfig,
    concurrency_limiter: Arc<Semaphore>,
}

impl RangeEngine {
    /// Engine whose in-flight limit is `config.max_concurrent_fetches`.
    pub fn new(config: RangeEngineConfig) -> Self {
        let concurrency_limiter = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
        Self { config, concurrency_limiter }
    }

    /// Engine with `RangeEngineConfig::default()`.
    pub fn with_defaults() -> Self {
        Self::new(RangeEngineConfig::default())
    }

    pub fn config(&self) -> &RangeEngineConfig {
        &self.config
    }

    /// Fetch every range in `ranges` and return one buffer per range, in the
    /// same order as `ranges`.
    ///
    /// Ranges must already be normalized. The first failing fetch fails the
    /// whole batch; fetches still in flight are dropped and nothing partial is
    /// returned.
    pub async fn fetch_ranges<F, Fut>(
        &self,
        ranges: &[ByteRange],
        fetch: F,
        cancel: Option<CancellationToken>,
    ) -> Result<(Vec<Bytes>, RangeFetchStats)>
    where
        F: Fn(ByteRange) -> Fut + Send + Sync + Clone,
        Fut: Future<Output = Result<Bytes>> + Send,
    {
        let started = Instant::now();
        let tasks = coalesce_ranges(ranges, self.config.coalesce_gap);
        let n_tasks = tasks.len();
        let bytes_fetched: u64 = tasks.iter().map(|t| t.span.len()).sum();

        tracing::debug!(
            "Fetching {} ranges with {} backend calls ({} bytes, max {} in flight)",
            ranges.len(), n_tasks, bytes_fetched, self.config.max_concurrent_fetches
        );

        let semaphore = Arc::clone(&self.concurrency_limiter);
        let timeout = self.config.fetch_timeout;

        let mut completed = stream::iter(tasks)
            .enumerate()
            .map(|(idx, task)| {
                Self::run_task(
                    idx,
                    task,
                    fetch.clone(),
                    Arc::clone(&semaphore),
                    cancel.clone(),
                    timeout,
                )
            })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1));

        // One write-once slot per requested range, indexed by request position
        let mut slots: Vec<Option<Bytes>> = vec![None; ranges.len()];
        while let Some(result) = completed.next().await {
            let (task, bytes) = result?;
            Self::split_into(&task, bytes, &mut slots)?;
        }

        let buffers = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or_else(|| {
                FetchError::invalid_state(format!("range {i} was not covered by any fetch"))
            }))
            .collect::<Result<Vec<_>>>()?;

        let elapsed = started.elapsed();
        let stats = RangeFetchStats {
            bytes_returned: ranges.iter().map(ByteRange::len).sum(),
            bytes_fetched,
            ranges_requested: ranges.len(),
            fetches_issued: n_tasks,
            elapsed_time: elapsed,
            throughput_bps: Self::calculate_throughput(bytes_fetched, elapsed),
        };

        tracing::info!(
            "Fetched {} ranges via {} calls: {} bytes in {:?} ({:.2} MB/s)",
            stats.ranges_requested, stats.fetches_issued, stats.bytes_fetched,
            stats.elapsed_time, stats.throughput_mbps()
        );

        Ok((buffers, stats))
    }

    /// Execute one merged fetch under a concurrency permit.
    ///
    /// The permit wait and the fetch both race the cancellation token, so a
    /// task still queued behind other batches never issues its read.
    async fn run_task<F, Fut>(
        idx: usize,
        task: FetchTask,
        fetch: F,
        semaphore: Arc<Semaphore>,
        cancel: Option<CancellationToken>,
        timeout: Duration,
    ) -> Result<(FetchTask, Bytes)>
    where
        F: Fn(ByteRange) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Bytes>> + Send,
    {
        let work = async {
            // held until this span has been read
            let _permit = semaphore.acquire().await
                .map_err(|e| anyhow::anyhow!("range limiter closed: {}", e))?;

            tracing::trace!("Fetching task {}: span={} members={}", idx, task.span, task.members.len());

            let bytes = tokio::time::timeout(timeout, fetch(task.span))
                .await
                .map_err(|_| anyhow::anyhow!(
                    "Fetch {} timeout after {:?} (span={})", idx, timeout, task.span
                ))??;
            Ok::<_, FetchError>(bytes)
        };

        let bytes = tokio::select! {
            biased;
            _ = Self::cancelled(cancel.as_ref()) => {
                tracing::debug!("Task {} (span={}) cancelled", idx, task.span);
                return Err(anyhow::anyhow!("Range fetch cancelled by caller").into());
            }
            bytes = work => bytes?,
        };

        Ok((task, bytes))
    }

    /// Resolves once `cancel` fires; never without a token.
    async fn cancelled(cancel: Option<&CancellationToken>) {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Slice a task's buffer into the slots of the ranges it covers.
    fn split_into(task: &FetchTask, bytes: Bytes, slots: &mut [Option<Bytes>]) -> Result<()> {
        if (bytes.len() as u64) < task.span.len() {
            tracing::warn!(
                "Fetch for span {} returned {} bytes, expected {}",
                task.span, bytes.len(), task.span.len()
            );
            return Err(anyhow::anyhow!(
                "short read for span {}: got {} of {} bytes",
                task.span, bytes.len(), task.span.len()
            ).into());
        }
        for (idx, range) in &task.members {
            slots[*idx] = Some(bytes.slice(task.span.relative(range)?));
        }
        Ok(())
    }

    /// Bytes per second, zero for a zero-length interval.
    fn calculate_throughput(bytes: u64, elapsed: Duration) -> u64 {
        let elapsed_secs = elapsed.as_secs_f64();
        if elapsed_secs > 0.0 {
            (bytes as f64 / elapsed_secs) as u64
        } else {
            0
        }
    }
}
