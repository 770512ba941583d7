//! Rate-limited batch execution for external calls

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// How external work is chunked and paced
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Calls running concurrently within one batch
    pub batch_size: usize,
    /// Pause between consecutive batches
    pub delay: Duration,
    /// Limit for each individual call
    pub timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Cooperative "should continue" flag shared between a long-running job and
/// whoever may want to stop it. Checked between batches only, so work that
/// already finished stays persisted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn should_continue(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Results of [`run_batched`], in input order
#[derive(Debug)]
pub struct BatchOutcome<R> {
    /// One entry per item that was started; items skipped after cancellation are absent
    pub results: Vec<AppResult<R>>,
    pub cancelled: bool,
}

impl<R> BatchOutcome<R> {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }
}

/// Awaits `fut` with a deadline, mapping expiry to [`AppError::Timeout`]
pub async fn with_timeout<T>(
    timeout: Duration,
    label: &str,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} did not finish within {:?}",
            label, timeout
        ))),
    }
}

/// Runs `f` over `items` in batches of `options.batch_size` concurrent tasks.
///
/// Each call gets `options.timeout`. Between batches the job sleeps
/// `options.delay` and checks `flag`; once cancelled, remaining items are
/// not started.
pub async fn run_batched<T, R, F, Fut>(
    items: Vec<T>,
    options: &BatchOptions,
    flag: &CancellationFlag,
    f: F,
) -> BatchOutcome<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = AppResult<R>> + Send + 'static,
{
    let batch_size = options.batch_size.max(1);
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut cancelled = false;
    let mut items = items.into_iter().peekable();
    let mut batch_index = 0usize;

    while items.peek().is_some() {
        if !flag.should_continue() {
            cancelled = true;
            tracing::info!(
                completed = results.len(),
                total,
                "Batch run cancelled"
            );
            break;
        }

        if batch_index > 0 && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }

        let mut tasks = Vec::with_capacity(batch_size);
        for item in items.by_ref().take(batch_size) {
            let fut = f(item);
            let timeout = options.timeout;
            tasks.push(tokio::spawn(async move {
                with_timeout(timeout, "external call", fut).await
            }));
        }

        for task in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Task join error");
                    Err(AppError::Internal(e.to_string()))
                }
            };
            results.push(result);
        }

        batch_index += 1;
        tracing::debug!(
            batch = batch_index,
            completed = results.len(),
            total,
            "Batch finished"
        );
    }

    BatchOutcome { results, cancelled }
}
