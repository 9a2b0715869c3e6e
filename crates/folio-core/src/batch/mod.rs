//! Bounded batch execution with progress reporting.

mod cancel;

pub use cancel::{OperationToken, OperationTracker};

use futures_util::future::join_all;
use std::future::Future;
use tracing::{debug, warn};

use crate::error::{FolioError, Result};

/// Runs items in fixed-size batches.
///
/// Batches run one after another; the items of a batch are driven
/// concurrently. Progress is reported after every batch as the completed
/// fraction in `0.0..=1.0`.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    batch_size: usize,
    token: OperationToken,
}

impl BatchRunner {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            token: OperationToken::detached(),
        }
    }

    /// Stop between batches once `token` is superseded.
    pub fn with_token(mut self, token: OperationToken) -> Self {
        self.token = token;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run `worker(index, item)` over every item. Per-item failures are
    /// captured in the report; only cancellation aborts the run.
    pub async fn run<T, R, W, Fut, P>(&self, items: Vec<T>, worker: W, mut on_progress: P) -> Result<BatchReport<R>>
    where
        W: Fn(usize, T) -> Fut,
        Fut: Future<Output = Result<R>>,
        P: FnMut(f64),
    {
        let total = items.len();
        if total == 0 {
            on_progress(1.0);
            return Ok(BatchReport { results: Vec::new() });
        }

        let mut results = Vec::with_capacity(total);
        let mut pending = items.into_iter().enumerate().peekable();
        while pending.peek().is_some() {
            self.token.ensure_current()?;
            let batch: Vec<_> = pending
                .by_ref()
                .take(self.batch_size)
                .map(|(index, item)| worker(index, item))
                .collect();
            results.extend(join_all(batch).await);

            debug!("Batch complete: {}/{} items", results.len(), total);
            on_progress(results.len() as f64 / total as f64);
        }
        self.token.ensure_current()?;

        Ok(BatchReport { results })
    }
}

/// Per-item outcomes in input order.
#[derive(Debug)]
pub struct BatchReport<R> {
    results: Vec<Result<R>>,
}

impl<R> BatchReport<R> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[Result<R>] {
        &self.results
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Failed items with their input positions.
    pub fn failures(&self) -> Vec<(usize, &FolioError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(index, r)| r.as_ref().err().map(|e| (index, e)))
            .collect()
    }

    /// Consume the report, keeping only the outcomes.
    pub fn into_results(self) -> Vec<Result<R>> {
        self.results
    }

    /// Fail with `EmptyResult` when every item failed.
    pub fn ensure_any_success(self) -> Result<Self> {
        if !self.results.is_empty() && self.success_count() == 0 {
            for (index, error) in self.failures() {
                warn!("Item {} failed: {}", index + 1, error);
            }
            return Err(FolioError::EmptyResult(format!(
                "all {} items failed",
                self.results.len()
            )));
        }
        Ok(self)
    }

    /// All values, or `PartialBatchFailure` naming each failed item.
    pub fn require_all(self) -> Result<Vec<R>> {
        let total = self.results.len();
        let errors: Vec<String> = self
            .failures()
            .into_iter()
            .map(|(index, error)| format!("item {}: {}", index + 1, error))
            .collect();
        if !errors.is_empty() {
            return Err(FolioError::PartialBatchFailure {
                failed: errors.len(),
                total,
                errors,
            });
        }
        Ok(self.results.into_iter().filter_map(|r| r.ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    async fn double(index: usize, value: u32) -> Result<u32> {
        if value == 0 {
            return Err(FolioError::EmptyResult(format!("item {index} is zero")));
        }
        Ok(value * 2)
    }

    #[tokio::test]
    async fn test_progress_increases_to_one() {
        let runner = BatchRunner::new(2);
        let mut progress = Vec::new();
        let report = runner
            .run(vec![1, 2, 3, 4, 5], double, |p| progress.push(p))
            .await
            .unwrap();

        assert_eq!(progress, vec![0.4, 0.8, 1.0]);
        assert_eq!(report.require_all().unwrap(), vec![2, 4, 6, 8, 10]);
    }

    #[tokio::test]
    async fn test_empty_input_reports_done() {
        let mut progress = Vec::new();
        let report = BatchRunner::new(3)
            .run(Vec::<u32>::new(), double, |p| progress.push(p))
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(progress, vec![1.0]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let report = BatchRunner::new(2)
            .run(vec![3, 0, 5], double, |_| {})
            .await
            .unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failures()[0].0, 1);

        let err = report.require_all().unwrap_err();
        match err {
            FolioError::PartialBatchFailure { failed, total, errors } => {
                assert_eq!((failed, total), (1, 3));
                assert!(errors[0].starts_with("item 2:"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_all_failed_is_empty_result() {
        let report = BatchRunner::new(4).run(vec![0, 0], double, |_| {}).await.unwrap();
        let err = report.ensure_any_success().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[tokio::test]
    async fn test_superseded_run_is_cancelled() {
        let tracker = OperationTracker::new();
        let runner = BatchRunner::new(1).with_token(tracker.begin());
        let mut batches = 0;
        let result = runner
            .run(vec![1, 2, 3], double, |_| {
                batches += 1;
                tracker.begin();
            })
            .await;
        assert!(matches!(result, Err(FolioError::Cancelled)));
        assert_eq!(batches, 1);
    }
}
