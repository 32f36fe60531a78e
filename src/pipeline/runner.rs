//! Sliding-window stage runner.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::progress::{weighted_percent, ProgressTracker};

/// One bounded-concurrency stage: label, window size and progress span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    label: String,
    concurrency: usize,
    lo: u8,
    hi: u8,
}

impl StageSpec {
    /// A stage running at most `concurrency` items at once and covering
    /// `[lo, hi]` of overall progress.
    ///
    /// Concurrency is raised to at least 1, bounds are clamped to 100 and
    /// ordered.
    pub fn new(label: impl Into<String>, concurrency: usize, lo: u8, hi: u8) -> Self {
        let lo = lo.min(100);
        let hi = hi.min(100);
        Self {
            label: label.into(),
            concurrency: concurrency.max(1),
            lo: lo.min(hi),
            hi: hi.max(lo),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn bounds(&self) -> (u8, u8) {
        (self.lo, self.hi)
    }
}

/// Why a stage aborted.
#[derive(Debug, Error)]
pub enum StageError<E> {
    /// The work function returned an error for the item at `index`.
    #[error("{label} failed on item {index}: {source}")]
    Item {
        label: String,
        index: usize,
        #[source]
        source: E,
    },

    /// A worker task panicked or was cancelled.
    #[error("{label} worker task failed: {source}")]
    Worker {
        label: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl<E> StageError<E> {
    pub fn label(&self) -> &str {
        match self {
            StageError::Item { label, .. } | StageError::Worker { label, .. } => label,
        }
    }

    /// Input index of the failing item, when known.
    pub fn index(&self) -> Option<usize> {
        match self {
            StageError::Item { index, .. } => Some(*index),
            StageError::Worker { .. } => None,
        }
    }
}

/// Run `work` over every item with at most `spec.concurrency()` calls in
/// flight, returning results in input order.
///
/// A new item starts as soon as any running one finishes. After each
/// completion the driver advances `progress` across the stage's bounds.
///
/// The first failure stops the stage from starting further items. Items
/// already running are allowed to finish, then every result is dropped and
/// the first error is returned.
pub async fn run_stage<I, T, E, F, Fut>(
    spec: &StageSpec,
    items: &[I],
    progress: &mut ProgressTracker,
    work: F,
) -> Result<Vec<T>, StageError<E>>
where
    I: Clone,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let total = items.len();
    let (lo, hi) = spec.bounds();

    progress.update(lo, spec.label()).await;
    if total == 0 {
        progress.update(hi, spec.label()).await;
        return Ok(Vec::new());
    }

    tracing::info!(
        "{}: {} items, {} concurrent",
        spec.label(),
        total,
        spec.concurrency()
    );

    let semaphore = Arc::new(Semaphore::new(spec.concurrency()));
    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut workers = JoinSet::new();
    let mut queue = items.iter().cloned().enumerate();
    let mut completed = 0usize;
    let mut failure: Option<StageError<E>> = None;

    loop {
        // Fill every free slot unless the stage is already failing.
        while failure.is_none() {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                break;
            };
            let Some((index, item)) = queue.next() else {
                break;
            };

            let task = work(item);
            workers.spawn(async move {
                let _permit = permit;
                (index, task.await)
            });
        }

        let Some(joined) = workers.join_next().await else {
            break;
        };
        completed += 1;

        match joined {
            Ok((index, Ok(value))) => {
                tracing::debug!("{}: item {} done", spec.label(), index);
                results[index] = Some(value);
            }
            Ok((index, Err(source))) => {
                tracing::warn!("{}: item {} failed, aborting stage", spec.label(), index);
                failure.get_or_insert(StageError::Item {
                    label: spec.label().to_string(),
                    index,
                    source,
                });
            }
            Err(source) => {
                tracing::warn!("{}: worker task failed: {}", spec.label(), source);
                failure.get_or_insert(StageError::Worker {
                    label: spec.label().to_string(),
                    source,
                });
            }
        }

        progress
            .update(weighted_percent(lo, hi, completed, total), spec.label())
            .await;
    }

    if let Some(err) = failure {
        return Err(err);
    }

    let results: Vec<T> = results.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), total);
    Ok(results)
}
