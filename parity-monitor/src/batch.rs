use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;
use tracing::error;

/// Outcome of a batched run. Results keep the order of the input items.
#[derive(Debug)]
pub struct BatchResult<R> {
    pub successful: Vec<R>,
    pub failed: usize,
}

impl<R> Default for BatchResult<R> {
    fn default() -> Self {
        BatchResult {
            successful: Vec::new(),
            failed: 0,
        }
    }
}

/// Split `items` into chunks of at most `size` (a zero size is treated as one).
pub fn create_batches<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);

    for item in items {
        current.push(item);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// Run `task` for every item, one batch at a time. Items inside a batch run concurrently
/// on their own tokio task, so an error or a panic only fails that item.
pub async fn process_batches<T, R, E, F, Fut>(items: Vec<T>, size: usize, task: F) -> BatchResult<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Send + 'static,
    E: Display + Send + 'static,
{
    let mut outcome = BatchResult::default();

    for batch in create_batches(items, size) {
        let handles = batch.into_iter().map(|item| tokio::spawn(task(item)));

        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(result)) => outcome.successful.push(result),
                Ok(Err(e)) => {
                    error!("batch item failed: {}", e);
                    outcome.failed += 1;
                }
                Err(e) => {
                    error!("batch item panicked: {}", e);
                    outcome.failed += 1;
                }
            }
        }
    }

    outcome
}
