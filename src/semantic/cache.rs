//! Lazily initialized model handle with single-flight loading.
//!
//! A `ModelCell` loads its handle at most once per process. Concurrent
//! callers racing the first load wait for the same result, and a failed load
//! is recorded and replayed to every later caller instead of being retried.
//!
//! The load runs in a detached task, so a caller that gives up (timeout,
//! dropped request) does not abort it: the handle is still stored for the
//! next caller.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::errors::AiError;
use super::models::ModelKind;

pub struct ModelCell<T: ?Sized> {
    kind: ModelKind,
    slot: Arc<OnceCell<Result<Arc<T>, AiError>>>,
}

impl<T: ?Sized + Send + Sync + 'static> ModelCell<T> {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            slot: Arc::new(OnceCell::new()),
        }
    }

    /// Whether a handle has been loaded successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    /// The recorded initialization failure, if any.
    pub fn failure(&self) -> Option<AiError> {
        match self.slot.get() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Returns the cached handle, loading it with `load` if nobody has yet.
    ///
    /// `load` is blocking and runs on the blocking pool. It is dropped
    /// unused when another caller's load is already in flight or finished.
    pub async fn get_or_load<F>(&self, load: F) -> Result<Arc<T>, AiError>
    where
        F: FnOnce() -> Result<Arc<T>, AiError> + Send + 'static,
    {
        if let Some(result) = self.slot.get() {
            if let Err(err) = result {
                log::debug!("{} model previously failed, not retrying: {err}", self.kind);
            }
            return result.clone();
        }

        let slot = Arc::clone(&self.slot);
        let kind = self.kind;
        let task = tokio::spawn(async move {
            slot.get_or_init(|| async move {
                let result = match tokio::task::spawn_blocking(load).await {
                    Ok(result) => result,
                    Err(err) => Err(AiError::unavailable(kind, format!("loader panicked: {err}"))),
                };
                result.map_err(|err| match err {
                    AiError::ModelUnavailable { .. } => err,
                    other => AiError::unavailable(kind, other.to_string()),
                })
            })
            .await
            .clone()
        });

        task.await
            .map_err(|err| AiError::unavailable(kind, format!("load task aborted: {err}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_load() {
        let cell: Arc<ModelCell<String>> = Arc::new(ModelCell::new(ModelKind::Text));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = cell.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cell.get_or_load(move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(100));
                    Ok(Arc::new("model".to_string()))
                })
                .await
            }));
        }

        for handle in handles {
            let model = handle.await.unwrap().unwrap();
            assert_eq!(model.as_str(), "model");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cell.is_ready());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_replayed() {
        let cell: ModelCell<String> = ModelCell::new(ModelKind::Vision);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let loads = loads.clone();
            let result = cell
                .get_or_load(move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Err(AiError::unavailable(ModelKind::Vision, "download failed"))
                })
                .await;
            assert!(matches!(result, Err(AiError::ModelUnavailable { .. })));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(!cell.is_ready());
        assert!(cell.failure().is_some());
    }

    #[tokio::test]
    async fn test_loader_errors_become_unavailable() {
        let cell: ModelCell<String> = ModelCell::new(ModelKind::Classifier);
        let result = cell
            .get_or_load(|| Err(AiError::inference("corrupt weights")))
            .await;

        match result {
            Err(AiError::ModelUnavailable { kind, reason }) => {
                assert_eq!(kind, ModelKind::Classifier);
                assert!(reason.contains("corrupt weights"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_caller_does_not_cancel_load() {
        let cell: ModelCell<String> = ModelCell::new(ModelKind::Text);
        let loads = Arc::new(AtomicUsize::new(0));

        let first_loads = loads.clone();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            cell.get_or_load(move || {
                first_loads.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(200));
                Ok(Arc::new("slow".to_string()))
            }),
        )
        .await;
        assert!(abandoned.is_err());

        let second_loads = loads.clone();
        let model = cell
            .get_or_load(move || {
                second_loads.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("second".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(model.as_str(), "slow");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
