use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::rpc::types::Log;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::rpc::LogSubscription;

/// Lifetime of one aggregated view.
///
/// Owns the tasks forwarding live subscriptions into the view. Tearing the
/// scope down aborts them, which drops and releases every subscription.
/// Clones share the same scope, so a view can be torn down from outside
/// while it is still loading.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    inner: Arc<ScopeInner>,
}

#[derive(Debug, Default)]
struct ScopeInner {
    torn_down: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let tasks = match self.tasks.get_mut() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        !self.inner.torn_down.load(Ordering::Acquire)
    }

    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let tasks: Vec<JoinHandle<()>> = match self.inner.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for task in &tasks {
            task.abort();
        }
        tracing::debug!("View torn down, released {} subscription(s)", tasks.len());
    }

    /// Forward `subscription` into `tx`, tagging each log with `wrap`.
    pub fn forward<T, F>(&self, mut subscription: LogSubscription, tx: mpsc::Sender<T>, wrap: F)
    where
        T: Send + 'static,
        F: Fn(Log) -> T + Send + 'static,
    {
        let task = tokio::spawn(async move {
            while let Some(log) = subscription.recv().await {
                if tx.send(wrap(log)).await.is_err() {
                    break;
                }
            }
        });
        self.attach(task);
    }

    fn attach(&self, task: JoinHandle<()>) {
        if !self.is_live() {
            task.abort();
            return;
        }
        match self.inner.tasks.lock() {
            Ok(mut tasks) => tasks.push(task),
            Err(poisoned) => poisoned.into_inner().push(task),
        }
        // A teardown racing the push above would miss this task.
        if !self.is_live() {
            self.abort_all();
        }
    }

    fn abort_all(&self) {
        let tasks = match self.inner.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect::<Vec<_>>(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for task in tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_teardown_releases_subscriptions() {
        let scope = ViewScope::new();
        let (feed_tx, feed_rx) = mpsc::channel::<Log>(4);
        let (view_tx, mut view_rx) = mpsc::channel::<Log>(4);

        scope.forward(LogSubscription::from_channel(feed_rx), view_tx, |log| log);
        feed_tx.send(Log::default()).await.unwrap();
        assert!(view_rx.recv().await.is_some());

        scope.teardown();
        assert!(!scope.is_live());

        // The forwarder dropped the subscription and the view's sender
        assert!(view_rx.recv().await.is_none());
        feed_tx.closed().await;
    }

    #[tokio::test]
    async fn test_dropping_last_clone_releases_subscriptions() {
        let scope = ViewScope::new();
        let (feed_tx, feed_rx) = mpsc::channel::<Log>(1);
        let (view_tx, _view_rx) = mpsc::channel::<Log>(1);
        scope.forward(LogSubscription::from_channel(feed_rx), view_tx, |log| log);

        let other = scope.clone();
        drop(scope);
        assert!(other.is_live());
        drop(other);

        feed_tx.closed().await;
    }

    #[tokio::test]
    async fn test_forward_after_teardown_is_released_immediately() {
        let scope = ViewScope::new();
        scope.teardown();

        let (feed_tx, feed_rx) = mpsc::channel::<Log>(1);
        let (view_tx, _view_rx) = mpsc::channel::<Log>(1);
        scope.forward(LogSubscription::from_channel(feed_rx), view_tx, |log| log);

        feed_tx.closed().await;
    }
}
