//! Cooperative cancellation shared by every remote call in one request.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::classroom::ClassroomError;

/// Cloneable cancel signal.
///
/// Raising it makes every not-yet-issued call fail with
/// [`ClassroomError::Cancelled`] and drops in-flight calls at their next
/// await point. Work already acknowledged by the remote is not undone.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    raised: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is raised.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `fut` unless the flag is already raised, abandoning it if the flag
    /// is raised while it is pending.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ClassroomError>
    where
        F: Future<Output = Result<T, ClassroomError>>,
    {
        if self.is_cancelled() {
            return Err(ClassroomError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ClassroomError::Cancelled),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn raised_flag_short_circuits() {
        let flag = CancelFlag::new();
        flag.cancel();
        let ran = AtomicBool::new(false);
        let res = flag
            .run(async {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, ClassroomError>(())
            })
            .await;
        assert!(matches!(res, Err(ClassroomError::Cancelled)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn raising_flag_abandons_pending_call() {
        let flag = CancelFlag::new();
        let trigger = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let res: Result<(), _> = flag
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(ClassroomError::Cancelled)));
    }

    #[tokio::test]
    async fn unraised_flag_passes_result_through() {
        let flag = CancelFlag::new();
        let res = flag.run(async { Ok::<_, ClassroomError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
