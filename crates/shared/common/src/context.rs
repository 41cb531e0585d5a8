//! Per-operation cancellation and deadlines.
//!
//! Every public store operation takes an [`OperationContext`]. Stores call
//! [`OperationContext::ensure_active`] before doing any work, and the
//! connection layer wraps connection acquisition and statement execution in
//! [`OperationContext::guard`], so cancelling the token or passing the
//! deadline also stops in-flight database work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{AppError, AppResult};

/// Cloneable cancellation signal shared between a caller and its operations.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Request cancellation; wakes every future waiting on this token.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        loop {
            let cancelled = *rx.borrow_and_update();
            if cancelled {
                return;
            }
            // The sender lives in `self`, so `changed` only fails if it is dropped.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation and deadline for one logical operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attach an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail fast if the operation was cancelled or its deadline has passed.
    pub fn ensure_active(&self) -> AppResult<()> {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AppError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless the context is cancelled or expires first.
    ///
    /// A cancelled or expired context never polls `fut`.
    pub async fn guard<F, T>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        self.ensure_active()?;

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| AppError::DeadlineExceeded)?,
                None => fut.await,
            }
        };

        match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(AppError::Cancelled),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_active() {
        assert!(OperationContext::background().ensure_active().is_ok());
    }

    #[test]
    fn test_cancelled_token_fails_fast() {
        let token = CancellationToken::new();
        let ctx = OperationContext::background().with_cancellation(token.clone());
        assert!(ctx.ensure_active().is_ok());

        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.ensure_active(), Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guard_skips_work_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OperationContext::background().with_cancellation(token);

        let mut polled = false;
        let result = ctx
            .guard(async {
                polled = true;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(!polled);
    }

    #[tokio::test]
    async fn test_guard_interrupts_in_flight_work() {
        let token = CancellationToken::new();
        let ctx = OperationContext::background().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result: AppResult<()> = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        canceller.await.unwrap();
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guard_enforces_deadline() {
        let ctx = OperationContext::background().with_timeout(Duration::from_millis(50));

        let result: AppResult<()> = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AppError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let ctx = OperationContext::background().with_timeout(Duration::from_secs(5));
        let value = ctx.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
