// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation scopes.
//!
//! A [`CancelToken`] is cheap to clone and may be linked to a parent scope;
//! cancelling the parent cancels every child. Cancellation is sticky. Both a
//! synchronous [`CancelToken::is_cancelled`] view (for blocking workers that
//! poll between sleep slices) and an awaitable [`CancelToken::cancelled`]
//! view are provided.

use std::fmt;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// The scope this operation ran under was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// A cooperative cancellation scope.
///
/// Holds its own flag plus the flags of every ancestor scope, so a fired
/// ancestor is observed without any signal forwarding.
#[derive(Debug, Clone)]
pub struct CancelToken {
    /// Ancestors first, this scope's own flag last. Never empty.
    chain: Vec<Arc<Inner>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Creates a new root scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: vec![Arc::new(Inner::default())],
        }
    }

    /// Creates a child scope that is cancelled whenever `self` is.
    #[must_use]
    pub fn child(&self) -> Self {
        let mut chain = self.chain.clone();
        chain.push(Arc::new(Inner::default()));
        Self { chain }
    }

    /// Cancels this scope and all of its children.
    pub fn cancel(&self) {
        if let Some(own) = self.chain.last() {
            own.flag.store(true, Ordering::SeqCst);
            own.notify.notify_waiters();
        }
    }

    /// Whether this scope or any ancestor has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.chain
            .iter()
            .any(|inner| inner.flag.load(Ordering::SeqCst))
    }

    /// Resolves once this scope (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register on every flag before checking them, so a concurrent
            // cancel cannot slip between the check and the wait.
            let mut waits: Vec<Pin<Box<Notified<'_>>>> = self
                .chain
                .iter()
                .map(|inner| Box::pin(inner.notify.notified()))
                .collect();

            if self.is_cancelled() {
                return;
            }

            poll_fn(|cx| {
                for wait in &mut waits {
                    if wait.as_mut().poll(cx).is_ready() {
                        return Poll::Ready(());
                    }
                }
                // A cancel between the flag check and the registration
                // above would have fired into nothing; re-check now that
                // every waiter is registered.
                if self.is_cancelled() {
                    return Poll::Ready(());
                }
                Poll::Pending
            })
            .await;
        }
    }

    /// Runs `self.is_cancelled()` as a `Result`, for use with `?`.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the scope has been cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sleeps for `duration`, waking early if the scope is cancelled.
///
/// # Errors
///
/// Returns [`Cancelled`] if the scope was cancelled before the duration
/// elapsed.
pub async fn sleep(duration: Duration, token: &CancelToken) -> Result<(), Cancelled> {
    token.check()?;
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = token.cancelled() => Err(Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn cancellation_is_sticky() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn child_sees_parent_cancel() {
        let parent = CancelToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn grandchild_sees_root_cancel() {
        let root = CancelToken::new();
        let grandchild = root.child().child();
        root.cancel();
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn parent_unaffected_by_child_cancel() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter did not wake")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_wakes_child_waiter_on_parent_cancel() {
        let parent = CancelToken::new();
        let child = parent.child();
        let handle = tokio::spawn(async move { child.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("child waiter did not wake")
            .unwrap();
    }

    #[tokio::test]
    async fn sleep_returns_early_on_cancel() {
        let token = CancelToken::new();
        let sleeper = token.clone();
        let started = Instant::now();
        let handle = tokio::spawn(async move { sleep(Duration::from_secs(30), &sleeper).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sleep did not wake")
            .unwrap();
        assert_eq!(result, Err(Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        let result = sleep(Duration::from_millis(5), &token).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn sleep_fails_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let result = sleep(Duration::from_secs(30), &token).await;
        assert_eq!(result, Err(Cancelled));
    }
}
