// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The affinitised worker thread.
//!
//! The automation surface requires every call on one thread with
//! single-threaded apartment affinity, so the bridge cannot run host calls
//! on the async runtime's worker threads. Instead one dedicated OS thread
//! owns the host, [`AutomationHost::init_thread`] declares the apartment on
//! it, and callers enqueue closures whose results come back over oneshot
//! channels. The queue is the scheduling boundary: jobs run strictly
//! sequentially.

use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::error::BridgeError;
use crate::host::AutomationHost;

type Job = Box<dyn FnOnce(&mut dyn AutomationHost) + Send>;

/// Dedicated single-threaded-apartment worker owning the automation host.
#[derive(Debug)]
pub struct StaWorker {
    tx: Option<mpsc::UnboundedSender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl StaWorker {
    /// Spawns the worker thread and moves the host onto it.
    ///
    /// # Errors
    ///
    /// Returns an error when the OS refuses to create the thread.
    pub fn spawn(host: Box<dyn AutomationHost>) -> Result<Self, BridgeError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = std::thread::Builder::new()
            .name("olsync-sta".to_string())
            .spawn(move || {
                let mut host = host;
                host.init_thread();
                while let Some(job) = rx.blocking_recv() {
                    job(host.as_mut());
                }
            })
            .map_err(|e| BridgeError::Launch(format!("failed to spawn worker thread: {e}")))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Runs a closure against the host on the worker thread and awaits its
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::WorkerGone`] when the worker thread has
    /// exited.
    pub async fn run<T, F>(&self, f: F) -> Result<T, BridgeError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn AutomationHost) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        let job: Job = Box::new(move |host| {
            let _ = reply_tx.send(f(host));
        });

        self.tx
            .as_ref()
            .ok_or(BridgeError::WorkerGone)?
            .send(job)
            .map_err(|_| BridgeError::WorkerGone)?;

        reply_rx.await.map_err(|_| BridgeError::WorkerGone)
    }
}

impl Drop for StaWorker {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop after the in-flight job.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
