//! Background maintenance thread.
//!
//! On every tick: reap idle transactions (when an idle timeout is set),
//! then run a GC pass. The thread sleeps on a condvar so shutdown wakes it
//! immediately instead of waiting out the interval, and the stop flag is
//! only held while sleeping.

use parking_lot::{Condvar, Mutex};
use snapkv_concurrency::TransactionManager;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Signal {
    stop: Mutex<bool>,
    wake: Condvar,
}

impl Signal {
    fn new() -> Self {
        Signal {
            stop: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Sleep up to `interval`; true once stop was requested
    ///
    /// The lock is released on return, so a stop request never waits on
    /// the maintenance work that follows.
    fn wait_tick(&self, interval: Duration) -> bool {
        let mut stop = self.stop.lock();
        if !*stop {
            self.wake.wait_for(&mut stop, interval);
        }
        *stop
    }

    fn request_stop(&self) {
        *self.stop.lock() = true;
        self.wake.notify_all();
    }
}

pub(crate) struct MaintenanceWorker {
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceWorker {
    pub(crate) fn spawn<K, V>(
        manager: Arc<TransactionManager<K, V>>,
        interval: Duration,
        idle_timeout: Option<Duration>,
    ) -> std::io::Result<Self>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let signal = Arc::new(Signal::new());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name("snapkv-maintenance".to_string())
            .spawn(move || {
                tracing::debug!(?interval, ?idle_timeout, "Maintenance thread started");
                while !thread_signal.wait_tick(interval) {
                    if let Some(timeout) = idle_timeout {
                        manager.reap_idle(timeout);
                    }
                    manager.gc();
                }
                tracing::debug!("Maintenance thread stopped");
            })?;

        Ok(MaintenanceWorker {
            signal,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    pub(crate) fn stop(&mut self) {
        self.signal.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Maintenance thread panicked");
            }
        }
    }
}

impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
