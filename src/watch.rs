use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, trace, warn};
use parking_lot::RwLock;

#[cfg(feature = "hardware-gpio")]
use crate::config::GpioConfig;
use crate::error::GpioError;
use crate::gpio::PinHandle;

const VALUE_ENTRY: &str = "value";

/// One entry of a change-notification batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// An entry inside the watched directory was modified.
    Modify(String),
    /// The facility dropped events; ordering and completeness are lost across it.
    Overflow,
}

/// Filesystem change-notification facility with one-shot watch semantics.
///
/// After a batch is returned from [`wait`](WatchFacility::wait) no further
/// batch is delivered until [`rearm`](WatchFacility::rearm) succeeds.
pub trait WatchFacility: Send {
    fn register(&mut self, dir: &Path) -> Result<(), GpioError>;
    /// Blocks for at most `timeout`; `Ok(None)` means nothing arrived.
    fn wait(&mut self, timeout: Duration) -> Result<Option<Vec<WatchEvent>>, GpioError>;
    fn rearm(&mut self) -> Result<(), GpioError>;
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStatus {
    Stopped,
    Running,
    /// The loop ended on a facility failure or a panicking callback.
    Failed(String),
}

struct WatchShared {
    cancel: AtomicBool,
    overflows: AtomicU64,
    status: RwLock<WatchStatus>,
}

/// Runs `callback` on a dedicated thread each time the pin's `value` entry changes.
///
/// Cancellation is cooperative: the worker notices it at the next wait
/// boundary, which is bounded by the wait timeout. The worker runs at normal
/// priority; low-latency scheduling is left to the platform.
pub struct EdgeWatcher {
    pin: u32,
    shared: Arc<WatchShared>,
    worker: Option<JoinHandle<()>>,
}

impl EdgeWatcher {
    pub fn start<F, C>(
        handle: &PinHandle,
        mut facility: F,
        wait_timeout: Duration,
        callback: C,
    ) -> Result<Self, GpioError>
    where
        F: WatchFacility + 'static,
        C: FnMut() + Send + 'static,
    {
        let pin = handle.number();
        if !handle.is_exported() {
            return Err(GpioError::NotExported(pin));
        }
        if !handle.edge_enabled() {
            return Err(GpioError::InvalidState(format!(
                "gpio{pin} was not initialized with edge detection"
            )));
        }

        let dir = handle.pin_dir();
        facility.register(&dir)?;

        let shared = Arc::new(WatchShared {
            cancel: AtomicBool::new(false),
            overflows: AtomicU64::new(0),
            status: RwLock::new(WatchStatus::Running),
        });
        let worker_shared = shared.clone();

        let spawned = thread::Builder::new()
            .name(format!("gpio{pin}-edge"))
            .spawn(move || run_loop(pin, facility, worker_shared, wait_timeout, callback));
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                *shared.status.write() = WatchStatus::Stopped;
                return Err(GpioError::WatchRegistration {
                    path: dir,
                    reason: format!("spawn worker: {e}"),
                });
            }
        };

        debug!("edge watcher started on {}", dir.display());
        Ok(Self {
            pin,
            shared,
            worker: Some(worker),
        })
    }

    /// Starts a watcher backed by the platform notification facility.
    #[cfg(feature = "hardware-gpio")]
    pub fn watch<C>(handle: &PinHandle, callback: C) -> Result<Self, GpioError>
    where
        C: FnMut() + Send + 'static,
    {
        Self::watch_with_config(handle, &GpioConfig::default(), callback)
    }

    /// Like [`watch`](Self::watch), with the wait boundary taken from `config`.
    #[cfg(feature = "hardware-gpio")]
    pub fn watch_with_config<C>(
        handle: &PinHandle,
        config: &GpioConfig,
        callback: C,
    ) -> Result<Self, GpioError>
    where
        C: FnMut() + Send + 'static,
    {
        Self::start(
            handle,
            crate::backend::NotifyFacility::new(),
            config.watch_wait_timeout(),
            callback,
        )
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn status(&self) -> WatchStatus {
        self.shared.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        *self.shared.status.read() == WatchStatus::Running
    }

    /// Number of overflow signals seen since start.
    pub fn overflow_count(&self) -> u64 {
        self.shared.overflows.load(Ordering::Relaxed)
    }

    /// Requests a stop; safe from any thread, including the callback.
    pub fn cancel(&self) {
        if !self.is_running() {
            return;
        }
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Cancels the loop, waits for the worker to exit and returns its final status.
    pub fn join(mut self) -> WatchStatus {
        self.shutdown();
        self.status()
    }

    fn shutdown(&mut self) {
        self.shared.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            // dropping from inside the callback must not join itself
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                *self.shared.status.write() =
                    WatchStatus::Failed("edge callback panicked".into());
            }
        }
    }
}

impl Drop for EdgeWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop<F, C>(
    pin: u32,
    mut facility: F,
    shared: Arc<WatchShared>,
    wait_timeout: Duration,
    mut callback: C,
) where
    F: WatchFacility,
    C: FnMut(),
{
    let cancelled = || shared.cancel.load(Ordering::Acquire);

    let outcome = 'watch: loop {
        if cancelled() {
            break Ok(());
        }

        let batch = match facility.wait(wait_timeout) {
            Ok(Some(batch)) => batch,
            Ok(None) => continue,
            Err(e) => break Err(e),
        };

        for event in batch {
            match event {
                WatchEvent::Overflow => {
                    shared.overflows.fetch_add(1, Ordering::Relaxed);
                    warn!("gpio{pin} watch overflow, edge events were lost");
                }
                WatchEvent::Modify(name) if name == VALUE_ENTRY => {
                    if cancelled() {
                        break 'watch Ok(());
                    }
                    if panic::catch_unwind(AssertUnwindSafe(&mut callback)).is_err() {
                        break 'watch Err(GpioError::WatchTerminal(
                            "edge callback panicked".into(),
                        ));
                    }
                }
                WatchEvent::Modify(name) => {
                    trace!("gpio{pin} ignoring change on {name}");
                }
            }
        }

        if let Err(e) = facility.rearm() {
            break Err(e);
        }
    };

    facility.close();

    let status = match outcome {
        Ok(()) => {
            debug!("gpio{pin} edge watcher stopped");
            WatchStatus::Stopped
        }
        Err(e) => {
            error!("gpio{pin} edge watcher terminated: {e}");
            WatchStatus::Failed(e.to_string())
        }
    };
    *shared.status.write() = status;
}

