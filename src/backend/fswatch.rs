use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use log::{debug, warn};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::GpioError;
use crate::watch::{WatchEvent, WatchFacility};

const NOTIFY_FACILITY_BATCH_CAPACITY: usize = 64;

type NotifyResult = notify::Result<Event>;

/// Change notifications from the platform watcher (inotify on Linux).
///
/// The underlying watch is persistent, so re-arming only verifies that the
/// watcher is still delivering.
pub struct NotifyFacility {
    tx: Option<Sender<NotifyResult>>,
    rx: Receiver<NotifyResult>,
    watcher: Option<RecommendedWatcher>,
    dir: Option<PathBuf>,
    disconnected: bool,
    // reported on the next re-arm, after the batch collected before it
    pending_error: Option<GpioError>,
}

impl NotifyFacility {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx: Some(tx),
            rx,
            watcher: None,
            dir: None,
            disconnected: false,
            pending_error: None,
        }
    }

    fn translate(event: Event, batch: &mut Vec<WatchEvent>) {
        if event.need_rescan() {
            batch.push(WatchEvent::Overflow);
            return;
        }
        // attribute-only changes (IN_ATTRIB) are not value transitions
        if !matches!(
            event.kind,
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
        ) {
            return;
        }
        for path in &event.paths {
            if let Some(name) = path.file_name() {
                batch.push(WatchEvent::Modify(name.to_string_lossy().into_owned()));
            }
        }
    }

    fn accept(msg: NotifyResult, batch: &mut Vec<WatchEvent>) -> Result<(), GpioError> {
        match msg {
            Ok(event) => {
                Self::translate(event, batch);
                Ok(())
            }
            Err(e) => Err(GpioError::WatchTerminal(format!("notify: {e}"))),
        }
    }
}

impl Default for NotifyFacility {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchFacility for NotifyFacility {
    fn register(&mut self, dir: &Path) -> Result<(), GpioError> {
        let registration_error = |reason: String| GpioError::WatchRegistration {
            path: dir.to_path_buf(),
            reason,
        };

        let tx = self
            .tx
            .take()
            .ok_or_else(|| registration_error("facility already registered".into()))?;
        let mut watcher =
            notify::recommended_watcher(tx).map_err(|e| registration_error(e.to_string()))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| registration_error(e.to_string()))?;

        debug!("watching {}", dir.display());
        self.watcher = Some(watcher);
        self.dir = Some(dir.to_path_buf());
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<Option<Vec<WatchEvent>>, GpioError> {
        let first = match self.rx.recv_timeout(timeout) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.disconnected = true;
                return Err(GpioError::WatchTerminal("notify channel closed".into()));
            }
        };

        let mut batch = Vec::new();
        Self::accept(first, &mut batch)?;
        while batch.len() < NOTIFY_FACILITY_BATCH_CAPACITY {
            match self.rx.try_recv() {
                Ok(msg) => {
                    if let Err(e) = Self::accept(msg, &mut batch) {
                        if batch.is_empty() {
                            return Err(e);
                        }
                        self.pending_error = Some(e);
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }

        Ok(Some(batch))
    }

    fn rearm(&mut self) -> Result<(), GpioError> {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }
        if self.watcher.is_none() || self.disconnected {
            return Err(GpioError::WatchTerminal(
                "notify watcher is no longer delivering".into(),
            ));
        }
        Ok(())
    }

    fn close(&mut self) {
        if let (Some(mut watcher), Some(dir)) = (self.watcher.take(), self.dir.take()) {
            if let Err(e) = watcher.unwatch(&dir) {
                warn!("unwatch {} failed: {e}", dir.display());
            }
        }
    }
}
