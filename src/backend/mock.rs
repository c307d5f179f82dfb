use std::collections::{BTreeSet, VecDeque};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::GpioError;
use crate::gpio::{SysfsIo, SysfsPaths};
use crate::watch::{WatchEvent, WatchFacility};

/// In-memory stand-in for the sysfs GPIO class directory.
///
/// Exporting a pin creates its `direction`, `value` and `edge` attributes;
/// `value` echoes the last write. Every write attempt is logged.
pub struct MockSysfs {
    paths: SysfsPaths,
    state: Mutex<MockSysfsState>,
}

#[derive(Default)]
struct MockSysfsState {
    exported: BTreeSet<u32>,
    files: FxHashMap<PathBuf, Vec<u8>>,
    writes: Vec<(PathBuf, Vec<u8>)>,
    failing: FxHashSet<PathBuf>,
}

impl MockSysfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: SysfsPaths::new(root),
            state: Mutex::new(MockSysfsState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn exported_pins(&self) -> Vec<u32> {
        self.state.lock().exported.iter().copied().collect()
    }

    pub fn writes(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.state.lock().writes.clone()
    }

    pub fn writes_to(&self, path: &Path) -> usize {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    /// Overwrites an attribute the way the kernel would, bypassing write checks.
    pub fn set_contents(&self, path: &Path, data: &[u8]) {
        self.state
            .lock()
            .files
            .insert(path.to_path_buf(), data.to_vec());
    }

    /// Makes every subsequent read or write of `path` fail with `PermissionDenied`.
    pub fn fail_path(&self, path: &Path) {
        self.state.lock().failing.insert(path.to_path_buf());
    }

    pub fn clear_failure(&self, path: &Path) {
        self.state.lock().failing.remove(path);
    }

    fn parse_pin(data: &[u8]) -> io::Result<u32> {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "invalid pin number"))
    }

    fn pin_files(&self, number: u32) -> [PathBuf; 3] {
        [
            self.paths.direction(number),
            self.paths.value(number),
            self.paths.edge(number),
        ]
    }
}

impl SysfsIo for MockSysfs {
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        state.writes.push((path.to_path_buf(), data.to_vec()));

        if state.failing.contains(path) {
            return Err(io::Error::new(ErrorKind::PermissionDenied, "injected failure"));
        }

        if path == self.paths.export() {
            let number = Self::parse_pin(data)?;
            if !state.exported.insert(number) {
                return Err(io::Error::new(
                    ErrorKind::ResourceBusy,
                    format!("gpio{number} already exported"),
                ));
            }
            let [direction, value, edge] = self.pin_files(number);
            state.files.insert(direction, b"in".to_vec());
            state.files.insert(value, b"0".to_vec());
            state.files.insert(edge, b"none".to_vec());
            return Ok(());
        }

        if path == self.paths.unexport() {
            let number = Self::parse_pin(data)?;
            if !state.exported.remove(&number) {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("gpio{number} is not exported"),
                ));
            }
            for file in self.pin_files(number) {
                state.files.remove(&file);
            }
            return Ok(());
        }

        if !state.files.contains_key(path) {
            return Err(io::Error::new(ErrorKind::NotFound, "no such attribute"));
        }

        let token = std::str::from_utf8(data).unwrap_or_default();
        let valid = match path.file_name().and_then(|n| n.to_str()) {
            Some("direction") => matches!(token, "in" | "out"),
            Some("edge") => matches!(token, "none" | "rising" | "falling" | "both"),
            Some("value") => {
                let direction = path.with_file_name("direction");
                if state.files.get(&direction).map(Vec::as_slice) == Some(b"in".as_slice()) {
                    return Err(io::Error::new(
                        ErrorKind::PermissionDenied,
                        "value is read-only for input pins",
                    ));
                }
                matches!(token, "0" | "1")
            }
            _ => true,
        };
        if !valid {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid token {token:?}"),
            ));
        }

        state.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn read_byte(&self, path: &Path) -> io::Result<u8> {
        let state = self.state.lock();
        if state.failing.contains(path) {
            return Err(io::Error::new(ErrorKind::PermissionDenied, "injected failure"));
        }
        let contents = state
            .files
            .get(path)
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "no such attribute"))?;
        contents
            .first()
            .copied()
            .ok_or_else(|| io::Error::from(ErrorKind::UnexpectedEof))
    }
}

#[derive(Default)]
struct MockWatchState {
    registered: Option<PathBuf>,
    armed: bool,
    closed: bool,
    queue: VecDeque<Vec<WatchEvent>>,
    fail_registration: bool,
    fail_rearm: bool,
    fail_wait: bool,
    rearms: usize,
}

type MockWatchShared = Arc<(Mutex<MockWatchState>, Condvar)>;

/// Scripted one-shot notification facility, driven by a [`MockWatchController`].
#[derive(Default)]
pub struct MockWatchFacility {
    shared: MockWatchShared,
}

/// Test-side handle for injecting batches and failures into a [`MockWatchFacility`].
#[derive(Clone)]
pub struct MockWatchController {
    shared: MockWatchShared,
}

impl MockWatchFacility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(&self) -> MockWatchController {
        MockWatchController {
            shared: self.shared.clone(),
        }
    }
}

impl MockWatchController {
    pub fn push_batch(&self, batch: Vec<WatchEvent>) {
        let (lock, cvar) = &*self.shared;
        lock.lock().queue.push_back(batch);
        cvar.notify_all();
    }

    pub fn fail_registration(&self) {
        self.shared.0.lock().fail_registration = true;
    }

    pub fn fail_next_rearm(&self) {
        self.shared.0.lock().fail_rearm = true;
    }

    pub fn fail_wait(&self) {
        let (lock, cvar) = &*self.shared;
        lock.lock().fail_wait = true;
        cvar.notify_all();
    }

    pub fn registered_dir(&self) -> Option<PathBuf> {
        self.shared.0.lock().registered.clone()
    }

    pub fn is_armed(&self) -> bool {
        self.shared.0.lock().armed
    }

    pub fn is_closed(&self) -> bool {
        self.shared.0.lock().closed
    }

    pub fn pending_batches(&self) -> usize {
        self.shared.0.lock().queue.len()
    }

    pub fn rearm_count(&self) -> usize {
        self.shared.0.lock().rearms
    }
}

impl WatchFacility for MockWatchFacility {
    fn register(&mut self, dir: &Path) -> Result<(), GpioError> {
        let mut state = self.shared.0.lock();
        if state.fail_registration {
            return Err(GpioError::WatchRegistration {
                path: dir.to_path_buf(),
                reason: "injected failure".into(),
            });
        }
        state.registered = Some(dir.to_path_buf());
        state.armed = true;
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<Option<Vec<WatchEvent>>, GpioError> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        if state.queue.is_empty() && !state.fail_wait {
            cvar.wait_for(&mut state, timeout);
        }
        if state.fail_wait {
            return Err(GpioError::WatchTerminal("injected wait failure".into()));
        }
        if !state.armed {
            return Err(GpioError::WatchTerminal("wait on a disarmed watch".into()));
        }
        match state.queue.pop_front() {
            Some(batch) => {
                state.armed = false;
                Ok(Some(batch))
            }
            None => Ok(None),
        }
    }

    fn rearm(&mut self) -> Result<(), GpioError> {
        let mut state = self.shared.0.lock();
        if state.fail_rearm {
            state.fail_rearm = false;
            return Err(GpioError::WatchTerminal("injected re-arm failure".into()));
        }
        state.armed = true;
        state.rearms += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.shared.0.lock();
        state.armed = false;
        state.closed = true;
    }
}
