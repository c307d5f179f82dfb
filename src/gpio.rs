use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::backend::HostSysfs;
use crate::config::{DEFAULT_SYSFS_ROOT, Direction, EdgeDetect, GpioConfig};
use crate::error::GpioError;

/// Narrow file access used for every sysfs attribute.
pub trait SysfsIo: Send + Sync {
    /// Writes `data` to an existing attribute. Must not create the file.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    /// Reads the first byte of an attribute.
    fn read_byte(&self, path: &Path) -> io::Result<u8>;
}

/// Layout of the sysfs GPIO class directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsPaths {
    root: PathBuf,
}

impl SysfsPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn export(&self) -> PathBuf {
        self.root.join("export")
    }

    pub fn unexport(&self) -> PathBuf {
        self.root.join("unexport")
    }

    pub fn pin_dir(&self, number: u32) -> PathBuf {
        self.root.join(format!("gpio{number}"))
    }

    pub fn direction(&self, number: u32) -> PathBuf {
        self.pin_dir(number).join("direction")
    }

    pub fn value(&self, number: u32) -> PathBuf {
        self.pin_dir(number).join("value")
    }

    pub fn edge(&self, number: u32) -> PathBuf {
        self.pin_dir(number).join("edge")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportState {
    Unexported,
    // exported at the OS level, configuration did not complete
    Partial,
    Exported,
}

/// Owns the export and configuration state of one sysfs GPIO pin.
///
/// `init` is idempotent: a second call releases the pin before exporting it
/// again. `release` never fails and runs on drop.
///
/// A handle may feed at most one running [`EdgeWatcher`](crate::EdgeWatcher);
/// attaching a second watcher while one runs is unsupported.
pub struct PinHandle {
    io: Arc<dyn SysfsIo>,
    paths: SysfsPaths,
    number: u32,
    direction: Direction,
    state: ExportState,
    edge: EdgeDetect,
    label: Option<String>,
}

impl PinHandle {
    pub fn new(
        io: Arc<dyn SysfsIo>,
        root: impl Into<PathBuf>,
        number: u32,
        direction: Direction,
    ) -> Self {
        Self {
            io,
            paths: SysfsPaths::new(root),
            number,
            direction,
            state: ExportState::Unexported,
            edge: EdgeDetect::None,
            label: None,
        }
    }

    /// Handle on the host's `/sys/class/gpio`.
    pub fn host(number: u32, direction: Direction) -> Self {
        Self::new(Arc::new(HostSysfs), DEFAULT_SYSFS_ROOT, number, direction)
    }

    /// Builds an un-exported handle for a pin declared in `config`.
    pub fn from_config(
        io: Arc<dyn SysfsIo>,
        config: &GpioConfig,
        number: u32,
    ) -> Result<Self, GpioError> {
        let pin = config.pin(number)?;
        let mut handle = Self::new(io, config.sysfs_root.clone(), number, pin.direction);
        handle.label = Some(pin.name.clone());
        Ok(handle)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Name given to the pin in configuration, if it came from one.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn edge(&self) -> EdgeDetect {
        self.edge
    }

    pub fn edge_enabled(&self) -> bool {
        self.edge != EdgeDetect::None
    }

    pub fn is_exported(&self) -> bool {
        self.state == ExportState::Exported
    }

    pub fn paths(&self) -> &SysfsPaths {
        &self.paths
    }

    pub fn pin_dir(&self) -> PathBuf {
        self.paths.pin_dir(self.number)
    }

    pub fn value_path(&self) -> PathBuf {
        self.paths.value(self.number)
    }

    /// Exports and configures the pin, with `"both"` edges when `edge_enabled`.
    pub fn init(&mut self, edge_enabled: bool) -> Result<(), GpioError> {
        let edge = if edge_enabled {
            EdgeDetect::Both
        } else {
            EdgeDetect::None
        };
        self.init_with_edge(edge)
    }

    pub fn init_with_edge(&mut self, edge: EdgeDetect) -> Result<(), GpioError> {
        if self.state != ExportState::Unexported {
            self.release();
        }

        let number = self.number.to_string();
        self.io
            .write(&self.paths.export(), number.as_bytes())
            .map_err(|source| GpioError::Export {
                pin: self.number,
                source,
            })?;
        self.state = ExportState::Partial;

        self.io
            .write(
                &self.paths.direction(self.number),
                self.direction.as_token().as_bytes(),
            )
            .map_err(|source| GpioError::Configure {
                pin: self.number,
                attribute: "direction",
                source,
            })?;

        if edge != EdgeDetect::None {
            self.io
                .write(&self.paths.edge(self.number), edge.as_token().as_bytes())
                .map_err(|source| GpioError::Configure {
                    pin: self.number,
                    attribute: "edge",
                    source,
                })?;
        }

        self.edge = edge;
        self.state = ExportState::Exported;
        debug!(
            "gpio{} ({}) exported as {} (edge {})",
            self.number,
            self.label().unwrap_or("unnamed"),
            self.direction,
            edge.as_token()
        );
        Ok(())
    }

    /// Returns 1 when the value attribute starts with `'1'`, otherwise 0.
    pub fn read(&self) -> Result<u8, GpioError> {
        self.ensure_exported()?;
        let byte = self
            .io
            .read_byte(&self.value_path())
            .map_err(|source| GpioError::Io {
                pin: self.number,
                source,
            })?;
        Ok(u8::from(byte == b'1'))
    }

    pub fn write(&self, value: u8) -> Result<(), GpioError> {
        if value > 1 {
            return Err(GpioError::InvalidValue("Value must be 0 or 1".into()));
        }
        self.ensure_exported()?;
        if self.direction != Direction::Out {
            return Err(GpioError::InvalidState(format!(
                "gpio{} must be in output mode to set value",
                self.number
            )));
        }

        self.io
            .write(&self.value_path(), &[b'0' + value])
            .map_err(|source| GpioError::Io {
                pin: self.number,
                source,
            })
    }

    /// Unexports the pin if this handle exported it. Failures are logged only.
    pub fn release(&mut self) {
        if self.state == ExportState::Unexported {
            return;
        }

        let number = self.number.to_string();
        if let Err(e) = self.io.write(&self.paths.unexport(), number.as_bytes()) {
            warn!("unexport gpio{} failed: {e}", self.number);
        } else {
            debug!("gpio{} unexported", self.number);
        }
        self.state = ExportState::Unexported;
        self.edge = EdgeDetect::None;
    }

    fn ensure_exported(&self) -> Result<(), GpioError> {
        if self.is_exported() {
            Ok(())
        } else {
            Err(GpioError::NotExported(self.number))
        }
    }
}

impl Drop for PinHandle {
    fn drop(&mut self) {
        self.release();
    }
}
