//! Sysfs GPIO pin lifecycle and edge watching.
//!
//! [`PinHandle`] exports and configures one pin through the `/sys/class/gpio`
//! control files. [`EdgeWatcher`] runs a callback on a dedicated thread each
//! time an edge-enabled pin's `value` attribute changes.

pub mod backend;
mod config;
mod error;
mod gpio;
mod watch;

pub use config::{
    DEFAULT_SYSFS_ROOT, DEFAULT_WATCH_WAIT_TIMEOUT_MS, Direction, EdgeDetect, GpioConfig,
    PinConfig,
};
pub use error::GpioError;
pub use gpio::{PinHandle, SysfsIo, SysfsPaths};
pub use watch::{EdgeWatcher, WatchEvent, WatchFacility, WatchStatus};

pub use backend::HostSysfs;
#[cfg(feature = "hardware-gpio")]
pub use backend::NotifyFacility;
pub use backend::{MockSysfs, MockWatchController, MockWatchFacility};
