use std::{fmt, fs, path::Path, path::PathBuf, time::Duration};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::GpioError;

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";
pub const DEFAULT_WATCH_WAIT_TIMEOUT_MS: u64 = 10;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Token accepted by the `direction` attribute.
    pub fn as_token(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeDetect {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

impl EdgeDetect {
    /// Token accepted by the `edge` attribute.
    pub fn as_token(&self) -> &'static str {
        match self {
            EdgeDetect::None => "none",
            EdgeDetect::Rising => "rising",
            EdgeDetect::Falling => "falling",
            EdgeDetect::Both => "both",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PinConfig {
    pub name: String,
    pub direction: Direction,
    #[serde(default)]
    pub edge: EdgeDetect,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GpioConfig {
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default = "default_watch_wait_timeout_ms")]
    pub watch_wait_timeout_ms: u64,
    #[serde(default)]
    pub pins: FxHashMap<u32, PinConfig>,
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_ROOT)
}

fn default_watch_wait_timeout_ms() -> u64 {
    DEFAULT_WATCH_WAIT_TIMEOUT_MS
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            watch_wait_timeout_ms: default_watch_wait_timeout_ms(),
            pins: FxHashMap::default(),
        }
    }
}

impl GpioConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GpioError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| GpioError::Config(format!("Failed to read config: {e}")))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, GpioError> {
        serde_json::from_str(contents)
            .map_err(|e| GpioError::Config(format!("Invalid config json: {e}")))
    }

    pub fn pin(&self, number: u32) -> Result<&PinConfig, GpioError> {
        self.pins.get(&number).ok_or(GpioError::NotFoundPin(number))
    }

    pub fn watch_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.watch_wait_timeout_ms)
    }
}
