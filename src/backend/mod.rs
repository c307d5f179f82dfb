pub mod host;
pub mod mock;
#[cfg(feature = "hardware-gpio")]
pub mod fswatch;

pub use host::HostSysfs;
pub use mock::{MockSysfs, MockWatchController, MockWatchFacility};
#[cfg(feature = "hardware-gpio")]
pub use fswatch::NotifyFacility;
