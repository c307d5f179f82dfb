use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::gpio::SysfsIo;

/// Direct access to the kernel's sysfs attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSysfs;

impl SysfsIo for HostSysfs {
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        // attributes are never created from userspace
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(data)?;
        file.flush()
    }

    fn read_byte(&self, path: &Path) -> io::Result<u8> {
        let mut file = File::open(path)?;
        let mut data = [0u8; 1];
        file.read_exact(&mut data)?;
        Ok(data[0])
    }
}
