// Licensed under the Apache-2.0 license

//! Transport over a Linux `i2c-dev` character device.
//!
//! Each transaction is issued as a single `I2C_RDWR` ioctl, so a register
//! read (address write followed by a data read) happens with a repeated start
//! and no other master can slip in between the two phases.

use std::{
    fs::{File, OpenOptions},
    io,
    os::fd::AsRawFd,
    path::Path,
};

use crate::{Transport, TransportError};

/// ioctl request number for combined transfers, from `linux/i2c-dev.h`.
const I2C_RDWR: libc::c_ulong = 0x0707;

/// Message flag marking a read, from `linux/i2c.h`.
const I2C_M_RD: u16 = 0x0001;

#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

/// An open `/dev/i2c-N` bus. The device node is closed when this is dropped.
pub struct LinuxI2c {
    file: File,
}

impl LinuxI2c {
    /// Open I2C bus number `bus`.
    pub fn open(bus: u32) -> Result<Self, TransportError> {
        Self::open_path(format!("/dev/i2c-{bus}"))
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => Ok(Self { file }),
            Err(source) => Err(TransportError::Unavailable { path, source }),
        }
    }

    fn transfer(&mut self, device: u8, msgs: &mut [I2cMsg]) -> Result<(), TransportError> {
        let mut data = I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };
        let rv = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_RDWR as _,
                &mut data as *mut I2cRdwrIoctlData,
            )
        };
        if rv < 0 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                // i2c bus drivers report a missing ACK as either of these
                Some(libc::ENXIO) | Some(libc::EREMOTEIO) => TransportError::Nack { device },
                _ => TransportError::Io {
                    device,
                    source: err,
                },
            });
        }
        if rv as usize != msgs.len() {
            return Err(TransportError::Io {
                device,
                source: io::Error::new(
                    io::ErrorKind::Other,
                    format!("only {rv} of {} messages transferred", msgs.len()),
                ),
            });
        }
        Ok(())
    }
}

fn msg_len(device: u8, len: usize) -> Result<u16, TransportError> {
    u16::try_from(len).map_err(|_| TransportError::Io {
        device,
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{len} bytes exceed a single i2c message"),
        ),
    })
}

impl Transport for LinuxI2c {
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError> {
        // The kernel only reads from the buffer of a write message.
        let mut msgs = [I2cMsg {
            addr: u16::from(device),
            flags: 0,
            len: msg_len(device, bytes.len())?,
            buf: bytes.as_ptr() as *mut u8,
        }];
        self.transfer(device, &mut msgs)
    }

    fn write_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        let mut msgs = [
            I2cMsg {
                addr: u16::from(device),
                flags: 0,
                len: msg_len(device, bytes.len())?,
                buf: bytes.as_ptr() as *mut u8,
            },
            I2cMsg {
                addr: u16::from(device),
                flags: I2C_M_RD,
                len: msg_len(device, buf.len())?,
                buf: buf.as_mut_ptr(),
            },
        ];
        self.transfer(device, &mut msgs)
    }
}
