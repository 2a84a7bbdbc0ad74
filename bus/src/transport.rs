/*++

Licensed under the Apache-2.0 license.

File Name:

    transport.rs

Abstract:

    File contains definition of the Transport trait.

--*/

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The host bus interface could not be opened.
    #[error("bus interface {} is unavailable", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The peripheral did not acknowledge its address or data.
    #[error("device {device:#04x} did not acknowledge")]
    Nack { device: u8 },

    /// The peripheral returned fewer bytes than requested.
    #[error("expected {expected} bytes from device {device:#04x}, received {actual}")]
    ShortRead {
        device: u8,
        expected: usize,
        actual: usize,
    },

    /// Any other failure of an individual transaction.
    #[error("transaction with device {device:#04x} failed")]
    Io {
        device: u8,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// True if the bus itself could not be acquired, as opposed to a
    /// transaction on an open bus failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Represents a byte-oriented, addressable bus with combined transactions.
/// Implementations carry no knowledge of the register protocol.
pub trait Transport {
    /// Send `bytes` to `device` as one indivisible write transaction.
    ///
    /// # Error
    ///
    /// * `TransportError` - The peripheral is absent or did not acknowledge
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError>;

    /// Write `bytes` to `device` and, without releasing the bus, read exactly
    /// `buf.len()` bytes back from the same device.
    ///
    /// # Error
    ///
    /// * `TransportError` - The peripheral is absent, did not acknowledge or
    ///                      returned fewer bytes than requested
    fn write_read(&mut self, device: u8, bytes: &[u8], buf: &mut [u8])
        -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(device, bytes)
    }

    fn write_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        (**self).write_read(device, bytes, buf)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(device, bytes)
    }

    fn write_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        (**self).write_read(device, bytes, buf)
    }
}
