/*++

Licensed under the Apache-2.0 license.

File Name:

    fake_transport.rs

Abstract:

    File contains code for a fake implementation of the Transport trait.

--*/
use std::fmt::Write;

use crate::{testing::Log, Transport, TransportError};

/// A Transport implementation that logs all calls and returns canned data.
///
/// # Example
///
/// ```
/// use hmac_fpga_bus::{testing::FakeTransport, Transport};
///
/// let mut fake = FakeTransport::new();
/// fake.read_data = vec![0x03, 0, 0, 0];
/// let mut buf = [0u8; 4];
/// fake.write_read(0x50, &[0x00, 0x04], &mut buf).unwrap();
/// assert_eq!(buf, [0x03, 0, 0, 0]);
/// assert_eq!("write_read(0x50, 0004, 4)\n", fake.log.take());
/// ```
pub struct FakeTransport {
    pub log: Log,

    /// Bytes returned by every `write_read`; a shorter vector than the
    /// requested length produces `TransportError::ShortRead`.
    pub read_data: Vec<u8>,

    /// Fail every transaction with `TransportError::Nack`.
    pub nack: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            log: Log::new(),
            read_data: vec![0; 4],
            nack: false,
        }
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FakeTransport {
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError> {
        writeln!(self.log.w(), "write({device:#x}, {})", hex::encode(bytes)).unwrap();
        if self.nack {
            return Err(TransportError::Nack { device });
        }
        Ok(())
    }

    fn write_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        writeln!(
            self.log.w(),
            "write_read({device:#x}, {}, {})",
            hex::encode(bytes),
            buf.len()
        )
        .unwrap();
        if self.nack {
            return Err(TransportError::Nack { device });
        }
        if self.read_data.len() < buf.len() {
            return Err(TransportError::ShortRead {
                device,
                expected: buf.len(),
                actual: self.read_data.len(),
            });
        }
        buf.copy_from_slice(&self.read_data[..buf.len()]);
        Ok(())
    }
}
