/*++

Licensed under the Apache-2.0 license.

File Name:

    register_file.rs

Abstract:

    File contains an in-memory register file reachable through the Transport
    trait.

--*/
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::codec::{decode_read_request, decode_write, READ_RESPONSE_LEN};
use crate::{testing::Log, RegAddr, RegData, Transport, TransportError};

/// A plain read/write register file behind the accelerator's wire format.
///
/// Frames are decoded exactly as the bus bridge does, so anything written
/// through a [`crate::RegisterBus`] can be read back through it. Registers
/// that were never written read as zero. Transactions addressed to another
/// device or with a malformed frame are not acknowledged.
pub struct RegisterFile {
    pub log: Log,
    device: u8,
    words: BTreeMap<RegAddr, RegData>,
}

impl RegisterFile {
    pub fn new(device: u8) -> Self {
        Self {
            log: Log::new(),
            device,
            words: BTreeMap::new(),
        }
    }

    /// Read a register without going through the transport.
    pub fn peek(&self, addr: RegAddr) -> RegData {
        self.words.get(&addr).copied().unwrap_or(0)
    }

    /// Write a register without going through the transport.
    pub fn poke(&mut self, addr: RegAddr, val: RegData) {
        self.words.insert(addr, val);
    }
}

impl Transport for RegisterFile {
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError> {
        let decoded = decode_write(bytes).filter(|_| device == self.device);
        let Some((addr, val)) = decoded else {
            writeln!(self.log.w(), "write({device:#x}) ***NACK").unwrap();
            return Err(TransportError::Nack { device });
        };
        writeln!(self.log.w(), "write(*{addr:#06x} <- {val:#x})").unwrap();
        self.words.insert(addr, val);
        Ok(())
    }

    fn write_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        let decoded = decode_read_request(bytes)
            .filter(|_| device == self.device && buf.len() == READ_RESPONSE_LEN);
        let Some(addr) = decoded else {
            writeln!(self.log.w(), "read({device:#x}) ***NACK").unwrap();
            return Err(TransportError::Nack { device });
        };
        let val = self.peek(addr);
        writeln!(self.log.w(), "read(*{addr:#06x} -> {val:#x})").unwrap();
        buf.copy_from_slice(&val.to_le_bytes());
        Ok(())
    }
}
