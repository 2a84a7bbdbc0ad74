/*++

Licensed under the Apache-2.0 license.

File Name:

    register_bus.rs

Abstract:

    File contains register and buffer access on top of a Transport.

--*/

use thiserror::Error;

use crate::codec::{decode_value, encode_read_request, encode_write, READ_RESPONSE_LEN};
use crate::{RegAddr, RegData, Transport, TransportError, WORD_SIZE};

#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A buffer transfer would run past the last register address.
    #[error("{len} bytes at {base:#06x} run past the end of the register address space")]
    AddressOverflow { base: RegAddr, len: usize },
}

/// Register-level access to one peripheral on a [`Transport`].
///
/// Every register access is a single transaction; buffers are moved one word
/// per transaction since the accelerator has no burst access.
pub struct RegisterBus<T: Transport> {
    transport: T,
    device: u8,
}

impl<T: Transport> RegisterBus<T> {
    /// Create a register bus talking to the peripheral at `device`.
    pub fn new(transport: T, device: u8) -> Self {
        Self { transport, device }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give up register access and return the underlying transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Write a 32-bit register.
    pub fn write_register(&mut self, addr: RegAddr, val: RegData) -> Result<(), TransportError> {
        self.transport.write(self.device, &encode_write(addr, val))
    }

    /// Read a 32-bit register.
    pub fn read_register(&mut self, addr: RegAddr) -> Result<RegData, TransportError> {
        let mut buf = [0u8; READ_RESPONSE_LEN];
        self.transport
            .write_read(self.device, &encode_read_request(addr), &mut buf)?;
        Ok(decode_value(buf))
    }

    /// Write `data` to consecutive words starting at `base`.
    ///
    /// A trailing partial word is zero-extended; the accelerator only consumes
    /// the bytes of its declared buffer length.
    pub fn write_buffer(&mut self, base: RegAddr, data: &[u8]) -> Result<(), BusError> {
        check_span(base, data.len())?;
        for (i, chunk) in data.chunks(WORD_SIZE).enumerate() {
            let mut word = [0u8; WORD_SIZE];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write_register(word_addr(base, i), RegData::from_le_bytes(word))?;
        }
        Ok(())
    }

    /// Read `len` bytes from consecutive words starting at `base`. Bytes of
    /// the final word past `len` are discarded.
    pub fn read_buffer(&mut self, base: RegAddr, len: usize) -> Result<Vec<u8>, BusError> {
        check_span(base, len)?;
        let mut data = Vec::with_capacity(len.div_ceil(WORD_SIZE) * WORD_SIZE);
        for i in 0..len.div_ceil(WORD_SIZE) {
            let word = self.read_register(word_addr(base, i))?;
            data.extend_from_slice(&word.to_le_bytes());
        }
        data.truncate(len);
        Ok(data)
    }
}

/// Rejects transfers whose last word would not be addressable, before any
/// transaction is issued.
fn check_span(base: RegAddr, len: usize) -> Result<(), BusError> {
    let words = len.div_ceil(WORD_SIZE);
    if words == 0 {
        return Ok(());
    }
    let last = (words - 1)
        .checked_mul(WORD_SIZE)
        .and_then(|offset| offset.checked_add(usize::from(base)));
    match last {
        Some(last) if last <= usize::from(RegAddr::MAX) => Ok(()),
        _ => Err(BusError::AddressOverflow { base, len }),
    }
}

fn word_addr(base: RegAddr, index: usize) -> RegAddr {
    // check_span() guarantees the sum fits
    (usize::from(base) + index * WORD_SIZE) as RegAddr
}
