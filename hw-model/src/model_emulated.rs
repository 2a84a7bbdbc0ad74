// Licensed under the Apache-2.0 license

use std::fmt::Write;

use hmac_fpga_bus::codec::{decode_read_request, decode_write, READ_RESPONSE_LEN};
use hmac_fpga_bus::testing::Log;
use hmac_fpga_bus::{RegAddr, RegData, Transport, TransportError, WORD_SIZE};
use hmac_fpga_registers::{AlgorithmProfile, Control, Region, Status};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::InMemoryRegister;
use tock_registers::LocalRegisterCopy;

use crate::reference;

/// Number of status reads until a computation reports DONE and IDLE.
const DEFAULT_LATENCY_POLLS: u32 = 3;

/// Misbehavior the emulated accelerator can be told to exhibit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FaultInjection {
    #[default]
    None,

    /// Flip the low bit of this digest byte when the digest is published.
    CorruptDigestByte(usize),

    /// Stay busy forever after the start bit.
    NeverComplete,

    /// Raise DONE but never return to IDLE.
    DoneWithoutIdle,
}

struct Pending {
    digest: Vec<u8>,
    polls: u32,
}

/// Software model of the HMAC accelerator behind its bus bridge.
///
/// The model speaks the same wire format as the hardware: 6-byte register
/// writes and 2-byte read requests followed by a 4-byte read. The key region
/// is write-only, the message region read/write and the digest region
/// read-only; any other access, or a transaction for another device, is not
/// acknowledged.
///
/// After the start bit, status reads step the computation forward: the model
/// reports busy, then DONE alone with the digest not yet published, then
/// DONE and IDLE with the digest in place.
pub struct ModelEmulated {
    /// Every transaction, one line each.
    pub log: Log,

    profile: &'static AlgorithmProfile,
    device: u8,
    fault: FaultInjection,
    latency_polls: u32,

    control: InMemoryRegister<u32, Control::Register>,
    status: InMemoryRegister<u32, Status::Register>,
    key: Vec<u8>,
    msg: Vec<u8>,
    digest: Vec<u8>,

    pending: Option<Pending>,
    starts: u32,
    status_reads: u32,
    digest_reads: u32,
}

fn word_storage(region: Region) -> Vec<u8> {
    vec![0; region.len.div_ceil(WORD_SIZE) * WORD_SIZE]
}

impl ModelEmulated {
    pub fn new(profile: &'static AlgorithmProfile, device: u8) -> Self {
        Self {
            log: Log::new(),
            profile,
            device,
            fault: FaultInjection::None,
            latency_polls: DEFAULT_LATENCY_POLLS,
            control: InMemoryRegister::new(0),
            status: InMemoryRegister::new(Status::IDLE::SET.value),
            key: word_storage(profile.key()),
            msg: word_storage(profile.msg()),
            digest: word_storage(profile.digest()),
            pending: None,
            starts: 0,
            status_reads: 0,
            digest_reads: 0,
        }
    }

    pub fn with_fault(mut self, fault: FaultInjection) -> Self {
        self.fault = fault;
        self
    }

    /// Number of status reads after the start bit until DONE and IDLE are
    /// reported together. Values below 1 are treated as 1.
    pub fn with_latency_polls(mut self, polls: u32) -> Self {
        self.latency_polls = polls.max(1);
        self
    }

    pub fn profile(&self) -> &'static AlgorithmProfile {
        self.profile
    }

    /// Key bytes as loaded through the bus.
    pub fn key(&self) -> &[u8] {
        &self.key[..self.profile.key_len]
    }

    /// Message bytes as loaded through the bus.
    pub fn message(&self) -> &[u8] {
        &self.msg[..self.profile.msg_len]
    }

    /// Number of times the start bit was written.
    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    /// Number of register reads that hit the digest region.
    pub fn digest_reads(&self) -> u32 {
        self.digest_reads
    }

    fn start(&mut self) {
        self.starts += 1;
        let digest = reference::hmac(self.profile.algorithm, self.key(), self.message())
            .unwrap_or_default();
        self.pending = Some(Pending { digest, polls: 0 });
        self.status.set(0);
    }

    /// Advance a running computation by one status read.
    fn step(&mut self) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        if self.fault == FaultInjection::NeverComplete {
            return;
        }
        pending.polls += 1;
        if pending.polls + 1 == self.latency_polls
            || self.fault == FaultInjection::DoneWithoutIdle
        {
            self.status.write(Status::DONE::SET);
        }
        if pending.polls >= self.latency_polls && self.fault != FaultInjection::DoneWithoutIdle {
            let mut digest = std::mem::take(&mut pending.digest);
            if let FaultInjection::CorruptDigestByte(i) = self.fault {
                if let Some(byte) = digest.get_mut(i) {
                    *byte ^= 0x01;
                }
            }
            self.digest.fill(0);
            self.digest[..digest.len()].copy_from_slice(&digest);
            self.status.write(Status::DONE::SET + Status::IDLE::SET);
            self.pending = None;
        }
    }

    fn store(&mut self, addr: RegAddr, val: RegData) -> bool {
        let profile = self.profile;
        if addr == profile.ctrl_addr {
            let control = LocalRegisterCopy::<u32, Control::Register>::new(val);
            if control.is_set(Control::START) {
                self.start();
            }
            // START is self-clearing
            self.control.set(val & !Control::START::SET.value);
            true
        } else if profile.key().contains(addr) {
            store_word(&mut self.key, profile.key(), addr, val)
        } else if profile.msg().contains(addr) {
            store_word(&mut self.msg, profile.msg(), addr, val)
        } else {
            false
        }
    }

    fn load(&mut self, addr: RegAddr) -> Option<RegData> {
        let profile = self.profile;
        if addr == profile.ctrl_addr {
            Some(self.control.get())
        } else if addr == profile.status_addr {
            self.status_reads += 1;
            self.step();
            Some(self.status.get())
        } else if profile.msg().contains(addr) {
            load_word(&self.msg, profile.msg(), addr)
        } else if profile.digest().contains(addr) {
            self.digest_reads += 1;
            load_word(&self.digest, profile.digest(), addr)
        } else {
            None
        }
    }
}

fn word_index(region: Region, addr: RegAddr) -> Option<usize> {
    let offset = usize::from(addr - region.base);
    (offset % WORD_SIZE == 0).then_some(offset)
}

fn store_word(storage: &mut [u8], region: Region, addr: RegAddr, val: RegData) -> bool {
    match word_index(region, addr) {
        Some(offset) => {
            storage[offset..offset + WORD_SIZE].copy_from_slice(&val.to_le_bytes());
            true
        }
        None => false,
    }
}

fn load_word(storage: &[u8], region: Region, addr: RegAddr) -> Option<RegData> {
    let offset = word_index(region, addr)?;
    let word = storage[offset..offset + WORD_SIZE].try_into().ok()?;
    Some(RegData::from_le_bytes(word))
}

impl Transport for ModelEmulated {
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError> {
        let decoded = decode_write(bytes).filter(|_| device == self.device);
        match decoded {
            Some((addr, val)) if self.store(addr, val) => {
                writeln!(self.log.w(), "write(*{addr:#06x} <- {val:#x})").unwrap();
                Ok(())
            }
            _ => {
                writeln!(self.log.w(), "write({device:#x}, {}) ***NACK", hex::encode(bytes))
                    .unwrap();
                Err(TransportError::Nack { device })
            }
        }
    }

    fn write_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        let addr = decode_read_request(bytes)
            .filter(|_| device == self.device && buf.len() == READ_RESPONSE_LEN);
        match addr.and_then(|addr| Some((addr, self.load(addr)?))) {
            Some((addr, val)) => {
                writeln!(self.log.w(), "read(*{addr:#06x} -> {val:#x})").unwrap();
                buf.copy_from_slice(&val.to_le_bytes());
                Ok(())
            }
            None => {
                writeln!(self.log.w(), "read({device:#x}, {}) ***NACK", hex::encode(bytes))
                    .unwrap();
                Err(TransportError::Nack { device })
            }
        }
    }
}
