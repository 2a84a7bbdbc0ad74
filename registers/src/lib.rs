// Licensed under the Apache-2.0 license

//! Register map of the FPGA HMAC accelerator.
//!
//! The accelerator exposes a flat, byte-addressed register file with 32-bit
//! word granularity. Every hash variant shares the same control and status
//! layout but places its key, message and digest regions at different
//! offsets, so the map is described by one [`AlgorithmProfile`] per variant.

mod bitfields;
mod profile;

pub use bitfields::{is_complete, Control, Status};
pub use profile::{AlgorithmProfile, HashAlgorithm, ProfileError, Region};

/// 16-bit offset into the accelerator's register file.
pub type RegAddr = u16;

/// 32-bit register word; the atomic unit of every bus transaction.
pub type RegData = u32;

/// Size of one register word in bytes.
pub const WORD_SIZE: usize = 4;
