// Licensed under the Apache-2.0 license

use tock_registers::register_bitfields;
use tock_registers::LocalRegisterCopy;

use crate::RegData;

register_bitfields! [
    u32,

    /// Control Register Fields
    pub Control [
        START OFFSET(0) NUMBITS(1) [],
        RSVD OFFSET(1) NUMBITS(31) [],
    ],

    /// Status Register Fields
    pub Status [
        /// Digest has been produced.
        DONE OFFSET(0) NUMBITS(1) [],
        /// Internal state machine is back in its idle state.
        IDLE OFFSET(1) NUMBITS(1) [],
        RSVD OFFSET(2) NUMBITS(30) [],
    ],
];

/// Returns true once the digest region is safe to read.
///
/// The accelerator raises DONE one cycle before its state machine settles
/// back to IDLE; the digest region may still be changing in between, so both
/// bits must be observed together.
pub fn is_complete(status: RegData) -> bool {
    let status = LocalRegisterCopy::<u32, Status::Register>::new(status);
    status.is_set(Status::DONE) && status.is_set(Status::IDLE)
}
