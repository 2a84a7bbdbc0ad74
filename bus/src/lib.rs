/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the HMAC accelerator register bus library.

--*/
mod bus_logger;
pub mod codec;
#[cfg(target_os = "linux")]
mod i2c;
mod register_bus;
pub mod testing;
mod transport;

pub use crate::bus_logger::{BusLogger, LogFile};
#[cfg(target_os = "linux")]
pub use crate::i2c::LinuxI2c;
pub use crate::register_bus::{BusError, RegisterBus};
pub use crate::transport::{Transport, TransportError};
pub use hmac_fpga_registers::{RegAddr, RegData, WORD_SIZE};
