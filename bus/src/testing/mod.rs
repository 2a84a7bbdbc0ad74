/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains exports for code useful for testing against the Transport
    trait without hardware.

--*/
mod fake_transport;
mod log;
mod register_file;

pub use fake_transport::FakeTransport;
pub use log::Log;
pub use register_file::RegisterFile;
