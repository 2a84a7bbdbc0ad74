// Licensed under the Apache-2.0 license

use std::io::{self, Write};

use hmac_fpga_bus::{BusLogger, LogFile, RegisterBus, Transport, TransportError};
use hmac_fpga_registers::AlgorithmProfile;

mod model_emulated;
mod poller;
pub mod reference;
mod verify;

pub use model_emulated::{FaultInjection, ModelEmulated};
pub use poller::{wait_for_completion, Completion, CompletionPoller, PollConfig, PollState};
pub use verify::{
    TestOutcome, TestVector, Verifier, VerifyError, EXIT_INVALID_INPUT, EXIT_LOG, EXIT_MATCH,
    EXIT_MISMATCH, EXIT_TIMEOUT, EXIT_TRANSPORT,
};

/// Default bus address of the accelerator's bridge.
pub const DEFAULT_DEVICE_ADDR: u8 = 0x50;

/// Default I2C adapter number.
pub const DEFAULT_I2C_BUS: u32 = 1;

/// Where register transactions end up.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModelSelect {
    /// The FPGA board behind `/dev/i2c-<bus>`.
    I2c { bus: u32 },

    /// The in-process software model.
    Emulated { fault: FaultInjection },
}

pub struct InitParams {
    pub model: ModelSelect,

    pub profile: &'static AlgorithmProfile,

    // 7-bit bus address of the accelerator
    pub device: u8,

    // If set, every bus transaction is traced here
    pub trace: Option<LogFile>,

    pub poll: PollConfig,

    // Progress messages
    pub log_writer: Box<dyn Write>,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            model: ModelSelect::I2c {
                bus: DEFAULT_I2C_BUS,
            },
            profile: &AlgorithmProfile::HMAC_SHA512,
            device: DEFAULT_DEVICE_ADDR,
            trace: None,
            poll: PollConfig::default(),
            log_writer: Box::new(io::stdout()),
        }
    }
}

/// Check the register map, open the selected transport and return a
/// verifier ready to run. The device is not touched until the first run.
pub fn new(params: InitParams) -> Result<Verifier<Box<dyn Transport>>, VerifyError> {
    params
        .profile
        .validate()
        .map_err(|source| VerifyError::InvalidProfile {
            profile: params.profile.name,
            source,
        })?;
    let transport: Box<dyn Transport> = match params.model {
        ModelSelect::I2c { bus } => open_i2c(bus)?,
        ModelSelect::Emulated { fault } => {
            Box::new(ModelEmulated::new(params.profile, params.device).with_fault(fault))
        }
    };
    let transport: Box<dyn Transport> = match params.trace {
        Some(trace) => Box::new(BusLogger::with_log(transport, trace)),
        None => transport,
    };
    Ok(
        Verifier::new(RegisterBus::new(transport, params.device), params.profile)
            .with_poll_config(params.poll)
            .with_log_writer(params.log_writer),
    )
}

#[cfg(target_os = "linux")]
fn open_i2c(bus: u32) -> Result<Box<dyn Transport>, TransportError> {
    Ok(Box::new(hmac_fpga_bus::LinuxI2c::open(bus)?))
}

#[cfg(not(target_os = "linux"))]
fn open_i2c(bus: u32) -> Result<Box<dyn Transport>, TransportError> {
    Err(TransportError::Unavailable {
        path: format!("/dev/i2c-{bus}").into(),
        source: io::Error::from(io::ErrorKind::Unsupported),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = InitParams::default();
        assert_eq!(params.model, ModelSelect::I2c { bus: 1 });
        assert_eq!(params.device, 0x50);
        assert_eq!(params.profile.name, "sha512");
        assert!(params.trace.is_none());
    }

    #[test]
    fn test_new_emulated() {
        let mut verifier = new(InitParams {
            model: ModelSelect::Emulated {
                fault: FaultInjection::None,
            },
            profile: &AlgorithmProfile::HMAC_SHA1,
            log_writer: Box::new(io::sink()),
            ..Default::default()
        })
        .unwrap();
        let vector = TestVector::random(verifier.profile(), &mut rand::thread_rng());
        assert!(verifier.run(&vector).is_match());
    }

    static OVERLAPPING: AlgorithmProfile = AlgorithmProfile {
        msg_base: 0x0040,
        ..AlgorithmProfile::HMAC_SHA1
    };

    #[test]
    fn test_new_rejects_invalid_profile() {
        // Rejected before the transport is opened
        let result = new(InitParams {
            model: ModelSelect::I2c { bus: 4_000_000 },
            profile: &OVERLAPPING,
            log_writer: Box::new(io::sink()),
            ..Default::default()
        });
        match result {
            Err(e @ VerifyError::InvalidProfile { profile: "sha1", .. }) => {
                assert_eq!(e.exit_code(), EXIT_INVALID_INPUT);
                assert_eq!(e.to_string(), "invalid sha1 register map");
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("overlapping profile accepted"),
        }
    }

    #[test]
    fn test_new_missing_i2c_adapter() {
        let result = new(InitParams {
            model: ModelSelect::I2c { bus: 4_000_000 },
            log_writer: Box::new(io::sink()),
            ..Default::default()
        });
        match result {
            Err(e) => {
                assert!(e.transport_error().map_or(false, TransportError::is_unavailable));
                assert_eq!(e.exit_code(), EXIT_TRANSPORT);
            }
            Ok(_) => panic!("/dev/i2c-4000000 should not exist"),
        }
    }
}
