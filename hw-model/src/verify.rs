// Licensed under the Apache-2.0 license

use std::io::{self, Write};
use std::time::Duration;

use hmac::digest::InvalidLength;
use hmac_fpga_bus::{BusError, RegisterBus, Transport, TransportError};
use hmac_fpga_registers::{AlgorithmProfile, Control, ProfileError};
use rand::RngCore;
use thiserror::Error;

use crate::poller::{wait_for_completion, PollConfig, PollState};
use crate::reference;

pub const EXIT_MATCH: i32 = 0;
pub const EXIT_MISMATCH: i32 = 1;
pub const EXIT_TRANSPORT: i32 = 2;
pub const EXIT_TIMEOUT: i32 = 3;
pub const EXIT_INVALID_INPUT: i32 = 4;
pub const EXIT_LOG: i32 = 5;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The bus works but the accelerator never reported DONE and IDLE.
    #[error("accelerator did not finish within {elapsed:?} ({polls} status reads)")]
    CompletionTimeout { elapsed: Duration, polls: u32 },

    #[error("{what} is {actual} bytes but the {profile} profile takes {expected}")]
    LengthMismatch {
        what: &'static str,
        profile: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The register map handed to the harness is inconsistent.
    #[error("invalid {profile} register map")]
    InvalidProfile {
        profile: &'static str,
        #[source]
        source: ProfileError,
    },

    #[error("reference HMAC rejected the key: {0}")]
    Reference(InvalidLength),

    #[error("failed to write progress log")]
    Log(#[from] io::Error),
}

impl From<TransportError> for VerifyError {
    fn from(e: TransportError) -> Self {
        Self::Bus(e.into())
    }
}

impl From<InvalidLength> for VerifyError {
    fn from(e: InvalidLength) -> Self {
        Self::Reference(e)
    }
}

impl VerifyError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bus(BusError::Transport(_)) => EXIT_TRANSPORT,
            Self::CompletionTimeout { .. } => EXIT_TIMEOUT,
            Self::Bus(BusError::AddressOverflow { .. })
            | Self::LengthMismatch { .. }
            | Self::InvalidProfile { .. }
            | Self::Reference(_) => EXIT_INVALID_INPUT,
            Self::Log(_) => EXIT_LOG,
        }
    }

    /// The underlying transport failure, if that is what ended the run.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Bus(BusError::Transport(e)) => Some(e),
            _ => None,
        }
    }
}

/// Key and message loaded into the accelerator for one run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TestVector {
    pub key: Vec<u8>,
    pub message: Vec<u8>,
}

impl TestVector {
    /// Fixed key and message; both must match the profile's buffer sizes.
    pub fn new(
        profile: &AlgorithmProfile,
        key: Vec<u8>,
        message: Vec<u8>,
    ) -> Result<Self, VerifyError> {
        let vector = Self { key, message };
        vector.check(profile)?;
        Ok(vector)
    }

    /// Random key and message of the profile's buffer sizes.
    pub fn random(profile: &AlgorithmProfile, rng: &mut impl RngCore) -> Self {
        let mut key = vec![0; profile.key_len];
        let mut message = vec![0; profile.msg_len];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut message);
        Self { key, message }
    }

    fn check(&self, profile: &AlgorithmProfile) -> Result<(), VerifyError> {
        for (what, expected, actual) in [
            ("key", profile.key_len, self.key.len()),
            ("message", profile.msg_len, self.message.len()),
        ] {
            if expected != actual {
                return Err(VerifyError::LengthMismatch {
                    what,
                    profile: profile.name,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Result of one verification cycle.
#[derive(Debug)]
pub enum TestOutcome {
    Match {
        digest: Vec<u8>,
    },
    Mismatch {
        hardware: Vec<u8>,
        reference: Vec<u8>,
    },
    Failed(VerifyError),
}

impl TestOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Match { .. } => EXIT_MATCH,
            Self::Mismatch { .. } => EXIT_MISMATCH,
            Self::Failed(e) => e.exit_code(),
        }
    }
}

/// Drives the accelerator through a full HMAC cycle and checks its digest
/// against a software computation.
pub struct Verifier<T: Transport> {
    bus: RegisterBus<T>,
    profile: &'static AlgorithmProfile,
    poll: PollConfig,
    log_writer: Box<dyn Write>,
}

impl<T: Transport> Verifier<T> {
    pub fn new(bus: RegisterBus<T>, profile: &'static AlgorithmProfile) -> Self {
        Self {
            bus,
            profile,
            poll: PollConfig::default(),
            log_writer: Box::new(io::sink()),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Progress messages go here; discarded by default.
    pub fn with_log_writer(mut self, log_writer: Box<dyn Write>) -> Self {
        self.log_writer = log_writer;
        self
    }

    pub fn profile(&self) -> &'static AlgorithmProfile {
        self.profile
    }

    pub fn bus(&self) -> &RegisterBus<T> {
        &self.bus
    }

    /// Release the bus and return it.
    pub fn into_bus(self) -> RegisterBus<T> {
        self.bus
    }

    /// Run one cycle with `vector`. Errors end the cycle immediately and are
    /// reported as [`TestOutcome::Failed`].
    pub fn run(&mut self, vector: &TestVector) -> TestOutcome {
        match self.try_run(vector) {
            Ok(outcome) => outcome,
            Err(e) => TestOutcome::Failed(e),
        }
    }

    fn try_run(&mut self, vector: &TestVector) -> Result<TestOutcome, VerifyError> {
        let profile = self.profile;
        vector.check(profile)?;

        writeln!(self.log_writer, "--- HMAC-{} accelerator test ---", profile.algorithm)?;
        writeln!(self.log_writer, "Sending key ({} bytes)...", vector.key.len())?;
        self.bus.write_buffer(profile.key_base, &vector.key)?;
        writeln!(
            self.log_writer,
            "Sending message ({} bytes)...",
            vector.message.len()
        )?;
        self.bus.write_buffer(profile.msg_base, &vector.message)?;

        writeln!(self.log_writer, "Starting HMAC computation...")?;
        self.bus
            .write_register(profile.ctrl_addr, Control::START::SET.value)?;

        let completion = wait_for_completion(&mut self.bus, profile.status_addr, &self.poll)?;
        if completion.state == PollState::TimedOut {
            // The timeout is the failure to report, even if the log is broken
            let _ = writeln!(
                self.log_writer,
                "Timed out after {:.4} s without done and idle",
                completion.elapsed.as_secs_f64()
            );
            return Err(VerifyError::CompletionTimeout {
                elapsed: completion.elapsed,
                polls: completion.polls,
            });
        }
        writeln!(
            self.log_writer,
            "Computation finished after {:.4} s ({} status reads)",
            completion.elapsed.as_secs_f64(),
            completion.polls
        )?;

        let hardware = self
            .bus
            .read_buffer(profile.digest_base, profile.digest_len)?;
        let reference = reference::hmac(profile.algorithm, &vector.key, &vector.message)?;
        writeln!(self.log_writer, " -> reference digest: {}", hex::encode(&reference))?;
        writeln!(self.log_writer, " -> hardware digest:  {}", hex::encode(&hardware))?;

        if hardware == reference {
            let _ = writeln!(self.log_writer, "PASS: digests match");
            Ok(TestOutcome::Match { digest: hardware })
        } else {
            let _ = writeln!(self.log_writer, "FAIL: digests do not match");
            Ok(TestOutcome::Mismatch {
                hardware,
                reference,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac_fpga_bus::testing::{FakeTransport, RegisterFile};
    use std::cell::RefCell;
    use std::rc::Rc;

    const SHA1: &AlgorithmProfile = &AlgorithmProfile::HMAC_SHA1;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);
    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_random_vector_sizes() {
        for profile in AlgorithmProfile::ALL {
            let vector = TestVector::random(profile, &mut rand::thread_rng());
            assert_eq!(vector.key.len(), profile.key_len);
            assert_eq!(vector.message.len(), profile.msg_len);
        }
    }

    #[test]
    fn test_vector_length_checked() {
        let err = TestVector::new(SHA1, vec![0; 63], vec![0; 64]).unwrap_err();
        assert_eq!(err.to_string(), "key is 63 bytes but the sha1 profile takes 64");
        assert_eq!(err.exit_code(), EXIT_INVALID_INPUT);

        let err = TestVector::new(SHA1, vec![0; 64], vec![0; 65]).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::LengthMismatch {
                what: "message",
                expected: 64,
                actual: 65,
                ..
            }
        ));
        assert!(TestVector::new(SHA1, vec![0; 64], vec![0; 64]).is_ok());
    }

    #[test]
    fn test_length_mismatch_issues_no_transactions() {
        let fake = FakeTransport::new();
        let log = fake.log.clone();
        let mut verifier = Verifier::new(RegisterBus::new(fake, 0x50), SHA1);
        let vector = TestVector {
            key: vec![0; 20],
            message: vec![0; 64],
        };

        let outcome = verifier.run(&vector);
        assert!(matches!(
            outcome,
            TestOutcome::Failed(VerifyError::LengthMismatch { what: "key", .. })
        ));
        assert_eq!(log.take(), "");
    }

    #[test]
    fn test_transport_failure_aborts() {
        let mut fake = FakeTransport::new();
        fake.nack = true;
        let log = fake.log.clone();
        let mut verifier = Verifier::new(RegisterBus::new(fake, 0x50), SHA1);

        let outcome = verifier.run(&TestVector::random(SHA1, &mut rand::thread_rng()));
        assert_eq!(outcome.exit_code(), EXIT_TRANSPORT);
        match outcome {
            TestOutcome::Failed(e) => assert!(matches!(
                e.transport_error(),
                Some(TransportError::Nack { device: 0x50 })
            )),
            other => panic!("unexpected outcome {other:?}"),
        }
        // Fail fast: only the first key word was attempted
        assert_eq!(log.take().lines().count(), 1);
    }

    #[test]
    fn test_transaction_order() {
        // A plain register file with status preset to done and idle
        let mut regs = RegisterFile::new(0x50);
        regs.poke(SHA1.status_addr, 0b11);
        let log = regs.log.clone();
        let mut verifier = Verifier::new(RegisterBus::new(regs, 0x50), SHA1);

        let outcome = verifier.run(&TestVector::new(SHA1, vec![1; 64], vec![2; 64]).unwrap());
        // The register file does not compute anything
        assert_eq!(outcome.exit_code(), EXIT_MISMATCH);

        let log = log.take();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 16 + 16 + 1 + 1 + 5);
        assert_eq!(lines[0], "write(*0x0010 <- 0x1010101)");
        assert_eq!(lines[15], "write(*0x004c <- 0x1010101)");
        assert_eq!(lines[16], "write(*0x0050 <- 0x2020202)");
        assert_eq!(lines[32], "write(*0x0000 <- 0x1)");
        assert_eq!(lines[33], "read(*0x0004 -> 0x3)");
        assert_eq!(lines[34], "read(*0x0090 -> 0x0)");
        assert_eq!(lines[38], "read(*0x00a0 -> 0x0)");
    }

    #[test]
    fn test_progress_log() {
        let mut regs = RegisterFile::new(0x50);
        regs.poke(SHA1.status_addr, 0b11);
        let out = SharedBuf::default();
        let mut verifier = Verifier::new(RegisterBus::new(regs, 0x50), SHA1)
            .with_log_writer(Box::new(out.clone()));

        verifier.run(&TestVector::random(SHA1, &mut rand::thread_rng()));
        let text = String::from_utf8(out.0.borrow().clone()).unwrap();
        assert!(text.starts_with("--- HMAC-SHA-1 accelerator test ---\n"));
        assert!(text.contains("Sending key (64 bytes)...\n"));
        assert!(text.contains("(1 status reads)"));
        assert!(text.contains(" -> hardware digest:  0000000000000000000000000000000000000000\n"));
        assert!(text.ends_with("FAIL: digests do not match\n"));
    }

    /// Accepts progress lines until one starts with `fail_on`.
    struct FailingLog {
        fail_on: &'static str,
    }

    impl Write for FailingLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.starts_with(self.fail_on.as_bytes()) {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_timeout_reported_despite_log_failure() {
        let mut regs = RegisterFile::new(0x50);
        // Done but never idle
        regs.poke(SHA1.status_addr, 0b01);
        let mut verifier = Verifier::new(RegisterBus::new(regs, 0x50), SHA1)
            .with_poll_config(PollConfig {
                interval: Duration::from_millis(5),
                timeout: Duration::from_millis(20),
            })
            .with_log_writer(Box::new(FailingLog {
                fail_on: "Timed out",
            }));

        let outcome = verifier.run(&TestVector::random(SHA1, &mut rand::thread_rng()));
        assert!(matches!(
            outcome,
            TestOutcome::Failed(VerifyError::CompletionTimeout { .. })
        ));
        assert_eq!(outcome.exit_code(), EXIT_TIMEOUT);
    }

    #[test]
    fn test_verdict_reported_despite_log_failure() {
        let mut regs = RegisterFile::new(0x50);
        regs.poke(SHA1.status_addr, 0b11);
        let mut verifier = Verifier::new(RegisterBus::new(regs, 0x50), SHA1)
            .with_log_writer(Box::new(FailingLog { fail_on: "FAIL" }));

        let outcome = verifier.run(&TestVector::random(SHA1, &mut rand::thread_rng()));
        assert!(matches!(outcome, TestOutcome::Mismatch { .. }));
    }

    #[test]
    fn test_log_failure_before_verdict() {
        let mut regs = RegisterFile::new(0x50);
        regs.poke(SHA1.status_addr, 0b11);
        let log = regs.log.clone();
        let mut verifier = Verifier::new(RegisterBus::new(regs, 0x50), SHA1)
            .with_log_writer(Box::new(FailingLog { fail_on: "---" }));

        let outcome = verifier.run(&TestVector::random(SHA1, &mut rand::thread_rng()));
        assert_eq!(outcome.exit_code(), EXIT_LOG);
        assert_eq!(log.take(), "");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            TestOutcome::Match { digest: vec![] }.exit_code(),
            EXIT_MATCH
        );
        assert_eq!(
            TestOutcome::Mismatch {
                hardware: vec![1],
                reference: vec![2]
            }
            .exit_code(),
            EXIT_MISMATCH
        );
        assert_eq!(
            TestOutcome::Failed(VerifyError::CompletionTimeout {
                elapsed: Duration::from_secs(5),
                polls: 500
            })
            .exit_code(),
            EXIT_TIMEOUT
        );
        assert_eq!(
            TestOutcome::Failed(TransportError::Nack { device: 0x50 }.into()).exit_code(),
            EXIT_TRANSPORT
        );
        assert_eq!(
            TestOutcome::Failed(
                BusError::AddressOverflow {
                    base: 0xfffc,
                    len: 8
                }
                .into()
            )
            .exit_code(),
            EXIT_INVALID_INPUT
        );
    }
}
