// Licensed under the Apache-2.0 license

use std::time::Duration;

use hmac_fpga_bus::{RegisterBus, TransportError};
use hmac_fpga_hw_model::{
    FaultInjection, ModelEmulated, PollConfig, TestOutcome, TestVector, Verifier, VerifyError,
    EXIT_INVALID_INPUT, EXIT_MISMATCH, EXIT_TIMEOUT, EXIT_TRANSPORT,
};
use hmac_fpga_registers::AlgorithmProfile;
use hex_literal::hex;

const SHA1: &AlgorithmProfile = &AlgorithmProfile::HMAC_SHA1;
const SHA512: &AlgorithmProfile = &AlgorithmProfile::HMAC_SHA512;

fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(1),
        ..Default::default()
    }
}

fn short_timeout() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(5),
        timeout: Duration::from_millis(50),
    }
}

fn verifier(model: ModelEmulated, poll: PollConfig) -> Verifier<ModelEmulated> {
    let profile = model.profile();
    Verifier::new(RegisterBus::new(model, 0x50), profile).with_poll_config(poll)
}

fn sha1_vector() -> TestVector {
    let key: Vec<u8> = (0..64).collect();
    let message: Vec<u8> = (0..64).map(|i| 0xff - i).collect();
    TestVector::new(SHA1, key, message).unwrap()
}

#[test]
fn test_sha1_match() {
    let mut verifier = verifier(ModelEmulated::new(SHA1, 0x50), fast_poll());

    let outcome = verifier.run(&sha1_vector());
    match &outcome {
        TestOutcome::Match { digest } => assert_eq!(digest.len(), 20),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 0);

    let model = verifier.into_bus().into_inner();
    assert_eq!(model.starts(), 1);
    // Busy, done without idle, then done and idle
    assert_eq!(model.status_reads(), 3);
    assert_eq!(model.digest_reads(), 5);
    assert_eq!(model.key(), sha1_vector().key.as_slice());
    assert_eq!(model.message(), sha1_vector().message.as_slice());
}

#[test]
fn test_sha1_known_digest() {
    let vector = TestVector::new(SHA1, vec![0x0b; 64], vec![0; 64]).unwrap();
    let expected = hmac_fpga_hw_model::reference::hmac(
        SHA1.algorithm,
        &vector.key,
        &vector.message,
    )
    .unwrap();
    let mut verifier = verifier(ModelEmulated::new(SHA1, 0x50), fast_poll());
    match verifier.run(&vector) {
        TestOutcome::Match { digest } => assert_eq!(digest, expected),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_sha512_match() {
    let model = ModelEmulated::new(SHA512, 0x50).with_latency_polls(1);
    let mut verifier = verifier(model, fast_poll());

    let vector = TestVector::random(SHA512, &mut rand::thread_rng());
    let outcome = verifier.run(&vector);
    match &outcome {
        TestOutcome::Match { digest } => assert_eq!(digest.len(), 64),
        other => panic!("unexpected outcome {other:?}"),
    }
    let model = verifier.into_bus().into_inner();
    assert_eq!(model.status_reads(), 1);
    assert_eq!(model.digest_reads(), 16);
}

#[test]
fn test_corrupt_digest_mismatch() {
    let model = ModelEmulated::new(SHA1, 0x50).with_fault(FaultInjection::CorruptDigestByte(7));
    let mut verifier = verifier(model, fast_poll());

    let outcome = verifier.run(&sha1_vector());
    assert_eq!(outcome.exit_code(), EXIT_MISMATCH);
    let TestOutcome::Mismatch {
        hardware,
        reference,
    } = outcome
    else {
        panic!("expected a mismatch");
    };
    assert_eq!(hardware.len(), reference.len());
    let differing: Vec<usize> = (0..hardware.len())
        .filter(|&i| hardware[i] != reference[i])
        .collect();
    assert_eq!(differing, vec![7]);
    assert_eq!(hardware[7] ^ reference[7], 0x01);
}

#[test]
fn test_never_complete_times_out() {
    let model = ModelEmulated::new(SHA1, 0x50).with_fault(FaultInjection::NeverComplete);
    let mut verifier = verifier(model, short_timeout());

    let outcome = verifier.run(&sha1_vector());
    assert_eq!(outcome.exit_code(), EXIT_TIMEOUT);
    match outcome {
        TestOutcome::Failed(VerifyError::CompletionTimeout { elapsed, polls }) => {
            assert!(elapsed > Duration::from_millis(50));
            assert!((2..=12).contains(&polls), "polls: {polls}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // No digest is read after a timeout
    let model = verifier.into_bus().into_inner();
    assert_eq!(model.digest_reads(), 0);
    assert_eq!(model.starts(), 1);
}

#[test]
fn test_done_without_idle_times_out() {
    let model = ModelEmulated::new(SHA1, 0x50).with_fault(FaultInjection::DoneWithoutIdle);
    let mut verifier = verifier(model, short_timeout());

    let outcome = verifier.run(&sha1_vector());
    assert!(matches!(
        outcome,
        TestOutcome::Failed(VerifyError::CompletionTimeout { .. })
    ));
    assert_eq!(verifier.into_bus().into_inner().digest_reads(), 0);
}

#[test]
fn test_wrong_key_length_rejected_before_bus_traffic() {
    let model = ModelEmulated::new(SHA1, 0x50);
    let log = model.log.clone();
    let mut verifier = verifier(model, fast_poll());

    let vector = TestVector {
        key: hex!("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b").to_vec(),
        message: b"Hi There".to_vec(),
    };
    let outcome = verifier.run(&vector);
    assert_eq!(outcome.exit_code(), EXIT_INVALID_INPUT);
    assert!(matches!(
        outcome,
        TestOutcome::Failed(VerifyError::LengthMismatch {
            what: "key",
            expected: 64,
            actual: 20,
            ..
        })
    ));
    assert_eq!(log.take(), "");
}

#[test]
fn test_wrong_device_is_transport_error() {
    // The model answers at 0x50 but the verifier addresses 0x51
    let model = ModelEmulated::new(SHA1, 0x50);
    let log = model.log.clone();
    let mut verifier = Verifier::new(RegisterBus::new(model, 0x51), SHA1);

    let outcome = verifier.run(&sha1_vector());
    assert_eq!(outcome.exit_code(), EXIT_TRANSPORT);
    match outcome {
        TestOutcome::Failed(e) => assert!(matches!(
            e.transport_error(),
            Some(TransportError::Nack { device: 0x51 })
        )),
        other => panic!("unexpected outcome {other:?}"),
    }
    // Aborted on the very first key word
    assert_eq!(log.take().lines().count(), 1);
}

#[test]
fn test_back_to_back_runs() {
    let mut verifier = verifier(ModelEmulated::new(SHA1, 0x50), fast_poll());
    let mut rng = rand::thread_rng();
    for _ in 0..3 {
        assert!(verifier.run(&TestVector::random(SHA1, &mut rng)).is_match());
    }
    assert_eq!(verifier.into_bus().into_inner().starts(), 3);
}
