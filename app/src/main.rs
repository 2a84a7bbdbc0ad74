/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    File contains the entry point of the HMAC accelerator test tool.

--*/

use std::any::Any;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{arg, value_parser, ArgMatches, ErrorKind};
use hmac_fpga_bus::{LogFile, TransportError};
use hmac_fpga_hw_model::{
    FaultInjection, InitParams, ModelSelect, PollConfig, TestOutcome, TestVector, VerifyError,
    DEFAULT_I2C_BUS, EXIT_INVALID_INPUT, EXIT_LOG, EXIT_TRANSPORT,
};
use hmac_fpga_registers::AlgorithmProfile;
use rand::RngCore;

const I2C_BUS_ENV: &str = "HMAC_FPGA_I2C_BUS";

fn cli() -> clap::Command<'static> {
    clap::Command::new("hmac-fpga-test")
        .about("Run one HMAC on the FPGA accelerator and check it against software")
        .arg(
            arg!(--profile <NAME> "Accelerator variant (sha1 or sha512)")
                .required(false)
                .default_value("sha512")
                .value_parser(parse_profile),
        )
        .arg(
            arg!(--model <MODEL> "Talk to the board over I2C or to the software model")
                .required(false)
                .default_value("i2c")
                .value_parser(["i2c", "emulated"]),
        )
        .arg(
            arg!(--"i2c-bus" <N> "I2C adapter number [default: $HMAC_FPGA_I2C_BUS or 1]")
                .required(false)
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--"device-addr" <ADDR> "7-bit bus address of the accelerator")
                .required(false)
                .default_value("0x50")
                .value_parser(parse_device_addr),
        )
        .arg(
            arg!(--key <HEX> "Key bytes; random if omitted")
                .required(false)
                .value_parser(parse_hex),
        )
        .arg(
            arg!(--message <HEX> "Message bytes; random if omitted")
                .required(false)
                .value_parser(parse_hex),
        )
        .arg(
            arg!(--"timeout-ms" <MS> "Give up waiting for the result after this long")
                .required(false)
                .default_value("5000")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"poll-interval-ms" <MS> "Pause between two status reads")
                .required(false)
                .default_value("10")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--fault <FAULT> "Misbehavior of the emulated model (none, corrupt-digest, never-complete, done-without-idle)")
                .required(false)
                .default_value("none")
                .value_parser(parse_fault),
        )
        .arg(
            arg!(--trace <FILE> "Bus transaction trace file")
                .required(false)
                .value_parser(value_parser!(PathBuf)),
        )
}

fn main() {
    match main_impl() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            if transport_error(&e).map_or(false, TransportError::is_unavailable) {
                eprintln!("Is I2C enabled on this board? On a Raspberry Pi use 'sudo raspi-config'.");
            }
            std::process::exit(exit_code(&e));
        }
    }
}

fn main_impl() -> anyhow::Result<i32> {
    let args = match cli().try_get_matches() {
        Ok(args) => args,
        Err(e) => match usage_exit_code(&e) {
            Some(code) => {
                let _ = e.print();
                return Ok(code);
            }
            None => e.exit(),
        },
    };

    let profile: &'static AlgorithmProfile = required(&args, "profile")?;
    let device: u8 = required(&args, "device-addr")?;
    let poll = PollConfig {
        interval: Duration::from_millis(required(&args, "poll-interval-ms")?),
        timeout: Duration::from_millis(required(&args, "timeout-ms")?),
    };
    let model = match required::<String>(&args, "model")?.as_str() {
        "emulated" => ModelSelect::Emulated {
            fault: required(&args, "fault")?,
        },
        _ => ModelSelect::I2c {
            bus: i2c_bus(
                args.get_one::<u32>("i2c-bus").copied(),
                std::env::var(I2C_BUS_ENV).ok(),
            )?,
        },
    };

    // Lengths are checked before the bus is opened
    let mut rng = rand::thread_rng();
    let key = args
        .get_one::<Vec<u8>>("key")
        .cloned()
        .unwrap_or_else(|| random_bytes(&mut rng, profile.key_len));
    let message = args
        .get_one::<Vec<u8>>("message")
        .cloned()
        .unwrap_or_else(|| random_bytes(&mut rng, profile.msg_len));
    let vector = TestVector::new(profile, key, message)?;

    let trace = match args.get_one::<PathBuf>("trace") {
        Some(path) => Some(
            LogFile::create(path)
                .with_context(|| format!("failed to create trace file {}", path.display()))?,
        ),
        None => None,
    };

    let mut verifier = hmac_fpga_hw_model::new(InitParams {
        model,
        profile,
        device,
        trace,
        poll,
        log_writer: Box::new(io::stdout()),
    })?;

    match verifier.run(&vector) {
        TestOutcome::Failed(e) => Err(e.into()),
        outcome => Ok(outcome.exit_code()),
    }
}

/// Exit code for a command line clap rejected; `None` for help and version
/// requests, which keep clap's own exit.
fn usage_exit_code(e: &clap::Error) -> Option<i32> {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        _ => Some(EXIT_INVALID_INPUT),
    }
}

fn required<T: Any + Clone + Send + Sync + 'static>(
    args: &ArgMatches,
    name: &str,
) -> anyhow::Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

/// The bus from the command line wins over the environment.
fn i2c_bus(arg: Option<u32>, env: Option<String>) -> anyhow::Result<u32> {
    match (arg, env) {
        (Some(bus), _) => Ok(bus),
        (None, Some(env)) => env
            .trim()
            .parse()
            .with_context(|| format!("{I2C_BUS_ENV}={env:?} is not a bus number")),
        (None, None) => Ok(DEFAULT_I2C_BUS),
    }
}

fn random_bytes(rng: &mut impl RngCore, len: usize) -> Vec<u8> {
    let mut bytes = vec![0; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

fn parse_profile(s: &str) -> Result<&'static AlgorithmProfile, String> {
    AlgorithmProfile::from_name(s).ok_or_else(|| {
        let names: Vec<_> = AlgorithmProfile::names().collect();
        format!("unknown profile {s:?}, expected one of {}", names.join(", "))
    })
}

fn parse_device_addr(s: &str) -> Result<u8, String> {
    let addr = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("invalid device address {s:?}: {e}"))?;
    if addr > 0x7f {
        return Err(format!("{addr:#x} is not a 7-bit address"));
    }
    Ok(addr)
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| format!("invalid hex {s:?}: {e}"))
}

fn parse_fault(s: &str) -> Result<FaultInjection, String> {
    match s {
        "none" => Ok(FaultInjection::None),
        "corrupt-digest" => Ok(FaultInjection::CorruptDigestByte(0)),
        "never-complete" => Ok(FaultInjection::NeverComplete),
        "done-without-idle" => Ok(FaultInjection::DoneWithoutIdle),
        _ => Err(format!("unknown fault {s:?}")),
    }
}

fn transport_error(e: &anyhow::Error) -> Option<&TransportError> {
    e.downcast_ref::<TransportError>().or_else(|| {
        e.downcast_ref::<VerifyError>()
            .and_then(VerifyError::transport_error)
    })
}

fn exit_code(e: &anyhow::Error) -> i32 {
    if let Some(e) = e.downcast_ref::<VerifyError>() {
        e.exit_code()
    } else if e.downcast_ref::<TransportError>().is_some() {
        EXIT_TRANSPORT
    } else if e.downcast_ref::<io::Error>().is_some() {
        EXIT_LOG
    } else {
        EXIT_INVALID_INPUT
    }
}
