// Licensed under the Apache-2.0 license

//! Software HMAC used as the known-good answer for the accelerator.

use hmac::digest::{InvalidLength, KeyInit};
use hmac::{Hmac, Mac};
use hmac_fpga_registers::HashAlgorithm;
use sha1::Sha1;
use sha2::Sha512;

/// Compute HMAC over `msg` keyed with `key` using `algorithm`.
pub fn hmac(algorithm: HashAlgorithm, key: &[u8], msg: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    match algorithm {
        HashAlgorithm::Sha1 => compute::<Hmac<Sha1>>(key, msg),
        HashAlgorithm::Sha512 => compute::<Hmac<Sha512>>(key, msg),
    }
}

fn compute<M: Mac + KeyInit>(key: &[u8], msg: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = <M as KeyInit>::new_from_slice(key)?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}
