// Licensed under the Apache-2.0 license

use std::fmt;

use crate::{RegAddr, WORD_SIZE};

/// Hash primitive the accelerator wraps in HMAC.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HashAlgorithm {
    Sha1,
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => f.write_str("SHA-1"),
            Self::Sha512 => f.write_str("SHA-512"),
        }
    }
}

/// A byte range `[base, base + len)` of the register file.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub base: RegAddr,
    pub len: usize,
}

impl Region {
    /// First address past the region, rounded up to a whole register word.
    pub fn end(&self) -> usize {
        usize::from(self.base) + self.len.div_ceil(WORD_SIZE) * WORD_SIZE
    }

    pub fn contains(&self, addr: RegAddr) -> bool {
        (usize::from(self.base)..self.end()).contains(&usize::from(addr))
    }

    fn overlaps(&self, other: &Region) -> bool {
        usize::from(self.base) < other.end() && usize::from(other.base) < self.end()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProfileError {
    Overlap {
        first: &'static str,
        second: &'static str,
    },
    OutOfRange {
        region: &'static str,
        end: usize,
    },
    Empty {
        region: &'static str,
    },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap { first, second } => {
                write!(f, "register regions {first} and {second} overlap")
            }
            Self::OutOfRange { region, end } => write!(
                f,
                "register region {region} ends at {end:#x}, past the 16-bit address space"
            ),
            Self::Empty { region } => write!(f, "register region {region} is empty"),
        }
    }
}

impl std::error::Error for ProfileError {}

/// Register layout and buffer sizes of one accelerator variant.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AlgorithmProfile {
    /// Short name used on the command line.
    pub name: &'static str,
    pub algorithm: HashAlgorithm,

    /// Control register; writing [`crate::Control::START`] starts a computation.
    pub ctrl_addr: RegAddr,

    /// Status register, see [`crate::Status`].
    pub status_addr: RegAddr,

    pub key_base: RegAddr,
    pub key_len: usize,

    pub msg_base: RegAddr,
    pub msg_len: usize,

    pub digest_base: RegAddr,
    pub digest_len: usize,
}

impl AlgorithmProfile {
    /// HMAC-SHA512 core: 1024-bit key, 1024-bit message, 512-bit digest.
    pub const HMAC_SHA512: AlgorithmProfile = AlgorithmProfile {
        name: "sha512",
        algorithm: HashAlgorithm::Sha512,
        ctrl_addr: 0x0000,
        status_addr: 0x0004,
        key_base: 0x0010,
        key_len: 128,
        msg_base: 0x0090,
        msg_len: 128,
        digest_base: 0x0110,
        digest_len: 64,
    };

    /// HMAC-SHA1 core: 512-bit key, 512-bit message, 160-bit digest.
    pub const HMAC_SHA1: AlgorithmProfile = AlgorithmProfile {
        name: "sha1",
        algorithm: HashAlgorithm::Sha1,
        ctrl_addr: 0x0000,
        status_addr: 0x0004,
        key_base: 0x0010,
        key_len: 64,
        msg_base: 0x0050,
        msg_len: 64,
        digest_base: 0x0090,
        digest_len: 20,
    };

    /// Every variant the harness knows how to drive.
    pub const ALL: [&'static AlgorithmProfile; 2] = [&Self::HMAC_SHA512, &Self::HMAC_SHA1];

    pub fn from_name(name: &str) -> Option<&'static AlgorithmProfile> {
        Self::ALL
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(|p| p.name)
    }

    pub fn ctrl(&self) -> Region {
        Region {
            name: "control",
            base: self.ctrl_addr,
            len: WORD_SIZE,
        }
    }

    pub fn status(&self) -> Region {
        Region {
            name: "status",
            base: self.status_addr,
            len: WORD_SIZE,
        }
    }

    pub fn key(&self) -> Region {
        Region {
            name: "key",
            base: self.key_base,
            len: self.key_len,
        }
    }

    pub fn msg(&self) -> Region {
        Region {
            name: "message",
            base: self.msg_base,
            len: self.msg_len,
        }
    }

    pub fn digest(&self) -> Region {
        Region {
            name: "digest",
            base: self.digest_base,
            len: self.digest_len,
        }
    }

    pub fn regions(&self) -> [Region; 5] {
        [
            self.ctrl(),
            self.status(),
            self.key(),
            self.msg(),
            self.digest(),
        ]
    }

    /// Checks that all regions are non-empty, fit in the 16-bit address space
    /// and do not overlap.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let regions = self.regions();
        for region in &regions {
            if region.len == 0 {
                return Err(ProfileError::Empty {
                    region: region.name,
                });
            }
            if region.end() > usize::from(RegAddr::MAX) + 1 {
                return Err(ProfileError::OutOfRange {
                    region: region.name,
                    end: region.end(),
                });
            }
        }
        for (i, first) in regions.iter().enumerate() {
            for second in &regions[i + 1..] {
                if first.overlaps(second) {
                    return Err(ProfileError::Overlap {
                        first: first.name,
                        second: second.name,
                    });
                }
            }
        }
        Ok(())
    }
}
