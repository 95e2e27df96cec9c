//! Session handles
//!
//! Hosts read the handle of a running session out to the room, so handles are
//! five octal digits: short, and free of the 8s and 9s that get misheard. A
//! handle never starts with 0, so every value in range prints at full width.

use std::num::ParseIntError;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::shuffle::RandomSource;

/// Addresses a live session within a [`crate::sessions::Sessions`] store
///
/// Serialized as its five-digit octal text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    SerializeDisplay,
    DeserializeFromStr,
)]
#[display("{_0:05o}")]
pub struct SessionId(u16);

/// Reasons a string is not a session handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseSessionIdError {
    /// The text is not an octal number
    #[error("session handle is not octal: {0}")]
    NotOctal(#[from] ParseIntError),
    /// The number is not five octal digits long
    #[error("session handle {0:o} is not five octal digits")]
    OutOfRange(u16),
}

impl SessionId {
    /// Smallest handle, `10000` in octal
    const FIRST: u16 = 0o10_000;
    /// One past the largest handle, `100000` in octal
    const END: u16 = 0o100_000;

    /// Number of distinct handles
    pub const CAPACITY: usize = (Self::END - Self::FIRST) as usize;

    /// Draws a handle from `rng`; collisions are the caller's concern
    pub fn random<R: RandomSource + ?Sized>(rng: &mut R) -> Self {
        Self(Self::FIRST + rng.below(Self::CAPACITY) as u16)
    }
}

impl std::str::FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = u16::from_str_radix(s.trim(), 8)?;
        if (Self::FIRST..Self::END).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ParseSessionIdError::OutOfRange(value))
        }
    }
}
