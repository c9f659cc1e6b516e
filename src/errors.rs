//! Errors surfaced when setting up a search.
//!
//! All of these are reported at initialization time; once a search loop
//! starts it can no longer fail.  Running out of time without a match is
//! not an error (the coordinator returns no discovery).

use core::fmt::{self, Display};

/// An error in the parameters of a search or key operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// No prefix was supplied.
    NoPrefixes,
    /// A prefix contains a character outside its base32 alphabet.
    PrefixAlphabet { prefix: String, ch: char },
    /// A prefix constrains more bits than a public key determines.
    PrefixTooLong(usize),
    /// The batch size is zero or odd.
    InvalidBatchSize(usize),
    /// The starting public key is malformed or not on the curve.
    InvalidPublicKey,
    /// The starting secret key envelope is malformed.
    InvalidSecretKey,
    /// The supplied offset is not a valid little-endian scalar encoding.
    InvalidOffset,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoPrefixes => write!(f, "at least one prefix required"),
            Error::PrefixAlphabet { prefix, ch } => {
                write!(f, "prefix {prefix:?} contains {ch:?}, which is outside the base32 alphabet")
            }
            Error::PrefixTooLong(len) => {
                write!(f, "prefix of {len} characters constrains more than one public key")
            }
            Error::InvalidBatchSize(n) => {
                write!(f, "batch size must be positive and even, got {n}")
            }
            Error::InvalidPublicKey => write!(f, "invalid public key"),
            Error::InvalidSecretKey => write!(f, "invalid secret key"),
            Error::InvalidOffset => write!(f, "invalid offset"),
        }
    }
}

impl std::error::Error for Error {}
