use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The kinds of key material a [`KeyPair`](crate::KeyPair) can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Public,
    Secret,
    Relin,
    Galois,
}

impl KeyKind {
    /// All key kinds, in generation order.
    pub const ALL: [Self; 4] = [Self::Public, Self::Secret, Self::Relin, Self::Galois];

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Public => 1,
            Self::Secret => 2,
            Self::Relin => 3,
            Self::Galois => 4,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "Public key",
            Self::Secret => "Secret key",
            Self::Relin => "Relinearization keys",
            Self::Galois => "Galois keys",
        })
    }
}

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The scheme rejected the encryption parameters.
    #[error("{0}")]
    Parameters(ParametersError),

    /// The crypto context is not usable.
    #[error("Invalid crypto context: {0}")]
    InvalidContext(String),

    /// A key capability required by the operation is absent.
    #[error("{0} not available")]
    MissingKey(KeyKind),

    /// Derived keys were requested before base key generation.
    #[error("Generate not called")]
    GenerateNotCalled,

    /// An operand is invalid or out of range.
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// Operands or keys are bound to different contexts.
    #[error("Context mismatch: {0}")]
    ContextMismatch(String),

    /// Serialized material was produced under other parameters.
    #[error("Parameter mismatch: expected fingerprint {expected:016x}, found {found:016x}")]
    ParameterMismatch { expected: u64, found: u64 },

    /// The underlying scheme failed during an operation.
    #[error("Scheme error: {0}")]
    Scheme(String),

    /// The ciphertext has no noise budget left.
    #[error("Noise budget exhausted")]
    NoiseBudgetExhausted,

    /// Decryption failed.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Encoding or decoding of serialized material failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A chunk stream is malformed; the message names the failing stage.
    #[error("Malformed chunk stream: {0}")]
    Codec(String),

    /// A file could not be read or written.
    #[error("{}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl Error {
    pub(crate) fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl From<ParametersError> for Error {
    fn from(e: ParametersError) -> Self {
        Self::Parameters(e)
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(e: bincode::error::EncodeError) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(e: bincode::error::DecodeError) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Separate enum to indicate parameters-related errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParametersError {
    /// The polynomial modulus degree is not supported.
    #[error("Invalid degree: {0} is not a power of 2 between 1024 and 32768")]
    InvalidDegree(usize),

    /// The plaintext modulus is out of range.
    #[error("Invalid plain modulus: {0}")]
    InvalidPlainModulus(u64),

    /// The plaintext modulus leaves no room under the coefficient modulus.
    #[error(
        "Plain modulus of {plain_bits} bits does not fit under a {coeff_bits}-bit coefficient modulus"
    )]
    PlainModulusTooLarge { plain_bits: u32, coeff_bits: u32 },

    /// The lattice library refused the parameter set.
    #[error("Parameters rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_strings() {
        assert_eq!(
            Error::MissingKey(KeyKind::Public).to_string(),
            "Public key not available"
        );
        assert_eq!(Error::GenerateNotCalled.to_string(), "Generate not called");
        assert_eq!(
            Error::ParameterMismatch {
                expected: 0xab,
                found: 0xcd
            }
            .to_string(),
            "Parameter mismatch: expected fingerprint 00000000000000ab, found 00000000000000cd"
        );
        assert_eq!(
            Error::Io {
                path: PathBuf::from("keys/public.key"),
                message: "not found".to_string()
            }
            .to_string(),
            "keys/public.key: not found"
        );
        assert_eq!(
            Error::Parameters(ParametersError::InvalidDegree(0)).to_string(),
            ParametersError::InvalidDegree(0).to_string()
        );
    }

    #[test]
    fn parameters_error_strings() {
        assert_eq!(
            ParametersError::InvalidDegree(10).to_string(),
            "Invalid degree: 10 is not a power of 2 between 1024 and 32768"
        );
        assert_eq!(
            ParametersError::PlainModulusTooLarge {
                plain_bits: 30,
                coeff_bits: 27
            }
            .to_string(),
            "Plain modulus of 30 bits does not fit under a 27-bit coefficient modulus"
        );
        assert_eq!(
            ParametersError::Rejected("modulus is even".to_string()).to_string(),
            "Parameters rejected: modulus is even"
        );
    }

    #[test]
    fn key_kind_tags_are_distinct() {
        let mut tags: Vec<_> = KeyKind::ALL.iter().map(|k| k.tag()).collect();
        tags.dedup();
        assert_eq!(tags.len(), KeyKind::ALL.len());
    }
}
