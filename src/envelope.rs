//! Framing for serialized keys and ciphertexts.
//!
//! Every object is written as a small header followed by the bytes the scheme produced
//! for it:
//!
//! | Field         | Encoding                        |
//! |---------------|---------------------------------|
//! | magic         | `b"HEC1"`                       |
//! | kind          | `u8` tag                        |
//! | fingerprint   | `u64` (varint)                  |
//! | body          | varint length, then the bytes   |
//!
//! Framed objects are self-delimiting, so they can be concatenated and read back one
//! after the other.

use bincode::config::{self, Config};
use bincode::{Decode, Encode};

use crate::error::KeyKind;
use crate::{Error, Result};

const MAGIC: [u8; 4] = *b"HEC1";
const CIPHERTEXT_TAG: u8 = 16;

// Upper bound on what a single decoded object may allocate.
const DECODE_LIMIT: usize = 256 * 1024 * 1024;

fn bincode_config() -> impl Config {
    config::standard().with_limit::<DECODE_LIMIT>()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    Key(KeyKind),
    Ciphertext,
}

impl ObjectKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Key(kind) => kind.tag(),
            Self::Ciphertext => CIPHERTEXT_TAG,
        }
    }
}

impl core::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Key(kind) => write!(f, "{kind}"),
            Self::Ciphertext => f.write_str("Ciphertext"),
        }
    }
}

#[derive(Encode, Decode)]
struct Header {
    magic: [u8; 4],
    kind: u8,
    fingerprint: u64,
}

pub(crate) fn seal(kind: ObjectKind, fingerprint: u64, body: &[u8]) -> Result<Vec<u8>> {
    let header = Header {
        magic: MAGIC,
        kind: kind.tag(),
        fingerprint,
    };
    let mut out = bincode::encode_to_vec(&header, bincode_config())?;
    out.extend(bincode::encode_to_vec(body, bincode_config())?);
    Ok(out)
}

/// Reads one object body from the front of `bytes`, returning it with the number of
/// bytes consumed.
pub(crate) fn open_prefix(
    bytes: &[u8],
    kind: ObjectKind,
    fingerprint: u64,
) -> Result<(Vec<u8>, usize)> {
    let (header, header_len): (Header, usize) =
        bincode::decode_from_slice(bytes, bincode_config())?;

    if header.magic != MAGIC {
        return Err(Error::Serialization("not a hecrypt object".to_string()));
    }
    if header.kind != kind.tag() {
        return Err(Error::Serialization(format!(
            "expected {kind}, found object tag {}",
            header.kind
        )));
    }
    if header.fingerprint != fingerprint {
        return Err(Error::ParameterMismatch {
            expected: fingerprint,
            found: header.fingerprint,
        });
    }

    let rest = bytes.get(header_len..).unwrap_or_default();
    let (body, body_len): (Vec<u8>, usize) = bincode::decode_from_slice(rest, bincode_config())?;
    Ok((body, header_len + body_len))
}

/// Reads exactly one object body spanning all of `bytes`.
pub(crate) fn open(bytes: &[u8], kind: ObjectKind, fingerprint: u64) -> Result<Vec<u8>> {
    let (body, used) = open_prefix(bytes, kind, fingerprint)?;
    if used != bytes.len() {
        return Err(Error::Serialization(format!(
            "{} unexpected bytes after {kind}",
            bytes.len() - used
        )));
    }
    Ok(body)
}

/// Encodes a scheme object that derives `Encode`.
pub(crate) fn encode_body<T: Encode>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::encode_to_vec(value, bincode_config())?)
}

/// Decodes a scheme object that derives `Decode`, rejecting trailing bytes.
pub(crate) fn decode_body<T: Decode<()>>(bytes: &[u8]) -> Result<T> {
    let (value, used) = bincode::decode_from_slice(bytes, bincode_config())?;
    if used != bytes.len() {
        return Err(Error::Serialization(format!(
            "{} unexpected bytes after the object",
            bytes.len() - used
        )));
    }
    Ok(value)
}
