//! Chunked encryption of byte buffers and files.
//!
//! A buffer is split into chunks of `capacity` bytes. Each byte becomes one plaintext
//! coefficient, and each chunk is encrypted on its own. The output is:
//!
//! | Field            | Encoding                          |
//! |------------------|-----------------------------------|
//! | `original_size`  | `u64`, little-endian              |
//! | `chunk_count`    | `u64`, little-endian              |
//! | chunks           | `chunk_count` framed ciphertexts  |
//!
//! Decryption relies on the size header, never on zero detection: a plaintext drops
//! its trailing zero coefficients, so every decrypted chunk is padded back to the
//! capacity with zeros and the output is cut at `original_size` bytes.

use std::path::Path;

use log::debug;

use crate::bfv::Bfv;
use crate::context::CryptoContext;
use crate::envelope::{self, ObjectKind};
use crate::file_handler;
use crate::keys::KeyPair;
use crate::scheme::{Parameters, Scheme, SchemeObject};
use crate::{Error, Result};

/// Default number of bytes per chunk.
pub const DEFAULT_CHUNK_CAPACITY: usize = 1024;

/// Size of the stream header in bytes.
pub const HEADER_LEN: usize = 16;

// Cap on speculative preallocation driven by an untrusted header.
const MAX_PREALLOCATION: usize = 1 << 20;

/// How many bytes go into each chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkCapacity {
    /// A fixed number of bytes per chunk.
    Fixed(usize),
    /// `min(poly_modulus_degree, plain_modulus - 1)` bytes per chunk.
    Derived,
}

impl Default for ChunkCapacity {
    fn default() -> Self {
        Self::Fixed(DEFAULT_CHUNK_CAPACITY)
    }
}

impl ChunkCapacity {
    /// Resolves the capacity for a parameter set.
    ///
    /// ## Errors
    ///
    /// Fails with [`Error::Codec`] if a coefficient cannot hold a byte or if the
    /// capacity is 0 or exceeds the polynomial degree.
    pub fn resolve(self, parameters: &Parameters) -> Result<usize> {
        let degree = parameters.poly_modulus_degree();
        let plain_modulus = parameters.plain_modulus();
        if plain_modulus <= u64::from(u8::MAX) {
            return Err(Error::Codec(format!(
                "plain modulus {plain_modulus} cannot hold a byte per coefficient"
            )));
        }

        let capacity = match self {
            Self::Fixed(capacity) => capacity,
            Self::Derived => usize::try_from(plain_modulus - 1).map_or(degree, |t| t.min(degree)),
        };
        if capacity == 0 || capacity > degree {
            return Err(Error::Codec(format!(
                "chunk capacity {capacity} is outside [1, {degree}]"
            )));
        }
        Ok(capacity)
    }
}

/// Codec settings. Encryptor and decryptor must agree on them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodecConfig {
    pub capacity: ChunkCapacity,
}

/// The fixed-size header preceding the chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub original_size: u64,
    pub chunk_count: u64,
}

impl ChunkHeader {
    #[must_use]
    pub fn for_input(len: usize, capacity: usize) -> Self {
        let original_size = len as u64;
        Self {
            original_size,
            chunk_count: Self::expected_chunks(original_size, capacity),
        }
    }

    #[must_use]
    pub fn expected_chunks(original_size: u64, capacity: usize) -> u64 {
        original_size.div_ceil(capacity.max(1) as u64)
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0; HEADER_LEN];
        out[..8].copy_from_slice(&self.original_size.to_le_bytes());
        out[8..].copy_from_slice(&self.chunk_count.to_le_bytes());
        out
    }

    /// Splits the header off the front of `bytes`.
    ///
    /// ## Errors
    ///
    /// Fails with [`Error::Codec`] if `bytes` is shorter than the header.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let (size, rest) = bytes
            .split_first_chunk::<8>()
            .ok_or_else(|| Self::truncated(bytes.len()))?;
        let (count, rest) = rest
            .split_first_chunk::<8>()
            .ok_or_else(|| Self::truncated(bytes.len()))?;
        let header = Self {
            original_size: u64::from_le_bytes(*size),
            chunk_count: u64::from_le_bytes(*count),
        };
        Ok((header, rest))
    }

    fn truncated(len: usize) -> Error {
        Error::Codec(format!("header: need {HEADER_LEN} bytes, found {len}"))
    }
}

/// Encrypts buffers and files chunk by chunk.
///
/// ## Examples
///
/// ```
/// use hecrypt::{CryptoContext, Decryptor, Encryptor, KeyPair, SecurityLevel};
///
/// let ctx = CryptoContext::new(SecurityLevel::Low);
/// let mut keys = KeyPair::new(&ctx);
/// keys.generate().unwrap();
///
/// let data = [0x41, 0x00, 0x42, 0x00, 0x43];
/// let encrypted = Encryptor::new(&ctx).encrypt_bytes(&data, &keys).unwrap();
/// let decrypted = Decryptor::new(&ctx).decrypt_bytes(&encrypted, &keys).unwrap();
/// assert_eq!(decrypted, data);
/// ```
pub struct Encryptor<'ctx, S: Scheme = Bfv> {
    ctx: &'ctx CryptoContext<S>,
    config: CodecConfig,
}

impl<'ctx, S: Scheme> Encryptor<'ctx, S> {
    #[must_use]
    pub fn new(ctx: &'ctx CryptoContext<S>) -> Self {
        Self::with_config(ctx, CodecConfig::default())
    }

    #[must_use]
    pub const fn with_config(ctx: &'ctx CryptoContext<S>, config: CodecConfig) -> Self {
        Self { ctx, config }
    }

    /// Encrypts `data` under the public key of `keys`.
    ///
    /// ## Errors
    ///
    /// Fails before producing any chunk if the context is invalid, the public key is
    /// missing or the capacity cannot be resolved.
    pub fn encrypt_bytes(&self, data: &[u8], keys: &KeyPair<'_, S>) -> Result<Vec<u8>> {
        let scheme = self.ctx.scheme()?;
        self.ctx.ensure_same(keys.context(), "keys")?;
        let public_key = keys.public_key()?;
        let capacity = self.config.capacity.resolve(self.ctx.parameters())?;
        let fingerprint = self.ctx.fingerprint();

        let header = ChunkHeader::for_input(data.len(), capacity);
        let mut out = Vec::from(header.to_bytes());
        for (index, chunk) in data.chunks(capacity).enumerate() {
            let coefficients: Vec<u64> = chunk.iter().map(|&b| u64::from(b)).collect();
            let plaintext = scheme
                .encode(&coefficients)
                .map_err(|e| Error::Codec(format!("chunk {index}: encoding failed: {e}")))?;
            let ciphertext = scheme
                .encrypt(public_key, &plaintext)
                .map_err(|e| Error::Codec(format!("chunk {index}: encryption failed: {e}")))?;
            out.extend(envelope::seal(
                ObjectKind::Ciphertext,
                fingerprint,
                &ciphertext.to_bytes()?,
            )?);
        }

        debug!(
            "encrypted {} bytes into {} chunks of up to {capacity} bytes",
            header.original_size, header.chunk_count
        );
        Ok(out)
    }

    /// Encrypts the file at `input` into `output`.
    ///
    /// `output` is only replaced once the whole file is encrypted.
    pub fn encrypt_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        keys: &KeyPair<'_, S>,
    ) -> Result<()> {
        self.ctx.ensure_valid()?;
        keys.public_key()?;
        let data = file_handler::read_file(input)?;
        let encrypted = self.encrypt_bytes(&data, keys)?;
        file_handler::write_file(output, &encrypted)
    }
}

/// Decrypts buffers and files produced by [`Encryptor`].
pub struct Decryptor<'ctx, S: Scheme = Bfv> {
    ctx: &'ctx CryptoContext<S>,
    config: CodecConfig,
}

impl<'ctx, S: Scheme> Decryptor<'ctx, S> {
    #[must_use]
    pub fn new(ctx: &'ctx CryptoContext<S>) -> Self {
        Self::with_config(ctx, CodecConfig::default())
    }

    #[must_use]
    pub const fn with_config(ctx: &'ctx CryptoContext<S>, config: CodecConfig) -> Self {
        Self { ctx, config }
    }

    /// Decrypts a chunk stream with the secret key of `keys`.
    ///
    /// ## Errors
    ///
    /// Fails before reading any chunk if the context is invalid or the secret key is
    /// missing. A malformed stream fails with [`Error::Codec`] naming the header or the
    /// chunk at fault.
    pub fn decrypt_bytes(&self, data: &[u8], keys: &KeyPair<'_, S>) -> Result<Vec<u8>> {
        let scheme = self.ctx.scheme()?;
        self.ctx.ensure_same(keys.context(), "keys")?;
        let secret_key = keys.secret_key()?;
        let capacity = self.config.capacity.resolve(self.ctx.parameters())?;
        let fingerprint = self.ctx.fingerprint();

        let (header, mut rest) = ChunkHeader::parse(data)?;
        let expected = ChunkHeader::expected_chunks(header.original_size, capacity);
        if header.chunk_count != expected {
            return Err(Error::Codec(format!(
                "header: {} bytes need {expected} chunks of {capacity} bytes, found {}",
                header.original_size, header.chunk_count
            )));
        }
        let original_size = usize::try_from(header.original_size).map_err(|_| {
            Error::Codec(format!("header: size {} is too large", header.original_size))
        })?;

        let mut output = Vec::with_capacity(original_size.min(MAX_PREALLOCATION));
        for index in 0..header.chunk_count {
            let in_chunk = |e: Error| Error::Codec(format!("chunk {index}: {e}"));
            let (body, used) = envelope::open_prefix(rest, ObjectKind::Ciphertext, fingerprint)
                .map_err(in_chunk)?;
            rest = rest.get(used..).unwrap_or_default();

            let ciphertext = S::Ciphertext::from_bytes(&body, scheme).map_err(in_chunk)?;
            let plaintext = scheme.decrypt(secret_key, &ciphertext).map_err(in_chunk)?;
            let coefficients = scheme.decode(&plaintext).map_err(in_chunk)?;
            if coefficients.len() > capacity {
                return Err(Error::Codec(format!(
                    "chunk {index}: {} coefficients exceed the capacity of {capacity}",
                    coefficients.len()
                )));
            }

            let take = capacity.min(original_size - output.len());
            for slot in 0..take {
                let coefficient = coefficients.get(slot).copied().unwrap_or(0);
                let byte = u8::try_from(coefficient).map_err(|_| {
                    Error::Codec(format!(
                        "chunk {index}: coefficient {coefficient} at slot {slot} is not a byte"
                    ))
                })?;
                output.push(byte);
            }
        }

        if !rest.is_empty() {
            return Err(Error::Codec(format!(
                "{} unexpected bytes after the last chunk",
                rest.len()
            )));
        }

        debug!(
            "decrypted {} chunks into {} bytes",
            header.chunk_count,
            output.len()
        );
        Ok(output)
    }

    /// Decrypts the file at `input` into `output`.
    ///
    /// `output` is only replaced once the whole file is decrypted.
    pub fn decrypt_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        keys: &KeyPair<'_, S>,
    ) -> Result<()> {
        self.ctx.ensure_valid()?;
        keys.secret_key()?;
        let data = file_handler::read_file(input)?;
        let decrypted = self.decrypt_bytes(&data, keys)?;
        file_handler::write_file(output, &decrypted)
    }

    /// Decrypts `encrypted` and compares it with `expected` without writing anything.
    pub fn verify_bytes(
        &self,
        encrypted: &[u8],
        expected: &[u8],
        keys: &KeyPair<'_, S>,
    ) -> Result<bool> {
        Ok(self.decrypt_bytes(encrypted, keys)? == expected)
    }
}
