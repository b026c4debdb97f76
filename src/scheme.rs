//! The seam between this crate and the homomorphic scheme that does the actual lattice work.
//!
//! Everything above this module (contexts, key pairs, [`HomomorphicInt`](crate::HomomorphicInt),
//! the file codec) only talks to a scheme through the traits defined here:
//!
//! - [`Scheme`] owns one validated parameter set and provides encoding, encryption,
//!   decryption and noise measurement.
//! - [`KeyGenerator`] derives public, relinearization and Galois keys from one secret key.
//! - [`Evaluator`] provides the algebra over ciphertexts, each operation in an in-place
//!   and an out-of-place form.
//!
//! Keys and ciphertexts serialize themselves through [`SchemeObject`]. Reading one back
//! needs the scheme instance, since lattice objects are only meaningful under the
//! parameters they were created with.

use core::fmt::Debug;
use core::hash::Hasher;

use fnv::FnvHasher;

use crate::{Error, Result};

/// Coefficient-modulus prime sizes (in bits) for each supported degree, following the
/// 128-bit security defaults.
pub(crate) fn coeff_modulus_bits(degree: usize) -> Option<&'static [u32]> {
    match degree {
        1024 => Some(&[27]),
        2048 => Some(&[54]),
        4096 => Some(&[36, 36, 37]),
        8192 => Some(&[43, 43, 44, 44, 44]),
        16384 => Some(&[48, 48, 48, 49, 49, 49, 49, 49, 49]),
        32768 => Some(&[
            55, 55, 55, 55, 55, 55, 55, 55, 55, 55, 55, 55, 55, 55, 55, 56,
        ]),
        _ => None,
    }
}

pub(crate) const fn bit_len(x: u64) -> u32 {
    u64::BITS - x.leading_zeros()
}

/// Parameters of a scheme instance.
///
/// ## Fields
///
/// * `poly_modulus_degree` - The lattice dimension `n`, a power of two.
/// * `plain_modulus` - The plaintext coefficient modulus `t`.
///
/// ## Note
///
/// Constructing `Parameters` never fails: the scheme decides whether it accepts them
/// when a [`CryptoContext`](crate::CryptoContext) is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameters {
    poly_modulus_degree: usize,
    plain_modulus: u64,
}

impl Parameters {
    #[must_use]
    pub const fn new(poly_modulus_degree: usize, plain_modulus: u64) -> Self {
        Self {
            poly_modulus_degree,
            plain_modulus,
        }
    }

    #[must_use]
    pub const fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    #[must_use]
    pub const fn plain_modulus(&self) -> u64 {
        self.plain_modulus
    }

    /// Returns a stable 64-bit fingerprint of these parameters under scheme `S`.
    ///
    /// Serialized keys and ciphertexts carry this value, and loading rejects
    /// material whose fingerprint differs from the loading context.
    #[must_use]
    pub fn fingerprint<S: Scheme>(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(S::NAME.as_bytes());
        hasher.write_u64(self.poly_modulus_degree as u64);
        hasher.write_u64(self.plain_modulus);
        hasher.finish()
    }
}

/// Serialization shared by every key and ciphertext type of scheme `S`.
pub trait SchemeObject<S: Scheme>: Sized + Clone + Debug {
    /// ## Errors
    ///
    /// Fails with [`Error::Serialization`] if the object cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Reads an object written by [`to_bytes`](Self::to_bytes) under the same parameters.
    ///
    /// ## Errors
    ///
    /// Fails with [`Error::Serialization`] if `bytes` is malformed or describes an
    /// object that cannot exist under `scheme`.
    fn from_bytes(bytes: &[u8], scheme: &S) -> Result<Self>;
}

/// Introspection every ciphertext type must offer.
pub trait SchemeCiphertext<S: Scheme>: SchemeObject<S> {
    /// Number of polynomial components (2 for a fresh ciphertext).
    fn size(&self) -> usize;

    /// Whether the ciphertext decrypts without the secret key.
    fn is_transparent(&self) -> bool;
}

/// A homomorphic encryption scheme bound to one parameter set.
pub trait Scheme: Sized {
    /// Name mixed into parameter fingerprints.
    const NAME: &'static str;

    type Plaintext: Clone + Debug;
    type Ciphertext: SchemeCiphertext<Self>;
    type PublicKey: SchemeObject<Self>;
    type SecretKey: SchemeObject<Self>;
    type RelinKeys: SchemeObject<Self>;
    type GaloisKeys: SchemeObject<Self>;
    type KeyGenerator: KeyGenerator<Self>;
    type Evaluator: Evaluator<Self>;

    /// Validates `parameters` and instantiates the scheme.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Parameters`] when the scheme rejects the parameter set.
    fn new(parameters: &Parameters) -> Result<Self>;

    fn parameters(&self) -> &Parameters;

    /// Creates the evaluator used for every algebraic operation.
    fn evaluator(&self) -> Result<Self::Evaluator>;

    /// Samples a fresh secret key and returns a generator bound to it.
    fn key_generator(&self) -> Result<Self::KeyGenerator>;

    /// Encodes raw coefficients (each below the plain modulus) into a plaintext.
    fn encode(&self, coefficients: &[u64]) -> Result<Self::Plaintext>;

    /// Returns the coefficients of a plaintext up to the last nonzero one, or `[0]` for
    /// the zero plaintext.
    fn decode(&self, plaintext: &Self::Plaintext) -> Result<Vec<u64>>;

    fn encrypt(&self, public_key: &Self::PublicKey, plaintext: &Self::Plaintext)
        -> Result<Self::Ciphertext>;

    fn decrypt(&self, secret_key: &Self::SecretKey, ciphertext: &Self::Ciphertext)
        -> Result<Self::Plaintext>;

    /// Bits of noise budget left before decryption fails.
    fn invariant_noise_budget(
        &self,
        secret_key: &Self::SecretKey,
        ciphertext: &Self::Ciphertext,
    ) -> Result<u32>;
}

/// Derives key material from one secret key.
pub trait KeyGenerator<S: Scheme> {
    fn secret_key(&self) -> S::SecretKey;

    fn create_public_key(&self) -> Result<S::PublicKey>;

    fn create_relin_keys(&self) -> Result<S::RelinKeys>;

    fn create_galois_keys(&self) -> Result<S::GaloisKeys>;
}

/// Algebra over ciphertexts.
///
/// Implementors provide the in-place forms; the out-of-place forms clone the left
/// operand and delegate.
pub trait Evaluator<S: Scheme> {
    fn add_inplace(&self, lhs: &mut S::Ciphertext, rhs: &S::Ciphertext) -> Result<()>;

    fn sub_inplace(&self, lhs: &mut S::Ciphertext, rhs: &S::Ciphertext) -> Result<()>;

    fn negate_inplace(&self, ciphertext: &mut S::Ciphertext) -> Result<()>;

    fn multiply_inplace(&self, lhs: &mut S::Ciphertext, rhs: &S::Ciphertext) -> Result<()>;

    fn square_inplace(&self, ciphertext: &mut S::Ciphertext) -> Result<()>;

    fn relinearize_inplace(
        &self,
        ciphertext: &mut S::Ciphertext,
        relin_keys: &S::RelinKeys,
    ) -> Result<()>;

    fn mod_switch_to_next_inplace(&self, ciphertext: &mut S::Ciphertext) -> Result<()>;

    fn add_plain_inplace(&self, ciphertext: &mut S::Ciphertext, plain: &S::Plaintext)
        -> Result<()>;

    fn sub_plain_inplace(&self, ciphertext: &mut S::Ciphertext, plain: &S::Plaintext)
        -> Result<()>;

    fn multiply_plain_inplace(
        &self,
        ciphertext: &mut S::Ciphertext,
        plain: &S::Plaintext,
    ) -> Result<()>;

    /// Raises a ciphertext to `exponent` by square-and-multiply, relinearizing after
    /// every product.
    ///
    /// ## Errors
    ///
    /// Fails with [`Error::InvalidOperand`] when `exponent` is zero.
    fn exponentiate_inplace(
        &self,
        ciphertext: &mut S::Ciphertext,
        exponent: u64,
        relin_keys: &S::RelinKeys,
    ) -> Result<()> {
        if exponent == 0 {
            return Err(Error::InvalidOperand("exponent cannot be 0".to_string()));
        }
        if ciphertext.size() > 2 {
            self.relinearize_inplace(ciphertext, relin_keys)?;
        }

        let mut base = ciphertext.clone();
        let mut acc: Option<S::Ciphertext> = None;
        let mut e = exponent;
        loop {
            if e & 1 == 1 {
                acc = Some(match acc.take() {
                    None => base.clone(),
                    Some(mut acc) => {
                        self.multiply_inplace(&mut acc, &base)?;
                        self.relinearize_inplace(&mut acc, relin_keys)?;
                        acc
                    }
                });
            }
            e >>= 1;
            if e == 0 {
                break;
            }
            self.square_inplace(&mut base)?;
            self.relinearize_inplace(&mut base, relin_keys)?;
        }

        if let Some(acc) = acc {
            *ciphertext = acc;
        }
        Ok(())
    }

    fn add(&self, lhs: &S::Ciphertext, rhs: &S::Ciphertext) -> Result<S::Ciphertext> {
        let mut out = lhs.clone();
        self.add_inplace(&mut out, rhs)?;
        Ok(out)
    }

    fn sub(&self, lhs: &S::Ciphertext, rhs: &S::Ciphertext) -> Result<S::Ciphertext> {
        let mut out = lhs.clone();
        self.sub_inplace(&mut out, rhs)?;
        Ok(out)
    }

    fn negate(&self, ciphertext: &S::Ciphertext) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.negate_inplace(&mut out)?;
        Ok(out)
    }

    fn multiply(&self, lhs: &S::Ciphertext, rhs: &S::Ciphertext) -> Result<S::Ciphertext> {
        let mut out = lhs.clone();
        self.multiply_inplace(&mut out, rhs)?;
        Ok(out)
    }

    fn square(&self, ciphertext: &S::Ciphertext) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.square_inplace(&mut out)?;
        Ok(out)
    }

    fn relinearize(
        &self,
        ciphertext: &S::Ciphertext,
        relin_keys: &S::RelinKeys,
    ) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.relinearize_inplace(&mut out, relin_keys)?;
        Ok(out)
    }

    fn mod_switch_to_next(&self, ciphertext: &S::Ciphertext) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.mod_switch_to_next_inplace(&mut out)?;
        Ok(out)
    }

    fn exponentiate(
        &self,
        ciphertext: &S::Ciphertext,
        exponent: u64,
        relin_keys: &S::RelinKeys,
    ) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.exponentiate_inplace(&mut out, exponent, relin_keys)?;
        Ok(out)
    }

    fn add_plain(&self, ciphertext: &S::Ciphertext, plain: &S::Plaintext) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.add_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    fn sub_plain(&self, ciphertext: &S::Ciphertext, plain: &S::Plaintext) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.sub_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    fn multiply_plain(
        &self,
        ciphertext: &S::Ciphertext,
        plain: &S::Plaintext,
    ) -> Result<S::Ciphertext> {
        let mut out = ciphertext.clone();
        self.multiply_plain_inplace(&mut out, plain)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedBfv;

    #[test]
    fn test_parameters_accessors() {
        let params = Parameters::new(4096, 65537);
        assert_eq!(params.poly_modulus_degree(), 4096);
        assert_eq!(params.plain_modulus(), 65537);
    }

    #[test]
    fn test_coeff_modulus_chains() {
        assert_eq!(coeff_modulus_bits(4096), Some(&[36, 36, 37][..]));
        assert_eq!(coeff_modulus_bits(32768).map(<[u32]>::len), Some(16));
        assert_eq!(coeff_modulus_bits(3000), None);
        assert_eq!(bit_len(65537), 17);
        assert_eq!(bit_len(0), 0);
    }

    #[test]
    fn test_fingerprint_tracks_parameters() {
        let a = Parameters::new(4096, 65537).fingerprint::<SimulatedBfv>();
        let b = Parameters::new(4096, 65537).fingerprint::<SimulatedBfv>();
        let c = Parameters::new(8192, 65537).fingerprint::<SimulatedBfv>();
        let d = Parameters::new(4096, 786_433).fingerprint::<SimulatedBfv>();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, Parameters::new(4096, 65537).fingerprint::<crate::Bfv>());
    }
}
