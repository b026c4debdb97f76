//! `SimulatedBfv`: a bookkeeping model of the BFV scheme, used as a fast fake in tests
//! and benches.
//!
//! The model tracks exactly what the rest of the crate observes about BFV ciphertexts:
//! the plaintext they decrypt to, their size, their modulus level, their invariant noise
//! (and hence the remaining noise budget), which secret key they belong to and whether
//! their mask has cancelled out (transparency). Coefficient-modulus chains are the same
//! as the ones [`Bfv`](crate::Bfv) uses.
//!
//! ## Security
//!
//! **This scheme provides no confidentiality.** A ciphertext stores its message in the
//! clear. Use [`Bfv`](crate::Bfv) for anything that leaves the test suite.

use core::fmt;
use core::hash::Hasher;

use bincode::{Decode, Encode};
use fnv::FnvHasher;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::envelope::{decode_body, encode_body};
use crate::error::ParametersError;
use crate::polynomial::Polynomial;
use crate::scheme::{
    bit_len, coeff_modulus_bits, Evaluator, KeyGenerator, Parameters, Scheme, SchemeCiphertext,
    SchemeObject,
};
use crate::{Error, Result};

const MAX_PLAIN_BITS: u32 = 60;

const fn ceil_log2(x: u64) -> u32 {
    if x <= 1 {
        0
    } else {
        bit_len(x - 1)
    }
}

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| Error::Scheme(format!("Randomness unavailable: {e}")))?;
    Ok(buf)
}

// Modulus chain shared by the scheme, its evaluator and its key generators.
#[derive(Debug, Clone)]
struct Modulus {
    degree: usize,
    plain_modulus: u64,
    plain_bits: u32,
    data_bits: Vec<u32>,
    special_bits: Option<u32>,
}

impl Modulus {
    fn new(parameters: &Parameters) -> Result<Self> {
        let degree = parameters.poly_modulus_degree();
        let chain = coeff_modulus_bits(degree).ok_or(ParametersError::InvalidDegree(degree))?;

        let plain_modulus = parameters.plain_modulus();
        if plain_modulus < 2 || bit_len(plain_modulus) > MAX_PLAIN_BITS {
            return Err(ParametersError::InvalidPlainModulus(plain_modulus).into());
        }

        let (data_bits, special_bits) = match chain.split_last() {
            Some((&special, data)) if !data.is_empty() => (data.to_vec(), Some(special)),
            _ => (chain.to_vec(), None),
        };

        let modulus = Self {
            degree,
            plain_modulus,
            plain_bits: bit_len(plain_modulus),
            data_bits,
            special_bits,
        };

        let coeff_bits = modulus.level_bits(modulus.top_level());
        if modulus.plain_bits + modulus.fresh_noise() + 1 >= coeff_bits {
            return Err(ParametersError::PlainModulusTooLarge {
                plain_bits: modulus.plain_bits,
                coeff_bits,
            }
            .into());
        }

        Ok(modulus)
    }

    fn top_level(&self) -> u32 {
        self.data_bits.len() as u32
    }

    fn level_bits(&self, level: u32) -> u32 {
        self.data_bits.iter().take(level as usize).sum()
    }

    fn log_degree(&self) -> u32 {
        self.degree.trailing_zeros()
    }

    fn fresh_noise(&self) -> u32 {
        self.log_degree() / 2 + 3
    }

    fn noise_floor(&self) -> u32 {
        self.log_degree() / 2 + 1
    }

    // Noise past the full coefficient modulus cannot grow any further.
    fn noise_cap(&self) -> u32 {
        self.level_bits(self.top_level())
    }

    fn clamp_noise(&self, noise: u32) -> u32 {
        noise.min(self.noise_cap())
    }

    fn budget(&self, ciphertext: &SimCiphertext) -> u32 {
        let used = self
            .plain_bits
            .saturating_add(ciphertext.noise)
            .saturating_add(1);
        self.level_bits(ciphertext.level).saturating_sub(used)
    }

    fn validate(&self, ciphertext: &SimCiphertext) -> Result<()> {
        let invalid = |what: String| -> Result<()> {
            Err(Error::Serialization(format!("invalid ciphertext: {what}")))
        };
        if ciphertext.level == 0 || ciphertext.level > self.top_level() {
            return invalid(format!("level {} outside the modulus chain", ciphertext.level));
        }
        if ciphertext.size < 2 {
            return invalid(format!("size {}", ciphertext.size));
        }
        if ciphertext.noise > self.noise_cap() {
            return invalid(format!("noise of {} bits", ciphertext.noise));
        }
        if !ciphertext.message.is_reduced(self.degree, self.plain_modulus) {
            return invalid("message is not reduced".to_string());
        }
        Ok(())
    }

    fn supports_keyswitching(&self) -> bool {
        self.special_bits.is_some()
    }
}

/// A BFV plaintext: a polynomial over `Z_t` with at most `n` coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPlaintext(Polynomial);

/// A simulated BFV ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SimCiphertext {
    key_id: u64,
    level: u32,
    size: u32,
    noise: u32,
    mask: u64,
    message: Polynomial,
}

impl SimCiphertext {
    /// Remaining data primes in the modulus chain.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }
}

impl SchemeObject<SimulatedBfv> for SimCiphertext {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_body(self)
    }

    fn from_bytes(bytes: &[u8], scheme: &SimulatedBfv) -> Result<Self> {
        let ciphertext = decode_body(bytes)?;
        scheme.modulus.validate(&ciphertext)?;
        Ok(ciphertext)
    }
}

impl SchemeCiphertext<SimulatedBfv> for SimCiphertext {
    fn size(&self) -> usize {
        self.size as usize
    }

    fn is_transparent(&self) -> bool {
        self.mask == 0
    }
}

/// Secret key seed, wiped from memory on drop.
#[derive(Clone, Encode, Decode, Zeroize, ZeroizeOnDrop)]
pub struct SimSecretKey {
    seed: [u8; 32],
}

impl SimSecretKey {
    fn id(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(&self.seed);
        hasher.finish()
    }
}

impl fmt::Debug for SimSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimSecretKey")
            .field("id", &format_args!("{:016x}", self.id()))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SimPublicKey {
    key_id: u64,
    seed: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SimRelinKeys {
    key_id: u64,
    count: u32,
    decomposition: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SimGaloisKeys {
    key_id: u64,
    elements: Vec<u64>,
}

impl SimGaloisKeys {
    /// Galois elements a key exists for.
    #[must_use]
    pub fn elements(&self) -> &[u64] {
        &self.elements
    }
}

// Key material carries no parameter-dependent invariant, so decoding is enough.
macro_rules! plain_scheme_object {
    ($($ty:ty),+ $(,)?) => {$(
        impl SchemeObject<SimulatedBfv> for $ty {
            fn to_bytes(&self) -> Result<Vec<u8>> {
                encode_body(self)
            }

            fn from_bytes(bytes: &[u8], _scheme: &SimulatedBfv) -> Result<Self> {
                decode_body(bytes)
            }
        }
    )+};
}

plain_scheme_object!(SimPublicKey, SimSecretKey, SimRelinKeys, SimGaloisKeys);

/// The BFV model. See the [module documentation](self).
#[derive(Debug, Clone)]
pub struct SimulatedBfv {
    parameters: Parameters,
    modulus: Modulus,
}

impl SimulatedBfv {
    /// Bits of each data prime in the modulus chain, highest level first.
    #[must_use]
    pub fn data_modulus_bits(&self) -> &[u32] {
        &self.modulus.data_bits
    }

    /// Bits of the special key-switching prime, if the chain has one.
    #[must_use]
    pub const fn special_modulus_bits(&self) -> Option<u32> {
        self.modulus.special_bits
    }
}

impl Scheme for SimulatedBfv {
    const NAME: &'static str = "simulated-bfv";

    type Plaintext = SimPlaintext;
    type Ciphertext = SimCiphertext;
    type PublicKey = SimPublicKey;
    type SecretKey = SimSecretKey;
    type RelinKeys = SimRelinKeys;
    type GaloisKeys = SimGaloisKeys;
    type KeyGenerator = SimKeyGenerator;
    type Evaluator = SimEvaluator;

    fn new(parameters: &Parameters) -> Result<Self> {
        Ok(Self {
            parameters: *parameters,
            modulus: Modulus::new(parameters)?,
        })
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn evaluator(&self) -> Result<SimEvaluator> {
        Ok(SimEvaluator {
            modulus: self.modulus.clone(),
        })
    }

    fn key_generator(&self) -> Result<SimKeyGenerator> {
        Ok(SimKeyGenerator {
            modulus: self.modulus.clone(),
            secret_key: SimSecretKey {
                seed: random_bytes()?,
            },
        })
    }

    fn encode(&self, coefficients: &[u64]) -> Result<SimPlaintext> {
        if coefficients.len() > self.modulus.degree {
            return Err(Error::InvalidOperand(format!(
                "{} coefficients do not fit in a degree {} plaintext",
                coefficients.len(),
                self.modulus.degree
            )));
        }
        let t = self.modulus.plain_modulus;
        if let Some(c) = coefficients.iter().find(|&&c| c >= t) {
            return Err(Error::InvalidOperand(format!(
                "coefficient {c} is not below the plain modulus {t}"
            )));
        }
        Ok(SimPlaintext(Polynomial::new(coefficients.to_vec())))
    }

    fn decode(&self, plaintext: &SimPlaintext) -> Result<Vec<u64>> {
        if plaintext.0.is_null() {
            Ok(vec![0])
        } else {
            Ok(plaintext.0.coefficients().to_vec())
        }
    }

    fn encrypt(
        &self,
        public_key: &SimPublicKey,
        plaintext: &SimPlaintext,
    ) -> Result<SimCiphertext> {
        let mask = u64::from_le_bytes(random_bytes()?) | 1;
        Ok(SimCiphertext {
            key_id: public_key.key_id,
            level: self.modulus.top_level(),
            size: 2,
            noise: self.modulus.fresh_noise(),
            mask,
            message: plaintext.0.clone(),
        })
    }

    fn decrypt(
        &self,
        secret_key: &SimSecretKey,
        ciphertext: &SimCiphertext,
    ) -> Result<SimPlaintext> {
        if secret_key.id() != ciphertext.key_id {
            return Err(Error::Decryption(
                "ciphertext was encrypted under a different key".to_string(),
            ));
        }
        if self.modulus.budget(ciphertext) == 0 {
            return Err(Error::NoiseBudgetExhausted);
        }
        Ok(SimPlaintext(ciphertext.message.clone()))
    }

    fn invariant_noise_budget(
        &self,
        secret_key: &SimSecretKey,
        ciphertext: &SimCiphertext,
    ) -> Result<u32> {
        if secret_key.id() != ciphertext.key_id {
            return Err(Error::Decryption(
                "ciphertext was encrypted under a different key".to_string(),
            ));
        }
        Ok(self.modulus.budget(ciphertext))
    }
}

/// Key generator bound to one freshly sampled secret key.
pub struct SimKeyGenerator {
    modulus: Modulus,
    secret_key: SimSecretKey,
}

impl SimKeyGenerator {
    fn keyswitching_check(&self) -> Result<()> {
        if self.modulus.supports_keyswitching() {
            Ok(())
        } else {
            Err(Error::Scheme(
                "keyswitching is not supported by the encryption parameters".to_string(),
            ))
        }
    }

    fn galois_elements(&self) -> Vec<u64> {
        let m = 2 * self.modulus.degree as u64;
        let row_size = self.modulus.degree as u64 / 2;
        let pow3 = |e: u64| (0..e).fold(1u64, |acc, _| acc * 3 % m);

        let mut elements: Vec<u64> = core::iter::successors(Some(1u64), |s| Some(s * 2))
            .take_while(|&s| s < row_size)
            .flat_map(|s| [pow3(s), pow3(row_size - s)])
            .collect();
        elements.push(m - 1);
        elements.sort_unstable();
        elements.dedup();
        elements
    }
}

impl KeyGenerator<SimulatedBfv> for SimKeyGenerator {
    fn secret_key(&self) -> SimSecretKey {
        self.secret_key.clone()
    }

    fn create_public_key(&self) -> Result<SimPublicKey> {
        Ok(SimPublicKey {
            key_id: self.secret_key.id(),
            seed: random_bytes()?,
        })
    }

    fn create_relin_keys(&self) -> Result<SimRelinKeys> {
        self.keyswitching_check()?;
        Ok(SimRelinKeys {
            key_id: self.secret_key.id(),
            count: 1,
            decomposition: self.modulus.top_level(),
        })
    }

    fn create_galois_keys(&self) -> Result<SimGaloisKeys> {
        self.keyswitching_check()?;
        Ok(SimGaloisKeys {
            key_id: self.secret_key.id(),
            elements: self.galois_elements(),
        })
    }
}

/// Evaluator applying the noise model to simulated ciphertexts.
pub struct SimEvaluator {
    modulus: Modulus,
}

impl SimEvaluator {
    fn check_pair(lhs: &SimCiphertext, rhs: &SimCiphertext) -> Result<()> {
        if lhs.key_id != rhs.key_id {
            return Err(Error::Scheme(
                "ciphertexts are encrypted under different keys".to_string(),
            ));
        }
        if lhs.level != rhs.level {
            return Err(Error::Scheme(
                "ciphertexts are at different modulus levels".to_string(),
            ));
        }
        Ok(())
    }

    fn check_plain(&self, plain: &SimPlaintext) -> Result<()> {
        if plain.0.coefficients().len() > self.modulus.degree {
            return Err(Error::InvalidOperand(
                "plaintext does not fit the polynomial modulus".to_string(),
            ));
        }
        Ok(())
    }

    fn plain_factor(plain: &SimPlaintext) -> u64 {
        if plain.0.is_null() {
            return 0;
        }
        let mut hasher = FnvHasher::default();
        for &c in plain.0.coefficients() {
            hasher.write_u64(c);
        }
        hasher.finish() | 1
    }
}

impl Evaluator<SimulatedBfv> for SimEvaluator {
    fn add_inplace(&self, lhs: &mut SimCiphertext, rhs: &SimCiphertext) -> Result<()> {
        Self::check_pair(lhs, rhs)?;
        let t = self.modulus.plain_modulus;
        lhs.message = lhs.message.add_fn(&rhs.message, t);
        lhs.mask = lhs.mask.wrapping_add(rhs.mask);
        lhs.size = lhs.size.max(rhs.size);
        lhs.noise = self.modulus.clamp_noise(lhs.noise.max(rhs.noise).saturating_add(1));
        Ok(())
    }

    fn sub_inplace(&self, lhs: &mut SimCiphertext, rhs: &SimCiphertext) -> Result<()> {
        Self::check_pair(lhs, rhs)?;
        let t = self.modulus.plain_modulus;
        lhs.message = lhs.message.sub_fn(&rhs.message, t);
        lhs.mask = lhs.mask.wrapping_sub(rhs.mask);
        lhs.size = lhs.size.max(rhs.size);
        lhs.noise = self.modulus.clamp_noise(lhs.noise.max(rhs.noise).saturating_add(1));
        Ok(())
    }

    fn negate_inplace(&self, ciphertext: &mut SimCiphertext) -> Result<()> {
        ciphertext.message = ciphertext.message.neg_fn(self.modulus.plain_modulus);
        ciphertext.mask = ciphertext.mask.wrapping_neg();
        Ok(())
    }

    fn multiply_inplace(&self, lhs: &mut SimCiphertext, rhs: &SimCiphertext) -> Result<()> {
        Self::check_pair(lhs, rhs)?;
        let modulus = &self.modulus;
        lhs.message = lhs
            .message
            .mul_fn(&rhs.message, modulus.degree, modulus.plain_modulus);
        lhs.mask = lhs
            .mask
            .wrapping_add(1)
            .wrapping_mul(rhs.mask.wrapping_add(1))
            .wrapping_sub(1);
        let size = lhs.size.saturating_add(rhs.size);
        let growth = modulus
            .plain_bits
            .saturating_add(1)
            .saturating_add(size.saturating_sub(4));
        lhs.noise = modulus.clamp_noise(lhs.noise.max(rhs.noise).saturating_add(growth));
        lhs.size = size.saturating_sub(1);
        Ok(())
    }

    fn square_inplace(&self, ciphertext: &mut SimCiphertext) -> Result<()> {
        let copy = ciphertext.clone();
        self.multiply_inplace(ciphertext, &copy)
    }

    fn relinearize_inplace(
        &self,
        ciphertext: &mut SimCiphertext,
        relin_keys: &SimRelinKeys,
    ) -> Result<()> {
        if relin_keys.key_id != ciphertext.key_id {
            return Err(Error::Scheme(
                "relinearization keys belong to a different secret key".to_string(),
            ));
        }
        if ciphertext.size == 2 {
            return Ok(());
        }
        if ciphertext.size.saturating_sub(2) > relin_keys.count {
            return Err(Error::Scheme("not enough relinearization keys".to_string()));
        }
        ciphertext.size = 2;
        ciphertext.noise = self.modulus.clamp_noise(ciphertext.noise.saturating_add(1));
        Ok(())
    }

    fn mod_switch_to_next_inplace(&self, ciphertext: &mut SimCiphertext) -> Result<()> {
        if ciphertext.level <= 1 {
            return Err(Error::Scheme("end of modulus switching chain reached".to_string()));
        }
        let dropped = self
            .modulus
            .data_bits
            .get(ciphertext.level as usize - 1)
            .copied()
            .ok_or_else(|| {
                Error::Scheme("ciphertext level is outside the modulus chain".to_string())
            })?;
        ciphertext.level -= 1;
        ciphertext.noise = ciphertext
            .noise
            .saturating_sub(dropped)
            .max(self.modulus.noise_floor());
        Ok(())
    }

    fn add_plain_inplace(
        &self,
        ciphertext: &mut SimCiphertext,
        plain: &SimPlaintext,
    ) -> Result<()> {
        self.check_plain(plain)?;
        let t = self.modulus.plain_modulus;
        ciphertext.message = ciphertext.message.add_fn(&plain.0, t);
        Ok(())
    }

    fn sub_plain_inplace(
        &self,
        ciphertext: &mut SimCiphertext,
        plain: &SimPlaintext,
    ) -> Result<()> {
        self.check_plain(plain)?;
        let t = self.modulus.plain_modulus;
        ciphertext.message = ciphertext.message.sub_fn(&plain.0, t);
        Ok(())
    }

    fn multiply_plain_inplace(
        &self,
        ciphertext: &mut SimCiphertext,
        plain: &SimPlaintext,
    ) -> Result<()> {
        self.check_plain(plain)?;
        let modulus = &self.modulus;
        ciphertext.message = ciphertext
            .message
            .mul_fn(&plain.0, modulus.degree, modulus.plain_modulus);
        ciphertext.mask = ciphertext.mask.wrapping_mul(Self::plain_factor(plain));
        let growth = bit_len(plain.0.max_centered(modulus.plain_modulus))
            + ceil_log2(plain.0.nonzero_count() as u64);
        ciphertext.noise = modulus.clamp_noise(ciphertext.noise.saturating_add(growth));
        Ok(())
    }
}
