//! `Bfv`: the BFV scheme over the [`fhe`] crate.
//!
//! Plaintexts are coefficient-encoded: the `i`-th coefficient passed to
//! [`Scheme::encode`] is the coefficient of `x^i`. Every modulus of the chain picked for
//! the degree is a ciphertext modulus, so a fresh ciphertext sits at level 0 and each
//! modulus switch drops the last prime.
//!
//! A secret key is stored as the 32-byte seed it is sampled from. Keep key files
//! private.

use core::fmt;
use core::hash::Hasher;
use std::borrow::Cow;
use std::sync::Arc;

use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, EvaluationKey,
    EvaluationKeyBuilder, Plaintext, PublicKey, RelinearizationKey, SecretKey,
};
use fhe_traits::{
    DeserializeParametrized, FheDecoder, FheDecrypter, FheEncoder, FheEncrypter, Serialize,
};
use fnv::FnvHasher;
use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use zeroize::Zeroizing;

use crate::error::ParametersError;
use crate::scheme::{
    bit_len, coeff_modulus_bits, Evaluator, KeyGenerator, Parameters, Scheme, SchemeCiphertext,
    SchemeObject,
};
use crate::{Error, Result};

type Seed = [u8; 32];

fn scheme_error(e: fhe::Error) -> Error {
    Error::Scheme(e.to_string())
}

fn serialization_error(e: fhe::Error) -> Error {
    Error::Serialization(e.to_string())
}

fn random_seed() -> Result<Seed> {
    let mut seed = Seed::default();
    getrandom::getrandom(&mut seed)
        .map_err(|e| Error::Scheme(format!("Randomness unavailable: {e}")))?;
    Ok(seed)
}

// Index of the ciphertext in the modulus chain, 0 when fresh.
fn level_of(par: &BfvParameters, ciphertext: &Ciphertext) -> usize {
    let moduli = ciphertext.first().map_or(0, |c| c.ctx().moduli().len());
    par.moduli().len().saturating_sub(moduli)
}

// A lower bound on log2(q) for the ciphertext modulus at the ciphertext's level.
fn coefficient_bits(ciphertext: &Ciphertext) -> u32 {
    ciphertext.first().map_or(0, |c| {
        c.ctx()
            .moduli()
            .iter()
            .map(|&q| bit_len(q).saturating_sub(1))
            .sum()
    })
}

fn encode_at(
    par: &Arc<BfvParameters>,
    plaintext: &BfvPlaintext,
    level: usize,
) -> Result<Plaintext> {
    let coefficients: &[u64] = if plaintext.0.is_empty() {
        &[0]
    } else {
        &plaintext.0
    };
    Plaintext::try_encode(coefficients, Encoding::poly_at_level(level), par).map_err(scheme_error)
}

fn trimmed(mut coefficients: Vec<u64>) -> Vec<u64> {
    while coefficients.last() == Some(&0) {
        coefficients.pop();
    }
    coefficients
}

/// Plaintext coefficients, encoded at the level of the ciphertext they meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfvPlaintext(Vec<u64>);

impl SchemeObject<Bfv> for Ciphertext {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(Serialize::to_bytes(self))
    }

    fn from_bytes(bytes: &[u8], scheme: &Bfv) -> Result<Self> {
        <Self as DeserializeParametrized>::from_bytes(bytes, &scheme.par)
            .map_err(serialization_error)
    }
}

impl SchemeCiphertext<Bfv> for Ciphertext {
    fn size(&self) -> usize {
        self.len()
    }

    fn is_transparent(&self) -> bool {
        self.iter()
            .skip(1)
            .all(|c| c.coefficients().iter().all(|&x| x == 0))
    }
}

impl SchemeObject<Bfv> for PublicKey {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(Serialize::to_bytes(self))
    }

    fn from_bytes(bytes: &[u8], scheme: &Bfv) -> Result<Self> {
        <Self as DeserializeParametrized>::from_bytes(bytes, &scheme.par)
            .map_err(serialization_error)
    }
}

impl SchemeObject<Bfv> for RelinearizationKey {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(Serialize::to_bytes(self))
    }

    fn from_bytes(bytes: &[u8], scheme: &Bfv) -> Result<Self> {
        <Self as DeserializeParametrized>::from_bytes(bytes, &scheme.par)
            .map_err(serialization_error)
    }
}

/// A secret key and the seed it was sampled from.
#[derive(Clone)]
pub struct BfvSecretKey {
    seed: Zeroizing<Seed>,
    key: SecretKey,
}

impl BfvSecretKey {
    fn from_seed(seed: Seed, par: &Arc<BfvParameters>) -> Self {
        let key = SecretKey::random(par, &mut ChaCha20Rng::from_seed(seed));
        Self {
            seed: Zeroizing::new(seed),
            key,
        }
    }

    fn id(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(&*self.seed);
        hasher.finish()
    }
}

impl fmt::Debug for BfvSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BfvSecretKey")
            .field("id", &format_args!("{:016x}", self.id()))
            .finish_non_exhaustive()
    }
}

impl SchemeObject<Bfv> for BfvSecretKey {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.seed.to_vec())
    }

    fn from_bytes(bytes: &[u8], scheme: &Bfv) -> Result<Self> {
        let seed = Seed::try_from(bytes).map_err(|_| {
            Error::Serialization(format!("secret key seed must be 32 bytes, found {}", bytes.len()))
        })?;
        Ok(Self::from_seed(seed, &scheme.par))
    }
}

/// Row and column rotation keys.
#[derive(Debug, Clone)]
pub struct BfvGaloisKeys(Arc<EvaluationKey>);

impl BfvGaloisKeys {
    #[must_use]
    pub fn evaluation_key(&self) -> &EvaluationKey {
        &self.0
    }
}

impl SchemeObject<Bfv> for BfvGaloisKeys {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(Serialize::to_bytes(self.0.as_ref()))
    }

    fn from_bytes(bytes: &[u8], scheme: &Bfv) -> Result<Self> {
        let key = <EvaluationKey as DeserializeParametrized>::from_bytes(bytes, &scheme.par)
            .map_err(serialization_error)?;
        Ok(Self(Arc::new(key)))
    }
}

/// BFV over the `fhe` lattice library. See the [module documentation](self).
#[derive(Debug, Clone)]
pub struct Bfv {
    parameters: Parameters,
    par: Arc<BfvParameters>,
    plain_bits: u32,
}

impl Bfv {
    /// The underlying `fhe` parameters.
    #[must_use]
    pub fn bfv_parameters(&self) -> &Arc<BfvParameters> {
        &self.par
    }

    /// Position of `ciphertext` in the modulus chain; 0 for a fresh ciphertext.
    #[must_use]
    pub fn level(&self, ciphertext: &Ciphertext) -> usize {
        level_of(&self.par, ciphertext)
    }

    fn budget(&self, secret_key: &BfvSecretKey, ciphertext: &Ciphertext) -> Result<u32> {
        // SAFETY: measuring noise runs in time that depends on the noise; the
        // measurement stays in this process.
        let noise = unsafe { secret_key.key.measure_noise(ciphertext) }.map_err(|e| {
            Error::Decryption(format!("noise measurement failed: {e}"))
        })?;
        let noise = u32::try_from(noise).unwrap_or(u32::MAX);
        let used = self.plain_bits.saturating_add(noise).saturating_add(1);
        Ok(coefficient_bits(ciphertext).saturating_sub(used))
    }
}

impl Scheme for Bfv {
    const NAME: &'static str = "bfv";

    type Plaintext = BfvPlaintext;
    type Ciphertext = Ciphertext;
    type PublicKey = PublicKey;
    type SecretKey = BfvSecretKey;
    type RelinKeys = RelinearizationKey;
    type GaloisKeys = BfvGaloisKeys;
    type KeyGenerator = BfvKeyGenerator;
    type Evaluator = BfvEvaluator;

    fn new(parameters: &Parameters) -> Result<Self> {
        let degree = parameters.poly_modulus_degree();
        let chain = coeff_modulus_bits(degree).ok_or(ParametersError::InvalidDegree(degree))?;

        let plain_modulus = parameters.plain_modulus();
        if plain_modulus < 2 {
            return Err(ParametersError::InvalidPlainModulus(plain_modulus).into());
        }

        // Leave room for the noise of a fresh encryption.
        let plain_bits = bit_len(plain_modulus);
        let coeff_bits: u32 = chain.iter().sum();
        let fresh_noise = degree.trailing_zeros() / 2 + 3;
        if plain_bits + fresh_noise + 1 >= coeff_bits {
            return Err(ParametersError::PlainModulusTooLarge {
                plain_bits,
                coeff_bits,
            }
            .into());
        }

        let moduli_sizes: Vec<usize> = chain.iter().map(|&bits| bits as usize).collect();
        let par = BfvParametersBuilder::new()
            .set_degree(degree)
            .set_plaintext_modulus(plain_modulus)
            .set_moduli_sizes(&moduli_sizes)
            .build_arc()
            .map_err(|e| ParametersError::Rejected(e.to_string()))?;
        debug!("built BFV parameters with {} moduli", par.moduli().len());

        Ok(Self {
            parameters: *parameters,
            par,
            plain_bits,
        })
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn evaluator(&self) -> Result<BfvEvaluator> {
        Ok(BfvEvaluator {
            par: self.par.clone(),
        })
    }

    fn key_generator(&self) -> Result<BfvKeyGenerator> {
        Ok(BfvKeyGenerator {
            par: self.par.clone(),
            secret_key: BfvSecretKey::from_seed(random_seed()?, &self.par),
        })
    }

    fn encode(&self, coefficients: &[u64]) -> Result<BfvPlaintext> {
        let degree = self.parameters.poly_modulus_degree();
        if coefficients.len() > degree {
            return Err(Error::InvalidOperand(format!(
                "{} coefficients do not fit in a degree {degree} plaintext",
                coefficients.len()
            )));
        }
        let t = self.parameters.plain_modulus();
        if let Some(c) = coefficients.iter().find(|&&c| c >= t) {
            return Err(Error::InvalidOperand(format!(
                "coefficient {c} is not below the plain modulus {t}"
            )));
        }
        Ok(BfvPlaintext(trimmed(coefficients.to_vec())))
    }

    fn decode(&self, plaintext: &BfvPlaintext) -> Result<Vec<u64>> {
        if plaintext.0.is_empty() {
            Ok(vec![0])
        } else {
            Ok(plaintext.0.clone())
        }
    }

    fn encrypt(&self, public_key: &PublicKey, plaintext: &BfvPlaintext) -> Result<Ciphertext> {
        let plaintext = encode_at(&self.par, plaintext, 0)?;
        public_key
            .try_encrypt(&plaintext, &mut rand::thread_rng())
            .map_err(scheme_error)
    }

    fn decrypt(&self, secret_key: &BfvSecretKey, ciphertext: &Ciphertext) -> Result<BfvPlaintext> {
        if self.budget(secret_key, ciphertext)? == 0 {
            return Err(Error::NoiseBudgetExhausted);
        }
        let plaintext = secret_key
            .key
            .try_decrypt(ciphertext)
            .map_err(|e| Error::Decryption(e.to_string()))?;
        let coefficients = Vec::<u64>::try_decode(&plaintext, Encoding::poly())
            .map_err(|e| Error::Decryption(e.to_string()))?;
        Ok(BfvPlaintext(trimmed(coefficients)))
    }

    fn invariant_noise_budget(
        &self,
        secret_key: &BfvSecretKey,
        ciphertext: &Ciphertext,
    ) -> Result<u32> {
        self.budget(secret_key, ciphertext)
    }
}

/// Key generator bound to one freshly sampled secret key.
pub struct BfvKeyGenerator {
    par: Arc<BfvParameters>,
    secret_key: BfvSecretKey,
}

impl BfvKeyGenerator {
    fn keyswitching_check(&self) -> Result<()> {
        if self.par.moduli().len() > 1 {
            Ok(())
        } else {
            Err(Error::Scheme(
                "keyswitching is not supported by the encryption parameters".to_string(),
            ))
        }
    }

    // Rotations by powers of two in both directions.
    fn column_rotations(&self) -> Vec<usize> {
        let row_size = self.par.degree() / 2;
        let mut steps: Vec<usize> = core::iter::successors(Some(1usize), |s| Some(s * 2))
            .take_while(|&s| s < row_size)
            .flat_map(|s| [s, row_size - s])
            .collect();
        steps.sort_unstable();
        steps.dedup();
        steps
    }
}

impl KeyGenerator<Bfv> for BfvKeyGenerator {
    fn secret_key(&self) -> BfvSecretKey {
        self.secret_key.clone()
    }

    fn create_public_key(&self) -> Result<PublicKey> {
        Ok(PublicKey::new(&self.secret_key.key, &mut rand::thread_rng()))
    }

    fn create_relin_keys(&self) -> Result<RelinearizationKey> {
        self.keyswitching_check()?;
        RelinearizationKey::new(&self.secret_key.key, &mut rand::thread_rng()).map_err(scheme_error)
    }

    fn create_galois_keys(&self) -> Result<BfvGaloisKeys> {
        self.keyswitching_check()?;
        let mut builder = EvaluationKeyBuilder::new(&self.secret_key.key).map_err(scheme_error)?;
        builder.enable_row_rotation().map_err(scheme_error)?;
        for step in self.column_rotations() {
            builder.enable_column_rotation(step).map_err(scheme_error)?;
        }
        let key = builder.build(&mut rand::thread_rng()).map_err(scheme_error)?;
        Ok(BfvGaloisKeys(Arc::new(key)))
    }
}

/// Evaluator checking operand shapes before handing them to `fhe`.
pub struct BfvEvaluator {
    par: Arc<BfvParameters>,
}

impl BfvEvaluator {
    fn check_levels(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<()> {
        if level_of(&self.par, lhs) == level_of(&self.par, rhs) {
            Ok(())
        } else {
            Err(Error::Scheme(
                "ciphertexts are at different modulus levels".to_string(),
            ))
        }
    }

    // Appends zero polynomials so that `ciphertext` has at least `size` of them.
    fn pad(&self, ciphertext: &mut Ciphertext, size: usize) -> Result<()> {
        if ciphertext.len() >= size {
            return Ok(());
        }
        let mut polys = ciphertext.to_vec();
        let first = polys
            .first()
            .ok_or_else(|| Error::Scheme("empty ciphertext".to_string()))?;
        let zero = first - first;
        polys.resize(size, zero);
        *ciphertext = Ciphertext::new(polys, &self.par).map_err(scheme_error)?;
        Ok(())
    }

    // Brings both operands to the same size for addition and subtraction.
    fn aligned<'a>(
        &self,
        lhs: &mut Ciphertext,
        rhs: &'a Ciphertext,
    ) -> Result<Cow<'a, Ciphertext>> {
        self.check_levels(lhs, rhs)?;
        self.pad(lhs, rhs.len())?;
        if rhs.len() >= lhs.len() {
            return Ok(Cow::Borrowed(rhs));
        }
        let mut padded = rhs.clone();
        self.pad(&mut padded, lhs.len())?;
        Ok(Cow::Owned(padded))
    }

    fn plain_at(&self, ciphertext: &Ciphertext, plain: &BfvPlaintext) -> Result<Plaintext> {
        encode_at(&self.par, plain, level_of(&self.par, ciphertext))
    }
}

impl Evaluator<Bfv> for BfvEvaluator {
    fn add_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> Result<()> {
        let rhs = self.aligned(lhs, rhs)?;
        *lhs += &*rhs;
        Ok(())
    }

    fn sub_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> Result<()> {
        let rhs = self.aligned(lhs, rhs)?;
        *lhs -= &*rhs;
        Ok(())
    }

    fn negate_inplace(&self, ciphertext: &mut Ciphertext) -> Result<()> {
        *ciphertext = -&*ciphertext;
        Ok(())
    }

    fn multiply_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> Result<()> {
        self.check_levels(lhs, rhs)?;
        *lhs = &*lhs * rhs;
        Ok(())
    }

    fn square_inplace(&self, ciphertext: &mut Ciphertext) -> Result<()> {
        *ciphertext = &*ciphertext * &*ciphertext;
        Ok(())
    }

    fn relinearize_inplace(
        &self,
        ciphertext: &mut Ciphertext,
        relin_keys: &RelinearizationKey,
    ) -> Result<()> {
        match ciphertext.len() {
            2 => Ok(()),
            3 => relin_keys.relinearizes(ciphertext).map_err(scheme_error),
            _ => Err(Error::Scheme("not enough relinearization keys".to_string())),
        }
    }

    fn mod_switch_to_next_inplace(&self, ciphertext: &mut Ciphertext) -> Result<()> {
        let level = level_of(&self.par, ciphertext);
        if level >= self.par.max_level() {
            return Err(Error::Scheme("end of modulus switching chain reached".to_string()));
        }
        ciphertext.switch_down().map_err(scheme_error)
    }

    fn add_plain_inplace(&self, ciphertext: &mut Ciphertext, plain: &BfvPlaintext) -> Result<()> {
        let plain = self.plain_at(ciphertext, plain)?;
        *ciphertext += &plain;
        Ok(())
    }

    fn sub_plain_inplace(&self, ciphertext: &mut Ciphertext, plain: &BfvPlaintext) -> Result<()> {
        let plain = self.plain_at(ciphertext, plain)?;
        *ciphertext -= &plain;
        Ok(())
    }

    fn multiply_plain_inplace(
        &self,
        ciphertext: &mut Ciphertext,
        plain: &BfvPlaintext,
    ) -> Result<()> {
        let plain = self.plain_at(ciphertext, plain)?;
        *ciphertext *= &plain;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(degree: usize) -> (Bfv, BfvKeyGenerator, PublicKey, BfvEvaluator) {
        let scheme = Bfv::new(&Parameters::new(degree, 65537)).unwrap();
        let keygen = scheme.key_generator().unwrap();
        let pk = keygen.create_public_key().unwrap();
        let evaluator = scheme.evaluator().unwrap();
        (scheme, keygen, pk, evaluator)
    }

    fn encrypt(scheme: &Bfv, pk: &PublicKey, coefficients: &[u64]) -> Ciphertext {
        let pt = scheme.encode(coefficients).unwrap();
        scheme.encrypt(pk, &pt).unwrap()
    }

    fn decrypt(scheme: &Bfv, sk: &BfvSecretKey, ct: &Ciphertext) -> Vec<u64> {
        scheme.decode(&scheme.decrypt(sk, ct).unwrap()).unwrap()
    }

    #[test]
    fn test_parameter_validation() {
        for degree in [0, 512, 3000] {
            assert_eq!(
                Bfv::new(&Parameters::new(degree, 65537)).unwrap_err(),
                Error::Parameters(ParametersError::InvalidDegree(degree))
            );
        }
        assert_eq!(
            Bfv::new(&Parameters::new(4096, 1)).unwrap_err(),
            Error::Parameters(ParametersError::InvalidPlainModulus(1))
        );
        assert!(matches!(
            Bfv::new(&Parameters::new(1024, 1 << 20)),
            Err(Error::Parameters(ParametersError::PlainModulusTooLarge { .. }))
        ));
        let scheme = Bfv::new(&Parameters::new(4096, 65537)).unwrap();
        assert_eq!(scheme.bfv_parameters().moduli().len(), 3);
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (scheme, keygen, pk, _) = setup(4096);
        let sk = keygen.secret_key();
        let ct = encrypt(&scheme, &pk, &[65, 0, 66, 0]);
        assert_eq!(ct.size(), 2);
        assert_eq!(scheme.level(&ct), 0);
        assert!(!ct.is_transparent());
        assert_eq!(decrypt(&scheme, &sk, &ct), vec![65, 0, 66]);
        assert_eq!(decrypt(&scheme, &sk, &encrypt(&scheme, &pk, &[])), vec![0]);
        assert!(scheme.invariant_noise_budget(&sk, &ct).unwrap() > 0);
    }

    #[test]
    fn test_arithmetic() {
        let (scheme, keygen, pk, evaluator) = setup(4096);
        let sk = keygen.secret_key();
        let rk = keygen.create_relin_keys().unwrap();
        let a = encrypt(&scheme, &pk, &[6]);
        let b = encrypt(&scheme, &pk, &[7]);

        assert_eq!(decrypt(&scheme, &sk, &evaluator.add(&a, &b).unwrap()), vec![13]);
        assert_eq!(decrypt(&scheme, &sk, &evaluator.sub(&b, &a).unwrap()), vec![1]);
        assert_eq!(decrypt(&scheme, &sk, &evaluator.negate(&a).unwrap()), vec![65531]);

        let product = evaluator.multiply(&a, &b).unwrap();
        assert_eq!(product.size(), 3);
        assert!(
            scheme.invariant_noise_budget(&sk, &product).unwrap()
                < scheme.invariant_noise_budget(&sk, &a).unwrap()
        );
        assert_eq!(decrypt(&scheme, &sk, &product), vec![42]);

        // Mixed sizes are padded before adding
        assert_eq!(decrypt(&scheme, &sk, &evaluator.add(&product, &a).unwrap()), vec![48]);
        assert_eq!(decrypt(&scheme, &sk, &evaluator.sub(&a, &product).unwrap()), vec![65501]);

        let relin = evaluator.relinearize(&product, &rk).unwrap();
        assert_eq!(relin.size(), 2);
        assert_eq!(decrypt(&scheme, &sk, &relin), vec![42]);

        let cubed = evaluator.multiply(&product, &a).unwrap();
        assert_eq!(cubed.size(), 4);
        assert!(matches!(evaluator.relinearize(&cubed, &rk), Err(Error::Scheme(_))));
    }

    #[test]
    fn test_plain_operations() {
        let (scheme, keygen, pk, evaluator) = setup(4096);
        let sk = keygen.secret_key();
        let a = encrypt(&scheme, &pk, &[10]);
        let three = scheme.encode(&[3]).unwrap();

        assert_eq!(decrypt(&scheme, &sk, &evaluator.add_plain(&a, &three).unwrap()), vec![13]);
        assert_eq!(decrypt(&scheme, &sk, &evaluator.sub_plain(&a, &three).unwrap()), vec![7]);
        let scaled = evaluator.multiply_plain(&a, &three).unwrap();
        assert_eq!(scaled.size(), 2);
        assert_eq!(decrypt(&scheme, &sk, &scaled), vec![30]);

        let zero = scheme.encode(&[0]).unwrap();
        assert!(evaluator.multiply_plain(&a, &zero).unwrap().is_transparent());
        assert!(evaluator.sub(&a, &a).unwrap().is_transparent());
    }

    #[test]
    fn test_mod_switch() {
        let (scheme, keygen, pk, evaluator) = setup(4096);
        let sk = keygen.secret_key();
        let a = encrypt(&scheme, &pk, &[9]);

        let switched = evaluator.mod_switch_to_next(&a).unwrap();
        assert_eq!(scheme.level(&switched), 1);
        assert_eq!(decrypt(&scheme, &sk, &switched), vec![9]);
        assert!(matches!(evaluator.add(&a, &switched), Err(Error::Scheme(_))));
        assert!(matches!(evaluator.multiply(&a, &switched), Err(Error::Scheme(_))));

        // Plaintexts follow the ciphertext down the chain
        let two = scheme.encode(&[2]).unwrap();
        let doubled = evaluator.multiply_plain(&switched, &two).unwrap();
        assert_eq!(decrypt(&scheme, &sk, &doubled), vec![18]);

        let last = evaluator.mod_switch_to_next(&switched).unwrap();
        assert!(matches!(evaluator.mod_switch_to_next(&last), Err(Error::Scheme(_))));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let (scheme, _, pk, _) = setup(4096);
        let other = scheme.key_generator().unwrap().secret_key();
        let ct = encrypt(&scheme, &pk, &[5]);
        assert!(scheme.decrypt(&other, &ct).is_err());
    }

    #[test]
    fn test_serialization() {
        let (scheme, keygen, pk, evaluator) = setup(4096);
        let sk = keygen.secret_key();
        let (four, five) = (encrypt(&scheme, &pk, &[4]), encrypt(&scheme, &pk, &[5]));
        let ct = evaluator.multiply(&four, &five).unwrap();

        let bytes = SchemeObject::to_bytes(&ct).unwrap();
        let restored = <Ciphertext as SchemeObject<Bfv>>::from_bytes(&bytes, &scheme).unwrap();
        assert_eq!(restored, ct);

        let restored_sk = BfvSecretKey::from_bytes(&sk.to_bytes().unwrap(), &scheme).unwrap();
        assert_eq!(decrypt(&scheme, &restored_sk, &ct), vec![20]);

        let bytes = SchemeObject::to_bytes(&pk).unwrap();
        let restored_pk = <PublicKey as SchemeObject<Bfv>>::from_bytes(&bytes, &scheme).unwrap();
        assert_eq!(decrypt(&scheme, &sk, &encrypt(&scheme, &restored_pk, &[8])), vec![8]);

        assert!(matches!(
            BfvSecretKey::from_bytes(&[1, 2, 3], &scheme),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            <Ciphertext as SchemeObject<Bfv>>::from_bytes(b"garbage", &scheme),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_keyswitching_unavailable_on_single_prime() {
        let (_, keygen, _, _) = setup(2048);
        assert!(matches!(keygen.create_relin_keys(), Err(Error::Scheme(_))));
        assert!(matches!(keygen.create_galois_keys(), Err(Error::Scheme(_))));
    }

    #[test]
    fn test_galois_keys() {
        let (scheme, keygen, _, _) = setup(4096);
        let gk = keygen.create_galois_keys().unwrap();
        assert!(gk.evaluation_key().supports_row_rotation());
        assert!(gk.evaluation_key().supports_column_rotation_by(1));
        let restored = BfvGaloisKeys::from_bytes(&gk.to_bytes().unwrap(), &scheme).unwrap();
        assert_eq!(restored.evaluation_key(), gk.evaluation_key());
    }

    #[test]
    fn test_secret_key_debug_hides_seed() {
        let (_, keygen, _, _) = setup(4096);
        let debug = format!("{:?}", keygen.secret_key());
        assert!(debug.starts_with("BfvSecretKey"));
        assert!(!debug.contains("seed"));
    }
}
