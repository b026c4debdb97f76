use core::fmt;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::path::Path;

use log::warn;

use crate::context::CryptoContext;
use crate::envelope::{self, ObjectKind};
use crate::file_handler;
use crate::keys::KeyPair;
use crate::bfv::Bfv;
use crate::scheme::{Evaluator, Scheme, SchemeCiphertext, SchemeObject};
use crate::{Error, Result};

enum State<C> {
    Valid(C),
    Invalid(Error),
}

/// An encrypted signed integer.
///
/// The value is stored in the constant coefficient of a plaintext, using centered
/// representatives: with plain modulus `t`, any integer in `[-(t - 1) / 2, (t - 1) / 2]`
/// can be encrypted, and results of arithmetic are correct modulo `t`.
///
/// Operations never panic. An operation that cannot be carried out (missing key,
/// invalid operand, operands from different contexts, scheme failure) returns an
/// *invalid* value which remembers why; every operation involving an invalid value is
/// invalid too, and [`decrypt`](Self::decrypt) reports the original reason.
///
/// ## Examples
///
/// ```
/// use hecrypt::{CryptoContext, HomomorphicInt, KeyPair, SecurityLevel};
///
/// let ctx = CryptoContext::new(SecurityLevel::Low);
/// let mut keys = KeyPair::new(&ctx);
/// keys.generate().unwrap();
///
/// let a = HomomorphicInt::encrypt(20, &keys);
/// let b = HomomorphicInt::encrypt(22, &keys);
/// let sum = &a + &b;
///
/// assert_eq!(sum.decrypt(&keys).unwrap(), 42);
/// assert_eq!((-&a).decrypt(&keys).unwrap(), -20);
/// ```
pub struct HomomorphicInt<'ctx, S: Scheme = Bfv> {
    ctx: Option<&'ctx CryptoContext<S>>,
    state: State<S::Ciphertext>,
}

// Maps `value` to its centered representative modulo `plain_modulus`.
fn encode_value(value: i64, plain_modulus: u64) -> Result<u64> {
    let half = i128::from((plain_modulus.saturating_sub(1)) / 2);
    let wide = i128::from(value);
    if wide > half || wide < -half {
        return Err(Error::InvalidOperand(format!(
            "{value} is outside the plaintext range [-{half}, {half}]"
        )));
    }
    let reduced = if wide < 0 {
        wide + i128::from(plain_modulus)
    } else {
        wide
    };
    u64::try_from(reduced).map_err(|_| Error::InvalidOperand(format!("{value} cannot be encoded")))
}

fn decode_value(coefficient: u64, plain_modulus: u64) -> i64 {
    let wide = i128::from(coefficient % plain_modulus.max(1));
    let half = i128::from((plain_modulus.saturating_sub(1)) / 2);
    let centered = if wide > half {
        wide - i128::from(plain_modulus)
    } else {
        wide
    };
    // |centered| < 2^60
    centered as i64
}

fn unbound() -> Error {
    Error::InvalidContext("value is not bound to a crypto context".to_string())
}

fn plain_constant<S: Scheme>(ctx: &CryptoContext<S>, value: i64) -> Result<S::Plaintext> {
    let scheme = ctx.scheme()?;
    scheme.encode(&[encode_value(value, ctx.plain_modulus())?])
}

impl<'ctx, S: Scheme> HomomorphicInt<'ctx, S> {
    fn valid(ctx: &'ctx CryptoContext<S>, ciphertext: S::Ciphertext) -> Self {
        Self {
            ctx: Some(ctx),
            state: State::Valid(ciphertext),
        }
    }

    fn invalid(ctx: Option<&'ctx CryptoContext<S>>, error: Error) -> Self {
        Self {
            ctx,
            state: State::Invalid(error),
        }
    }

    fn from_result(ctx: Option<&'ctx CryptoContext<S>>, result: Result<S::Ciphertext>) -> Self {
        match (result, ctx) {
            (Ok(ciphertext), Some(ctx)) => {
                if ciphertext.is_transparent() {
                    warn!("operation produced a transparent ciphertext");
                }
                Self::valid(ctx, ciphertext)
            }
            (Ok(_), None) => Self::invalid(None, unbound()),
            (Err(e), ctx) => Self::invalid(ctx, e),
        }
    }

    #[must_use]
    /// Encrypts `value` under the public key of `keys`.
    ///
    /// ## Returns
    ///
    /// An invalid value if the context is invalid, the public key is missing or
    /// `value` is outside the plaintext range.
    pub fn encrypt(value: i64, keys: &KeyPair<'ctx, S>) -> Self {
        let result = Self::try_encrypt(value, keys);
        if let Err(e) = &result {
            warn!("encryption failed: {e}");
        }
        Self::from_result(Some(keys.context()), result)
    }

    fn try_encrypt(value: i64, keys: &KeyPair<'ctx, S>) -> Result<S::Ciphertext> {
        let ctx = keys.context();
        let scheme = ctx.scheme()?;
        let public_key = keys.public_key()?;
        let plaintext = plain_constant(ctx, value)?;
        scheme.encrypt(public_key, &plaintext)
    }

    /// Decrypts the value with the secret key of `keys`.
    ///
    /// ## Errors
    ///
    /// Fails if this value is invalid (with the reason it became invalid), if `keys`
    /// is bound to another context, if the secret key is missing, or if decryption
    /// fails (for instance because the noise budget is exhausted).
    pub fn decrypt(&self, keys: &KeyPair<'_, S>) -> Result<i64> {
        let (ctx, ciphertext) = self.operand()?;
        ctx.ensure_same(keys.context(), "keys")?;
        let secret_key = keys.secret_key()?;
        let scheme = ctx.scheme()?;

        let plaintext = scheme.decrypt(secret_key, ciphertext)?;
        let coefficients = scheme.decode(&plaintext)?;
        let constant = coefficients
            .first()
            .copied()
            .ok_or_else(|| Error::Decryption("plaintext has no coefficients".to_string()))?;
        Ok(decode_value(constant, ctx.plain_modulus()))
    }

    fn operand(&self) -> Result<(&'ctx CryptoContext<S>, &S::Ciphertext)> {
        match (&self.state, self.ctx) {
            (State::Valid(ciphertext), Some(ctx)) => Ok((ctx, ciphertext)),
            (State::Valid(_), None) => Err(unbound()),
            (State::Invalid(reason), _) => Err(reason.clone()),
        }
    }

    fn binary(
        &self,
        rhs: &Self,
        op: impl FnOnce(&S::Evaluator, &mut S::Ciphertext, &S::Ciphertext) -> Result<()>,
    ) -> Self {
        Self::from_result(self.ctx.or(rhs.ctx), self.try_binary(rhs, op))
    }

    fn try_binary(
        &self,
        rhs: &Self,
        op: impl FnOnce(&S::Evaluator, &mut S::Ciphertext, &S::Ciphertext) -> Result<()>,
    ) -> Result<S::Ciphertext> {
        let (ctx, lhs) = self.operand()?;
        let (rhs_ctx, rhs) = rhs.operand()?;
        ctx.ensure_same(rhs_ctx, "operands")?;
        let mut out = lhs.clone();
        op(ctx.evaluator()?, &mut out, rhs)?;
        Ok(out)
    }

    // An invalid left operand keeps its own reason.
    fn binary_assign(
        &mut self,
        rhs: &Self,
        op: impl FnOnce(&S::Evaluator, &mut S::Ciphertext, &S::Ciphertext) -> Result<()>,
    ) {
        if matches!(self.state, State::Invalid(_)) {
            return;
        }
        match self.try_binary_assign(rhs, op) {
            Ok(()) if self.is_transparent() => warn!("operation produced a transparent ciphertext"),
            Ok(()) => {}
            Err(e) => self.state = State::Invalid(e),
        }
    }

    fn try_binary_assign(
        &mut self,
        rhs: &Self,
        op: impl FnOnce(&S::Evaluator, &mut S::Ciphertext, &S::Ciphertext) -> Result<()>,
    ) -> Result<()> {
        let ctx = self.ctx.ok_or_else(unbound)?;
        let (rhs_ctx, rhs) = rhs.operand()?;
        ctx.ensure_same(rhs_ctx, "operands")?;
        let evaluator = ctx.evaluator()?;
        match &mut self.state {
            State::Valid(lhs) => op(evaluator, lhs, rhs),
            State::Invalid(reason) => Err(reason.clone()),
        }
    }

    fn unary(
        &self,
        op: impl FnOnce(&'ctx CryptoContext<S>, &S::Evaluator, &mut S::Ciphertext) -> Result<()>,
    ) -> Self {
        Self::from_result(self.ctx, self.try_unary(op))
    }

    fn try_unary(
        &self,
        op: impl FnOnce(&'ctx CryptoContext<S>, &S::Evaluator, &mut S::Ciphertext) -> Result<()>,
    ) -> Result<S::Ciphertext> {
        let (ctx, ciphertext) = self.operand()?;
        let mut out = ciphertext.clone();
        op(ctx, ctx.evaluator()?, &mut out)?;
        Ok(out)
    }

    #[must_use]
    /// Adds a plaintext constant.
    pub fn add_plain(&self, value: i64) -> Self {
        self.unary(|ctx, evaluator, ciphertext| {
            evaluator.add_plain_inplace(ciphertext, &plain_constant(ctx, value)?)
        })
    }

    #[must_use]
    /// Subtracts a plaintext constant.
    pub fn sub_plain(&self, value: i64) -> Self {
        self.unary(|ctx, evaluator, ciphertext| {
            evaluator.sub_plain_inplace(ciphertext, &plain_constant(ctx, value)?)
        })
    }

    #[must_use]
    /// Multiplies by a plaintext constant.
    ///
    /// ## Note
    ///
    /// Multiplying by 0 yields a transparent ciphertext, which decrypts without the
    /// secret key.
    pub fn mul_plain(&self, value: i64) -> Self {
        self.unary(|ctx, evaluator, ciphertext| {
            evaluator.multiply_plain_inplace(ciphertext, &plain_constant(ctx, value)?)
        })
    }

    #[must_use]
    /// Squares the value. The result has size 3 until relinearized.
    pub fn square(&self) -> Self {
        self.unary(|_, evaluator, ciphertext| evaluator.square_inplace(ciphertext))
    }

    #[must_use]
    /// Raises the value to `exponent`, relinearizing after every product.
    ///
    /// ## Returns
    ///
    /// An invalid value if `exponent` is 0, if `keys` holds no relinearization keys
    /// or belongs to another context, or if the noise budget cannot accommodate the
    /// computation.
    pub fn power(&self, exponent: u64, keys: &KeyPair<'_, S>) -> Self {
        self.unary(|ctx, evaluator, ciphertext| {
            ctx.ensure_same(keys.context(), "keys")?;
            let relin_keys = keys.relin_keys()?;
            evaluator.exponentiate_inplace(ciphertext, exponent, relin_keys)
        })
    }

    #[must_use]
    /// Reduces the ciphertext back to size 2 using the relinearization keys of `keys`.
    pub fn relinearize(&self, keys: &KeyPair<'_, S>) -> Self {
        self.unary(|ctx, evaluator, ciphertext| {
            ctx.ensure_same(keys.context(), "keys")?;
            let relin_keys = keys.relin_keys()?;
            evaluator.relinearize_inplace(ciphertext, relin_keys)
        })
    }

    #[must_use]
    /// Switches the ciphertext to the next modulus level.
    pub fn mod_switch_to_next(&self) -> Self {
        self.unary(|_, evaluator, ciphertext| evaluator.mod_switch_to_next_inplace(ciphertext))
    }

    /// Remaining noise budget in bits.
    ///
    /// ## Errors
    ///
    /// Fails if the value is invalid, or if `keys` has no secret key or belongs to
    /// another context.
    pub fn try_noise_budget(&self, keys: &KeyPair<'_, S>) -> Result<u32> {
        let (ctx, ciphertext) = self.operand()?;
        ctx.ensure_same(keys.context(), "keys")?;
        let secret_key = keys.secret_key()?;
        ctx.scheme()?.invariant_noise_budget(secret_key, ciphertext)
    }

    #[must_use]
    /// Remaining noise budget in bits, or -1 if it cannot be measured.
    pub fn noise_budget(&self, keys: &KeyPair<'_, S>) -> i32 {
        self.try_noise_budget(keys)
            .map_or(-1, |bits| i32::try_from(bits).unwrap_or(i32::MAX))
    }

    #[must_use]
    /// Number of polynomials in the ciphertext, or 0 if the value is invalid.
    pub fn size(&self) -> usize {
        match &self.state {
            State::Valid(ciphertext) => ciphertext.size(),
            State::Invalid(_) => 0,
        }
    }

    #[must_use]
    /// Whether the ciphertext decrypts without the secret key. Invalid values are not
    /// transparent.
    pub fn is_transparent(&self) -> bool {
        match &self.state {
            State::Valid(ciphertext) => ciphertext.is_transparent(),
            State::Invalid(_) => false,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.ctx.is_some() && matches!(self.state, State::Valid(_))
    }

    #[must_use]
    /// The reason this value is invalid, if it is.
    pub fn last_error(&self) -> Option<&Error> {
        match &self.state {
            State::Valid(_) => None,
            State::Invalid(reason) => Some(reason),
        }
    }

    #[must_use]
    pub const fn context(&self) -> Option<&'ctx CryptoContext<S>> {
        self.ctx
    }

    /// The underlying ciphertext.
    ///
    /// ## Errors
    ///
    /// Fails with the reason this value is invalid.
    pub fn ciphertext(&self) -> Result<&S::Ciphertext> {
        self.operand().map(|(_, ciphertext)| ciphertext)
    }

    /// Converts an invalid value into its error.
    pub fn into_result(self) -> Result<Self> {
        match self.state {
            State::Invalid(reason) => Err(reason),
            State::Valid(_) if self.ctx.is_none() => Err(unbound()),
            State::Valid(_) => Ok(self),
        }
    }

    /// Serializes the ciphertext, stamped with the context's parameter fingerprint.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let (ctx, ciphertext) = self.operand()?;
        ctx.ensure_valid()?;
        envelope::seal(ObjectKind::Ciphertext, ctx.fingerprint(), &ciphertext.to_bytes()?)
    }

    /// Reads a ciphertext serialized under a context with the same parameters as `ctx`.
    ///
    /// ## Errors
    ///
    /// Fails with [`Error::ParameterMismatch`] if the parameters differ, or
    /// [`Error::Serialization`] if `bytes` is not exactly one ciphertext valid under
    /// those parameters.
    pub fn deserialize(bytes: &[u8], ctx: &'ctx CryptoContext<S>) -> Result<Self> {
        ctx.ensure_valid()?;
        let body = envelope::open(bytes, ObjectKind::Ciphertext, ctx.fingerprint())?;
        let ciphertext = S::Ciphertext::from_bytes(&body, ctx.scheme()?)?;
        Ok(Self::valid(ctx, ciphertext))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.serialize()?;
        file_handler::write_file(path, &bytes)
    }

    pub fn load(path: impl AsRef<Path>, ctx: &'ctx CryptoContext<S>) -> Result<Self> {
        ctx.ensure_valid()?;
        let bytes = file_handler::read_file(path)?;
        Self::deserialize(&bytes, ctx)
    }
}

impl<S: Scheme> Default for HomomorphicInt<'_, S> {
    fn default() -> Self {
        Self::invalid(
            None,
            Error::InvalidOperand("value was never encrypted".to_string()),
        )
    }
}

impl<S: Scheme> Clone for HomomorphicInt<'_, S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx,
            state: match &self.state {
                State::Valid(ciphertext) => State::Valid(ciphertext.clone()),
                State::Invalid(reason) => State::Invalid(reason.clone()),
            },
        }
    }
}

impl<S: Scheme> fmt::Debug for HomomorphicInt<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Valid(ciphertext) => f
                .debug_struct("HomomorphicInt")
                .field("size", &ciphertext.size())
                .field("transparent", &ciphertext.is_transparent())
                .finish(),
            State::Invalid(reason) => f
                .debug_struct("HomomorphicInt")
                .field("invalid", reason)
                .finish(),
        }
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $inplace:ident) => {
        impl<'ctx, S: Scheme> $trait<&HomomorphicInt<'ctx, S>> for &HomomorphicInt<'ctx, S> {
            type Output = HomomorphicInt<'ctx, S>;

            fn $method(self, rhs: &HomomorphicInt<'ctx, S>) -> Self::Output {
                self.binary(rhs, |evaluator, lhs, rhs| evaluator.$inplace(lhs, rhs))
            }
        }

        impl<'ctx, S: Scheme> $trait<HomomorphicInt<'ctx, S>> for &HomomorphicInt<'ctx, S> {
            type Output = HomomorphicInt<'ctx, S>;

            fn $method(self, rhs: HomomorphicInt<'ctx, S>) -> Self::Output {
                self.$method(&rhs)
            }
        }

        impl<'ctx, S: Scheme> $trait<&HomomorphicInt<'ctx, S>> for HomomorphicInt<'ctx, S> {
            type Output = Self;

            fn $method(mut self, rhs: &Self) -> Self {
                self.$assign_method(rhs);
                self
            }
        }

        impl<'ctx, S: Scheme> $trait for HomomorphicInt<'ctx, S> {
            type Output = Self;

            fn $method(mut self, rhs: Self) -> Self {
                self.$assign_method(&rhs);
                self
            }
        }

        impl<'ctx, S: Scheme> $assign_trait<&HomomorphicInt<'ctx, S>> for HomomorphicInt<'ctx, S> {
            fn $assign_method(&mut self, rhs: &Self) {
                self.binary_assign(rhs, |evaluator, lhs, rhs| evaluator.$inplace(lhs, rhs));
            }
        }

        impl<'ctx, S: Scheme> $assign_trait for HomomorphicInt<'ctx, S> {
            fn $assign_method(&mut self, rhs: Self) {
                self.$assign_method(&rhs);
            }
        }
    };
}

impl_binary_op!(Add, add, AddAssign, add_assign, add_inplace);
impl_binary_op!(Sub, sub, SubAssign, sub_assign, sub_inplace);
impl_binary_op!(Mul, mul, MulAssign, mul_assign, multiply_inplace);

impl<'ctx, S: Scheme> Neg for &HomomorphicInt<'ctx, S> {
    type Output = HomomorphicInt<'ctx, S>;

    fn neg(self) -> Self::Output {
        self.unary(|_, evaluator, ciphertext| evaluator.negate_inplace(ciphertext))
    }
}

impl<S: Scheme> Neg for HomomorphicInt<'_, S> {
    type Output = Self;

    fn neg(self) -> Self {
        -&self
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::context::SecurityLevel;
    use crate::error::KeyKind;
    use crate::simulated::SimulatedBfv;

    fn context(level: SecurityLevel) -> CryptoContext<SimulatedBfv> {
        CryptoContext::from_security_level(level)
    }

    fn setup<S: Scheme>(ctx: &CryptoContext<S>) -> KeyPair<'_, S> {
        let mut keys = KeyPair::new(ctx);
        keys.generate().unwrap();
        keys.generate_relin_keys().unwrap();
        keys
    }

    #[test]
    fn test_encode_value() {
        let t = 65537;
        assert_eq!(encode_value(5, t), Ok(5));
        assert_eq!(encode_value(-1, t), Ok(65536));
        assert_eq!(encode_value(32768, t), Ok(32768));
        assert!(encode_value(32769, t).is_err());
        assert!(encode_value(-32769, t).is_err());
        assert!(encode_value(i64::MIN, t).is_err());

        assert_eq!(decode_value(65536, t), -1);
        assert_eq!(decode_value(32768, t), 32768);
        assert_eq!(decode_value(32769, t), -32768);
    }

    #[test]
    fn test_encrypt_decrypt() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        for value in [0, 1, 42, -7, 32768, -32768] {
            let enc = HomomorphicInt::encrypt(value, &keys);
            assert!(enc.is_valid());
            assert_eq!(enc.size(), 2);
            assert_eq!(enc.decrypt(&keys).unwrap(), value);
        }
    }

    #[test]
    fn test_encrypt_out_of_range() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let enc = HomomorphicInt::encrypt(1 << 20, &keys);
        assert!(!enc.is_valid());
        assert!(matches!(enc.last_error(), Some(Error::InvalidOperand(_))));
    }

    #[test]
    fn test_encrypt_without_public_key() {
        let ctx = context(SecurityLevel::Low);
        let keys = KeyPair::new(&ctx);
        let enc = HomomorphicInt::encrypt(5, &keys);
        assert!(!enc.is_valid());
        assert_eq!(enc.last_error(), Some(&Error::MissingKey(KeyKind::Public)));
    }

    #[test]
    fn test_decrypt_without_secret_key() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let enc = HomomorphicInt::encrypt(5, &keys);

        let mut public_only = KeyPair::new(&ctx);
        public_only
            .deserialize_key(KeyKind::Public, &keys.serialize_key(KeyKind::Public).unwrap())
            .unwrap();
        assert_eq!(
            enc.decrypt(&public_only),
            Err(Error::MissingKey(KeyKind::Secret))
        );
        assert_eq!(enc.noise_budget(&public_only), -1);
    }

    #[test]
    fn test_arithmetic() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let mut rng = rand::thread_rng();

        for _ in 0..20 {
            let a: i64 = rng.gen_range(-100..100);
            let b: i64 = rng.gen_range(-100..100);
            let ea = HomomorphicInt::encrypt(a, &keys);
            let eb = HomomorphicInt::encrypt(b, &keys);

            assert_eq!((&ea + &eb).decrypt(&keys).unwrap(), a + b);
            assert_eq!((&ea - &eb).decrypt(&keys).unwrap(), a - b);
            assert_eq!((&ea * &eb).decrypt(&keys).unwrap(), a * b);
            assert_eq!((-&ea).decrypt(&keys).unwrap(), -a);
            assert_eq!(ea.add_plain(b).decrypt(&keys).unwrap(), a + b);
            assert_eq!(ea.sub_plain(b).decrypt(&keys).unwrap(), a - b);
            assert_eq!(ea.mul_plain(b).decrypt(&keys).unwrap(), a * b);
        }
    }

    #[test]
    fn test_owned_and_assign_operators() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(6, &keys);
        let b = HomomorphicInt::encrypt(4, &keys);

        assert_eq!((a.clone() + b.clone()).decrypt(&keys).unwrap(), 10);
        assert_eq!((a.clone() - &b).decrypt(&keys).unwrap(), 2);
        assert_eq!((&a * b.clone()).decrypt(&keys).unwrap(), 24);
        assert_eq!((-a.clone()).decrypt(&keys).unwrap(), -6);

        let mut acc = a.clone();
        acc += &b;
        acc -= HomomorphicInt::encrypt(1, &keys);
        acc *= &b;
        assert_eq!(acc.decrypt(&keys).unwrap(), 36);
    }

    #[test]
    fn test_arithmetic_wraps_modulo_plain_modulus() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(30000, &keys);
        let b = HomomorphicInt::encrypt(10000, &keys);
        assert_eq!((&a + &b).decrypt(&keys).unwrap(), 40000 - 65537);
    }

    #[test]
    fn test_self_subtraction_is_transparent() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(1234, &keys);
        assert!(!a.is_transparent());

        let zero = &a - &a;
        assert!(zero.is_valid());
        assert!(zero.is_transparent());
        assert_eq!(zero.decrypt(&keys).unwrap(), 0);
    }

    #[test]
    fn test_chained_operations() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let mut rng = rand::thread_rng();
        let (a, b, c) = (
            rng.gen_range(1..50),
            rng.gen_range(1..50),
            rng.gen_range(1..50),
        );

        let result = (HomomorphicInt::encrypt(a, &keys) + HomomorphicInt::encrypt(b, &keys))
            * HomomorphicInt::encrypt(c, &keys);
        assert_eq!(result.decrypt(&keys).unwrap(), (a + b) * c);
    }

    #[test]
    fn test_polynomial_evaluation() {
        // 2x^2 + 3x + 5 at x = 4
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let x = HomomorphicInt::encrypt(4, &keys);

        let result = x.square().mul_plain(2) + x.mul_plain(3);
        let result = result.add_plain(5);
        assert_eq!(result.decrypt(&keys).unwrap(), 49);
    }

    #[test]
    fn test_size_and_relinearize() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(7, &keys);
        let b = HomomorphicInt::encrypt(6, &keys);

        let product = &a * &b;
        assert!(product.size() >= 3);
        let relin = product.relinearize(&keys);
        assert!(relin.size() <= product.size());
        assert_eq!(relin.size(), 2);
        assert_eq!(relin.decrypt(&keys).unwrap(), 42);
    }

    #[test]
    fn test_noise_budget_decreases() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(3, &keys);
        let b = HomomorphicInt::encrypt(5, &keys);

        let before = a.noise_budget(&keys);
        assert!(before > 0);
        let after = (&a * &b).noise_budget(&keys);
        assert!(after < before);
        assert_eq!(a.try_noise_budget(&keys), Ok(45));
    }

    #[test]
    fn test_power() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(3, &keys);

        assert_eq!(a.power(1, &keys).decrypt(&keys).unwrap(), 3);
        assert_eq!(a.power(3, &keys).decrypt(&keys).unwrap(), 27);
        assert_eq!(a.power(3, &keys).size(), 2);

        let zero = a.power(0, &keys);
        assert!(!zero.is_valid());
        assert!(matches!(zero.last_error(), Some(Error::InvalidOperand(_))));
    }

    #[test]
    fn test_power_and_relinearize_require_relin_keys() {
        let ctx = context(SecurityLevel::Low);
        let mut keys = KeyPair::new(&ctx);
        keys.generate().unwrap();
        let a = HomomorphicInt::encrypt(3, &keys);

        let powered = a.power(2, &keys);
        assert_eq!(powered.last_error(), Some(&Error::MissingKey(KeyKind::Relin)));
        let relin = a.square().relinearize(&keys);
        assert_eq!(relin.last_error(), Some(&Error::MissingKey(KeyKind::Relin)));
    }

    #[test]
    fn test_noise_exhaustion_is_reported() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(2, &keys);

        let deep = a.power(5, &keys);
        assert!(deep.is_valid());
        assert_eq!(deep.noise_budget(&keys), 0);
        assert_eq!(deep.decrypt(&keys), Err(Error::NoiseBudgetExhausted));
    }

    #[test]
    fn test_mod_switch_preserves_value() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(-99, &keys);

        let switched = a.mod_switch_to_next();
        assert!(switched.is_valid());
        assert_eq!(switched.decrypt(&keys).unwrap(), -99);
        assert!(!switched.mod_switch_to_next().is_valid());
    }

    #[test]
    fn test_invalid_propagates() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(3, &keys);
        let empty = HomomorphicInt::default();

        assert!(!empty.is_valid());
        assert_eq!(empty.size(), 0);
        assert!(!empty.is_transparent());

        let sum = &a + &empty;
        assert!(!sum.is_valid());
        assert_eq!(sum.last_error(), empty.last_error());
        assert!(!(&sum * &a).add_plain(1).is_valid());
        assert!(sum.decrypt(&keys).is_err());
        assert!(sum.into_result().is_err());

        let mut acc = a.clone();
        acc += &empty;
        assert!(!acc.is_valid());
    }

    #[test]
    fn test_context_mismatch() {
        let ctx1 = context(SecurityLevel::Low);
        let ctx2 = context(SecurityLevel::Low);
        let keys1 = setup(&ctx1);
        let keys2 = setup(&ctx2);

        let a = HomomorphicInt::encrypt(1, &keys1);
        let b = HomomorphicInt::encrypt(2, &keys2);
        assert!(matches!(
            (&a + &b).last_error(),
            Some(Error::ContextMismatch(_))
        ));
        assert!(matches!(a.decrypt(&keys2), Err(Error::ContextMismatch(_))));
    }

    #[test]
    fn test_invalid_context() {
        let ctx = CryptoContext::with_parameters(1234, 65537);
        let keys = KeyPair::new(&ctx);
        let enc = HomomorphicInt::encrypt(1, &keys);
        assert!(matches!(enc.last_error(), Some(Error::InvalidContext(_))));
    }

    #[test]
    fn test_serialize_round_trip() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(-321, &keys) * HomomorphicInt::encrypt(2, &keys);

        let bytes = a.serialize().unwrap();
        let restored = HomomorphicInt::deserialize(&bytes, &ctx).unwrap();
        assert_eq!(restored.size(), a.size());
        assert_eq!(restored.decrypt(&keys).unwrap(), -642);

        let other = context(SecurityLevel::Medium);
        assert!(matches!(
            HomomorphicInt::deserialize(&bytes, &other),
            Err(Error::ParameterMismatch { .. })
        ));
        assert!(HomomorphicInt::<SimulatedBfv>::default().serialize().is_err());
    }

    #[test]
    fn test_save_load() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.ct");

        HomomorphicInt::encrypt(77, &keys).save(&path).unwrap();
        let loaded = HomomorphicInt::load(&path, &ctx).unwrap();
        assert_eq!(loaded.decrypt(&keys).unwrap(), 77);
        assert!(HomomorphicInt::load(dir.path().join("missing.ct"), &ctx).is_err());
    }

    #[test]
    fn test_plain_operations_keep_size() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(12, &keys);

        assert_eq!(a.add_plain(5).size(), 2);
        assert_eq!(a.sub_plain(5).size(), 2);
        assert_eq!(a.mul_plain(5).size(), 2);
        assert_eq!((&a * &a).add_plain(5).size(), 3);
    }

    #[test]
    fn test_plain_multiplication_is_cheaper() {
        let ctx = context(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(12, &keys);

        for k in [1, 7, 180, -180] {
            let by_plain = a.mul_plain(k);
            let by_cipher = &a * &HomomorphicInt::encrypt(k, &keys);
            assert_eq!(by_plain.decrypt(&keys).unwrap(), 12 * k);
            assert!(by_plain.noise_budget(&keys) > by_cipher.noise_budget(&keys));
        }
    }

    #[test]
    fn test_bfv_backend() {
        let ctx = CryptoContext::new(SecurityLevel::Low);
        let keys = setup(&ctx);
        let a = HomomorphicInt::encrypt(-21, &keys);
        let b = HomomorphicInt::encrypt(2, &keys);

        let product = &a * &b;
        assert_eq!(product.size(), 3);
        assert_eq!(product.decrypt(&keys).unwrap(), -42);
        assert_eq!((&product + &a).decrypt(&keys).unwrap(), -63);
        assert_eq!(product.relinearize(&keys).size(), 2);
        assert_eq!(a.mul_plain(3).size(), 2);
        assert!(a.mul_plain(3).noise_budget(&keys) > product.noise_budget(&keys));
        assert!((&a - &a).is_transparent());

        let restored = HomomorphicInt::deserialize(&product.serialize().unwrap(), &ctx).unwrap();
        assert_eq!(restored.decrypt(&keys).unwrap(), -42);
        assert!(HomomorphicInt::deserialize(b"garbage", &ctx).is_err());
    }
}
