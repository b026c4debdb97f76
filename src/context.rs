use log::{debug, warn};

use crate::bfv::Bfv;
use crate::scheme::{Parameters, Scheme};
use crate::{Error, Result};

/// Plain modulus used by every security preset.
pub const DEFAULT_PLAIN_MODULUS: u64 = 65537;

/// Parameter presets.
///
/// | Level    | `poly_modulus_degree` | `plain_modulus` |
/// |----------|-----------------------|-----------------|
/// | `Low`    | 4096                  | 65537           |
/// | `Medium` | 8192                  | 65537           |
/// | `High`   | 16384                 | 65537           |
///
/// Higher levels allow deeper computations at the cost of speed and size.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SecurityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl SecurityLevel {
    #[must_use]
    pub const fn poly_modulus_degree(self) -> usize {
        match self {
            Self::Low => 4096,
            Self::Medium => 8192,
            Self::High => 16384,
        }
    }

    #[must_use]
    pub const fn parameters(self) -> Parameters {
        Parameters::new(self.poly_modulus_degree(), DEFAULT_PLAIN_MODULUS)
    }
}

struct Engine<S: Scheme> {
    scheme: S,
    evaluator: S::Evaluator,
}

impl<S: Scheme> Engine<S> {
    fn initialize(parameters: &Parameters) -> Result<Self> {
        let scheme = S::new(parameters)?;
        let evaluator = scheme.evaluator()?;
        Ok(Self { scheme, evaluator })
    }
}

/// The encryption parameters and the evaluator derived from them.
///
/// A context is immutable once built and is shared by reference: every
/// [`KeyPair`](crate::KeyPair), [`HomomorphicInt`](crate::HomomorphicInt) and codec
/// borrows it, so it must outlive them.
///
/// Construction never fails. If the scheme rejects the parameters, the context is
/// built in an invalid state: [`is_valid`](Self::is_valid) returns `false`,
/// [`last_error`](Self::last_error) holds the reason and every dependent operation
/// fails with [`Error::InvalidContext`].
///
/// ## Examples
///
/// ```
/// use hecrypt::{CryptoContext, SecurityLevel};
///
/// let ctx = CryptoContext::new(SecurityLevel::Low);
/// assert!(ctx.is_valid());
/// assert_eq!(ctx.poly_modulus_degree(), 4096);
///
/// let bad = CryptoContext::with_parameters(3000, 65537);
/// assert!(!bad.is_valid());
/// assert!(bad.last_error().is_some());
/// ```
pub struct CryptoContext<S: Scheme = Bfv> {
    parameters: Parameters,
    engine: core::result::Result<Engine<S>, Error>,
}

impl CryptoContext<Bfv> {
    #[must_use]
    /// Creates a context for a security preset.
    pub fn new(level: SecurityLevel) -> Self {
        Self::from_security_level(level)
    }

    #[must_use]
    /// Creates a context from explicit parameters.
    ///
    /// ## Arguments
    ///
    /// * `poly_modulus_degree` - Power of two between 1024 and 32768.
    /// * `plain_modulus` - The plaintext modulus `t`.
    pub fn with_parameters(poly_modulus_degree: usize, plain_modulus: u64) -> Self {
        Self::from_parameters(Parameters::new(poly_modulus_degree, plain_modulus))
    }

    /// Creates a context for a security preset, failing if it cannot be used.
    ///
    /// ## Errors
    ///
    /// Returns the reason the scheme rejected the parameters.
    pub fn try_new(level: SecurityLevel) -> Result<Self> {
        Self::try_from_parameters(level.parameters())
    }
}

impl Default for CryptoContext<Bfv> {
    fn default() -> Self {
        Self::new(SecurityLevel::default())
    }
}

impl<S: Scheme> CryptoContext<S> {
    #[must_use]
    pub fn from_security_level(level: SecurityLevel) -> Self {
        Self::from_parameters(level.parameters())
    }

    #[must_use]
    /// Instantiates scheme `S` over `parameters`.
    ///
    /// Either the scheme and its evaluator are both built, or the context is invalid.
    pub fn from_parameters(parameters: Parameters) -> Self {
        let engine = Engine::initialize(&parameters);
        match &engine {
            Ok(_) => debug!(
                "created {} context: n = {}, t = {}",
                S::NAME,
                parameters.poly_modulus_degree(),
                parameters.plain_modulus()
            ),
            Err(e) => warn!("rejected {} parameters: {e}", S::NAME),
        }
        Self { parameters, engine }
    }

    /// Like [`from_parameters`](Self::from_parameters), returning the error instead of
    /// an invalid context.
    ///
    /// ## Errors
    ///
    /// Returns the reason the scheme rejected the parameters.
    pub fn try_from_parameters(parameters: Parameters) -> Result<Self> {
        let ctx = Self::from_parameters(parameters);
        if let Err(e) = &ctx.engine {
            return Err(e.clone());
        }
        Ok(ctx)
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.engine.is_ok()
    }

    #[must_use]
    /// The reason this context is invalid, if it is.
    pub fn last_error(&self) -> Option<&Error> {
        self.engine.as_ref().err()
    }

    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[must_use]
    /// Returns the polynomial modulus degree, or 0 if the context is invalid.
    pub fn poly_modulus_degree(&self) -> usize {
        if self.is_valid() {
            self.parameters.poly_modulus_degree()
        } else {
            0
        }
    }

    #[must_use]
    /// Returns the plaintext modulus, or 0 if the context is invalid.
    pub fn plain_modulus(&self) -> u64 {
        if self.is_valid() {
            self.parameters.plain_modulus()
        } else {
            0
        }
    }

    #[must_use]
    /// Fingerprint stamped on every key and ciphertext serialized under this context.
    pub fn fingerprint(&self) -> u64 {
        self.parameters.fingerprint::<S>()
    }

    /// ## Errors
    ///
    /// Fails with [`Error::InvalidContext`] if the context is invalid.
    pub fn scheme(&self) -> Result<&S> {
        self.engine().map(|engine| &engine.scheme)
    }

    /// ## Errors
    ///
    /// Fails with [`Error::InvalidContext`] if the context is invalid.
    pub fn evaluator(&self) -> Result<&S::Evaluator> {
        self.engine().map(|engine| &engine.evaluator)
    }

    fn engine(&self) -> Result<&Engine<S>> {
        self.engine
            .as_ref()
            .map_err(|e| Error::InvalidContext(e.to_string()))
    }

    pub(crate) fn ensure_valid(&self) -> Result<()> {
        self.engine().map(|_| ())
    }

    pub(crate) fn is_same(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }

    /// Fails unless `other` is this very context. `what` names the foreign material.
    pub(crate) fn ensure_same(&self, other: &Self, what: &str) -> Result<()> {
        if self.is_same(other) {
            Ok(())
        } else {
            Err(Error::ContextMismatch(format!(
                "{what} belong to a different crypto context"
            )))
        }
    }
}

impl<S: Scheme> core::fmt::Debug for CryptoContext<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CryptoContext")
            .field("scheme", &S::NAME)
            .field("parameters", &self.parameters)
            .field("valid", &self.is_valid())
            .finish()
    }
}
