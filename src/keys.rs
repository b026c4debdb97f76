use std::path::Path;

use log::{debug, warn};

use crate::context::CryptoContext;
use crate::envelope::{self, ObjectKind};
use crate::error::KeyKind;
use crate::file_handler;
use crate::bfv::Bfv;
use crate::scheme::{KeyGenerator, Scheme, SchemeObject};
use crate::{Error, Result};

enum Phase<G> {
    Unkeyed,
    BaseKeyed(G),
}

/// Key material bound to one [`CryptoContext`].
///
/// A key pair starts empty. [`generate`](Self::generate) samples a secret key and
/// derives its public key; only then can relinearization and Galois keys be derived.
/// Any key kind can also be loaded individually from bytes or from a file, in which
/// case derived keys must be loaded too: loading never makes new keys derivable.
///
/// ## Examples
///
/// ```
/// use hecrypt::{CryptoContext, KeyPair, SecurityLevel};
///
/// let ctx = CryptoContext::new(SecurityLevel::Low);
/// let mut keys = KeyPair::new(&ctx);
/// assert!(keys.generate_relin_keys().is_err());
///
/// keys.generate().unwrap();
/// keys.generate_relin_keys().unwrap();
/// assert!(keys.has_public_key() && keys.has_secret_key() && keys.has_relin_keys());
/// ```
pub struct KeyPair<'ctx, S: Scheme = Bfv> {
    ctx: &'ctx CryptoContext<S>,
    phase: Phase<S::KeyGenerator>,
    public_key: Option<S::PublicKey>,
    secret_key: Option<S::SecretKey>,
    relin_keys: Option<S::RelinKeys>,
    galois_keys: Option<S::GaloisKeys>,
}

impl<'ctx, S: Scheme> KeyPair<'ctx, S> {
    #[must_use]
    pub const fn new(ctx: &'ctx CryptoContext<S>) -> Self {
        Self {
            ctx,
            phase: Phase::Unkeyed,
            public_key: None,
            secret_key: None,
            relin_keys: None,
            galois_keys: None,
        }
    }

    #[must_use]
    pub const fn context(&self) -> &'ctx CryptoContext<S> {
        self.ctx
    }

    /// Samples a new secret key and derives its public key.
    ///
    /// Previously held keys are replaced. Relinearization and Galois keys belonged to
    /// the old secret key and are dropped.
    ///
    /// ## Errors
    ///
    /// Fails if the context is invalid or the scheme cannot generate keys.
    pub fn generate(&mut self) -> Result<()> {
        let scheme = self.ctx.scheme()?;
        let generator = scheme.key_generator()?;
        let public_key = generator.create_public_key()?;

        self.secret_key = Some(generator.secret_key());
        self.public_key = Some(public_key);
        self.relin_keys = None;
        self.galois_keys = None;
        self.phase = Phase::BaseKeyed(generator);
        debug!("generated public and secret keys");
        Ok(())
    }

    /// Derives relinearization keys from the generated secret key.
    ///
    /// ## Errors
    ///
    /// Fails with [`Error::GenerateNotCalled`] before [`generate`](Self::generate), or
    /// with [`Error::Scheme`] if the parameters do not support relinearization.
    pub fn generate_relin_keys(&mut self) -> Result<()> {
        let relin_keys = self.generator()?.create_relin_keys()?;
        self.relin_keys = Some(relin_keys);
        debug!("generated relinearization keys");
        Ok(())
    }

    /// Derives Galois (rotation) keys from the generated secret key.
    ///
    /// ## Errors
    ///
    /// Same as [`generate_relin_keys`](Self::generate_relin_keys).
    pub fn generate_galois_keys(&mut self) -> Result<()> {
        let galois_keys = self.generator()?.create_galois_keys()?;
        self.galois_keys = Some(galois_keys);
        debug!("generated Galois keys");
        Ok(())
    }

    /// Generates every key kind.
    pub fn generate_all(&mut self) -> Result<()> {
        self.generate()?;
        self.generate_relin_keys()?;
        self.generate_galois_keys()
    }

    fn generator(&self) -> Result<&S::KeyGenerator> {
        match &self.phase {
            Phase::BaseKeyed(generator) => Ok(generator),
            Phase::Unkeyed => {
                warn!("derived keys requested before base key generation");
                Err(Error::GenerateNotCalled)
            }
        }
    }

    #[must_use]
    /// Whether derived keys can be generated.
    pub const fn is_base_keyed(&self) -> bool {
        matches!(self.phase, Phase::BaseKeyed(_))
    }

    #[must_use]
    pub const fn has_public_key(&self) -> bool {
        self.public_key.is_some()
    }

    #[must_use]
    pub const fn has_secret_key(&self) -> bool {
        self.secret_key.is_some()
    }

    #[must_use]
    pub const fn has_relin_keys(&self) -> bool {
        self.relin_keys.is_some()
    }

    #[must_use]
    pub const fn has_galois_keys(&self) -> bool {
        self.galois_keys.is_some()
    }

    #[must_use]
    pub const fn has(&self, kind: KeyKind) -> bool {
        match kind {
            KeyKind::Public => self.has_public_key(),
            KeyKind::Secret => self.has_secret_key(),
            KeyKind::Relin => self.has_relin_keys(),
            KeyKind::Galois => self.has_galois_keys(),
        }
    }

    /// ## Errors
    ///
    /// Fails with [`Error::MissingKey`] if no public key is held.
    pub fn public_key(&self) -> Result<&S::PublicKey> {
        self.public_key
            .as_ref()
            .ok_or(Error::MissingKey(KeyKind::Public))
    }

    /// ## Errors
    ///
    /// Fails with [`Error::MissingKey`] if no secret key is held.
    pub fn secret_key(&self) -> Result<&S::SecretKey> {
        self.secret_key
            .as_ref()
            .ok_or(Error::MissingKey(KeyKind::Secret))
    }

    /// ## Errors
    ///
    /// Fails with [`Error::MissingKey`] if no relinearization keys are held.
    pub fn relin_keys(&self) -> Result<&S::RelinKeys> {
        self.relin_keys
            .as_ref()
            .ok_or(Error::MissingKey(KeyKind::Relin))
    }

    /// ## Errors
    ///
    /// Fails with [`Error::MissingKey`] if no Galois keys are held.
    pub fn galois_keys(&self) -> Result<&S::GaloisKeys> {
        self.galois_keys
            .as_ref()
            .ok_or(Error::MissingKey(KeyKind::Galois))
    }

    /// Serializes one key kind.
    ///
    /// The bytes carry the context's parameter fingerprint and are only accepted back
    /// by a context with the same parameters.
    ///
    /// ## Errors
    ///
    /// Fails if the context is invalid or the key is not held.
    pub fn serialize_key(&self, kind: KeyKind) -> Result<Vec<u8>> {
        self.ctx.ensure_valid()?;
        let fingerprint = self.ctx.fingerprint();
        let body = match kind {
            KeyKind::Public => self.public_key()?.to_bytes()?,
            KeyKind::Secret => self.secret_key()?.to_bytes()?,
            KeyKind::Relin => self.relin_keys()?.to_bytes()?,
            KeyKind::Galois => self.galois_keys()?.to_bytes()?,
        };
        envelope::seal(ObjectKind::Key(kind), fingerprint, &body)
    }

    /// Replaces one key kind with key material read from `bytes`.
    ///
    /// ## Errors
    ///
    /// Fails if the context is invalid, `bytes` is empty or malformed, or the key was
    /// serialized under other parameters ([`Error::ParameterMismatch`]).
    pub fn deserialize_key(&mut self, kind: KeyKind, bytes: &[u8]) -> Result<()> {
        self.ctx.ensure_valid()?;
        if bytes.is_empty() {
            return Err(Error::Serialization(format!("{kind} data is empty")));
        }
        let scheme = self.ctx.scheme()?;
        let body = envelope::open(bytes, ObjectKind::Key(kind), self.ctx.fingerprint())?;
        match kind {
            KeyKind::Public => self.public_key = Some(S::PublicKey::from_bytes(&body, scheme)?),
            KeyKind::Secret => self.secret_key = Some(S::SecretKey::from_bytes(&body, scheme)?),
            KeyKind::Relin => self.relin_keys = Some(S::RelinKeys::from_bytes(&body, scheme)?),
            KeyKind::Galois => self.galois_keys = Some(S::GaloisKeys::from_bytes(&body, scheme)?),
        }
        debug!("loaded {kind}");
        Ok(())
    }

    /// Writes one key kind to `path`.
    pub fn save_key(&self, kind: KeyKind, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.serialize_key(kind)?;
        file_handler::write_key_file(path, &bytes)
    }

    /// Reads one key kind from `path`.
    pub fn load_key(&mut self, kind: KeyKind, path: impl AsRef<Path>) -> Result<()> {
        self.ctx.ensure_valid()?;
        let bytes = file_handler::read_key_file(path)?;
        self.deserialize_key(kind, &bytes)
    }

    pub fn save_public_key(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_key(KeyKind::Public, path)
    }

    pub fn save_secret_key(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_key(KeyKind::Secret, path)
    }

    pub fn save_relin_keys(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_key(KeyKind::Relin, path)
    }

    pub fn save_galois_keys(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_key(KeyKind::Galois, path)
    }

    pub fn load_public_key(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.load_key(KeyKind::Public, path)
    }

    pub fn load_secret_key(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.load_key(KeyKind::Secret, path)
    }

    pub fn load_relin_keys(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.load_key(KeyKind::Relin, path)
    }

    pub fn load_galois_keys(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.load_key(KeyKind::Galois, path)
    }

    /// Writes the public and secret keys.
    ///
    /// Neither file is replaced unless both keys could be serialized and written.
    pub fn save(
        &self,
        public_path: impl AsRef<Path>,
        secret_path: impl AsRef<Path>,
    ) -> Result<()> {
        let public = self.serialize_key(KeyKind::Public)?;
        let secret = self.serialize_key(KeyKind::Secret)?;
        file_handler::write_key_files(&[
            (public_path.as_ref(), public.as_slice()),
            (secret_path.as_ref(), secret.as_slice()),
        ])
    }

    /// Reads the public and secret keys.
    pub fn load(
        &mut self,
        public_path: impl AsRef<Path>,
        secret_path: impl AsRef<Path>,
    ) -> Result<()> {
        self.load_public_key(public_path)?;
        self.load_secret_key(secret_path)
    }
}

impl<S: Scheme> core::fmt::Debug for KeyPair<'_, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("base_keyed", &self.is_base_keyed())
            .field("public_key", &self.has_public_key())
            .field("secret_key", &self.has_secret_key())
            .field("relin_keys", &self.has_relin_keys())
            .field("galois_keys", &self.has_galois_keys())
            .finish()
    }
}
