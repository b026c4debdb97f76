//! Homomorphic integer arithmetic and chunked file encryption.
//!
//! # Usage
//!
//! Everything starts from a [`CryptoContext`], which holds the encryption parameters
//! and the evaluator derived from them. Contexts are immutable and shared by reference.
//!
//! A [`KeyPair`] holds the key material of one context: a public key to encrypt, a
//! secret key to decrypt, and optionally relinearization and Galois keys for deeper
//! computations. Keys can be saved to and loaded from files; serialized keys are
//! stamped with a fingerprint of the parameters and refused by other contexts.
//!
//! [`HomomorphicInt`] is an encrypted signed integer supporting `+`, `-`, `*`, unary
//! `-`, operations with plaintext constants, squaring and exponentiation.
//! Operations never panic: failures produce an invalid value which records why.
//!
//! [`Encryptor`] and [`Decryptor`] encrypt whole byte buffers or files, one
//! independently encrypted chunk at a time.
//!
//! The lattice scheme itself sits behind the [`Scheme`] trait. Contexts default to
//! [`Bfv`], the BFV scheme of the [`fhe`] crate. [`SimulatedBfv`] is a fast
//! noise-accounting model of BFV for tests and benchmarks. It **does not hide the
//! data** and must not protect anything real.
//!
//! # Examples
//!
//! ## Arithmetic
//!
//! ```
//! use hecrypt::{CryptoContext, HomomorphicInt, KeyPair, SecurityLevel};
//!
//! let ctx = CryptoContext::new(SecurityLevel::Low);
//! let mut keys = KeyPair::new(&ctx);
//! keys.generate().unwrap();
//! keys.generate_relin_keys().unwrap();
//!
//! // 2x^2 + 3x + 5 at x = 4
//! let x = HomomorphicInt::encrypt(4, &keys);
//! let y = (x.square().mul_plain(2) + x.mul_plain(3)).add_plain(5);
//! assert_eq!(y.decrypt(&keys).unwrap(), 49);
//!
//! // Multiplications grow the ciphertext and consume noise budget
//! let p = &x * &x;
//! assert_eq!(p.size(), 3);
//! assert!(p.noise_budget(&keys) < x.noise_budget(&keys));
//! assert_eq!(p.relinearize(&keys).size(), 2);
//! ```
//!
//! ## Invalid values
//!
//! ```
//! use hecrypt::{CryptoContext, Error, HomomorphicInt, KeyKind, KeyPair, SecurityLevel};
//!
//! let ctx = CryptoContext::new(SecurityLevel::Low);
//! let mut keys = KeyPair::new(&ctx);
//! keys.generate().unwrap();
//!
//! let x = HomomorphicInt::encrypt(3, &keys);
//! // No relinearization keys were generated
//! let cube = x.power(3, &keys);
//! assert!(!cube.is_valid());
//! assert_eq!(cube.decrypt(&keys), Err(Error::MissingKey(KeyKind::Relin)));
//! ```
//!
//! ## Files
//!
//! ```no_run
//! use hecrypt::{CryptoContext, Decryptor, Encryptor, KeyPair, SecurityLevel};
//!
//! let ctx = CryptoContext::new(SecurityLevel::Medium);
//! let mut keys = KeyPair::new(&ctx);
//! keys.generate().unwrap();
//! keys.save("public.key", "secret.key").unwrap();
//!
//! Encryptor::new(&ctx).encrypt_file("report.pdf", "report.pdf.enc", &keys).unwrap();
//! Decryptor::new(&ctx).decrypt_file("report.pdf.enc", "report.copy.pdf", &keys).unwrap();
//! ```

pub mod bfv;
pub mod codec;
mod context;
mod envelope;
mod error;
pub mod file_handler;
mod homomorphic;
mod keys;
mod polynomial;
pub mod prelude;
pub mod scheme;
pub mod simulated;

pub use bfv::Bfv;
pub use codec::{ChunkCapacity, ChunkHeader, CodecConfig, Decryptor, Encryptor};
pub use context::{CryptoContext, SecurityLevel, DEFAULT_PLAIN_MODULUS};
pub use error::{Error, KeyKind, ParametersError, Result};
pub use homomorphic::HomomorphicInt;
pub use keys::KeyPair;
pub use scheme::{Evaluator, KeyGenerator, Parameters, Scheme, SchemeCiphertext, SchemeObject};
pub use simulated::SimulatedBfv;
