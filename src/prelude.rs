//! Usage: `use hecrypt::prelude::*;`

pub use crate::scheme::{Evaluator, KeyGenerator, Scheme, SchemeCiphertext};
pub use crate::{
    Bfv, CryptoContext, Decryptor, Encryptor, Error, HomomorphicInt, KeyKind, KeyPair, Parameters,
    SecurityLevel, SimulatedBfv,
};
