//! Body security primitives shared by the agent transport chain and the
//! server middleware.

pub mod compression;
pub mod crypto;
pub mod signature;

pub use crypto::{Decrypter, Encrypter};
pub use signature::{Signer, SIGNATURE_HEADER};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("compression error: {0}")]
    Compression(String),
    #[error("integrity check failed: {0}")]
    Integrity(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("key error: {0}")]
    Key(String),
}
