//! Crate-wide error taxonomy.
//!
//! One variant per abstract error kind named by the protocol design; every
//! fallible public operation in this crate returns `Result<_, CoreError>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("short buffer: need at least {need} bytes, got {got}")]
    ShortBuffer { need: usize, got: usize },

    #[error("bad header checksum")]
    BadHeaderChecksum,

    #[error("AEAD authentication failure")]
    AuthenticationFailure,

    #[error("plaintext checksum mismatch")]
    ChecksumMismatch,

    #[error("size mismatch: {0}")]
    SizeMismatch(&'static str),

    #[error("rolling hash used before init")]
    NotInitialized,

    #[error("FEC verification failed after reconstruction")]
    VerificationFailed,

    #[error("pipeline received a nil stage")]
    NilStage,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("fec codec error: {0}")]
    Fec(String),
}
