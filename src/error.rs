use thiserror::Error;

/// Everything that can go wrong while taking an ncm container apart.
///
/// All variants except [`UnknownCoverFormat`](DecodeError::UnknownCoverFormat)
/// are fatal for the file being decoded. None of them should abort a batch:
/// the driver reports the error and moves on to the next file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("magic header does not match \"CTENFDAM\", not an ncm container")]
    BadMagicHeader,
    #[error("truncated input: needed {needed} bytes but only {remaining} remain")]
    TruncatedInput { needed: usize, remaining: usize },
    #[error("ciphertext length {0} is not a nonzero multiple of the aes block size")]
    InvalidCiphertextLength(usize),
    #[error("corrupted encrypted blob: pad length {0} out of range")]
    InvalidPadding(usize),
    #[error("malformed metadata: {0}")]
    MetadataParse(String),
    #[error("cover image magic bytes are neither jpeg nor png")]
    UnknownCoverFormat,
}
