//! Error taxonomy shared by the codec, document model, and save pipeline.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading, editing, or writing a save container.
#[derive(Debug, Error)]
pub enum Error {
    /// PKCS7 unpadding failed, or the container is too short to hold an IV
    /// and one cipher block. The format carries no integrity tag, so this is
    /// the only built-in corruption detector.
    #[error("container could not be decrypted (wrong password or corrupted ciphertext)")]
    Decryption,

    /// The decrypted payload is not valid UTF-8 JSON shaped like a save.
    #[error("decrypted payload is not a valid save document: {0}")]
    Encoding(#[from] serde_json::Error),

    /// An operation needs a top-level entry the save does not have.
    #[error("save is missing the `{key}` entry")]
    Schema { key: &'static str },

    /// The save already holds the maximum number of players.
    #[error("save already holds the maximum of {max} players")]
    Capacity { max: usize },

    /// The player id is already present in the save.
    #[error("player `{id}` already exists in this save")]
    DuplicatePlayer { id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
