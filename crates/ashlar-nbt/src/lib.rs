//! Binary structure-format decoder: NBT-style tag trees plus the palette
//! mapping into [`ashlar_model::Structure`].
//!
//! Parsing and mapping are separate steps: `parse` produces a
//! [`ParsedNbt`] tree independent of the target model, and
//! [`decode_structure`] resolves the palette and block list against it.
#![forbid(unsafe_code)]

pub mod decode;
pub mod tag;

pub use decode::{decode_structure, detect_format};
pub use tag::{ParsedNbt, Tag, parse};

use ashlar_model::ModelError;
use thiserror::Error;

/// Decode failures carry a stable code so callers can distinguish a
/// corrupt file from a missing one. Malformed input is always reported
/// as a value, never a panic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("not a recognized structure payload")]
    InvalidFormat,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(i32),
    #[error("palette index {index} out of range (palette has {palette_len} entries)")]
    PaletteIndexOutOfRange { index: i32, palette_len: usize },
    #[error("input ended mid-value")]
    Truncated,
    #[error("invalid block data: {0}")]
    Model(#[from] ModelError),
}

impl DecodeError {
    /// Stable error code for logs and port boundaries.
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::InvalidFormat | DecodeError::Model(_) => "INVALID_FORMAT",
            DecodeError::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            DecodeError::PaletteIndexOutOfRange { .. } => "PALETTE_INDEX_OUT_OF_RANGE",
            DecodeError::Truncated => "TRUNCATED_DATA",
        }
    }
}
