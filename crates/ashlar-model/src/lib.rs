//! Block model and structure aggregate crate.
#![forbid(unsafe_code)]

pub mod pos;
pub mod state;
pub mod structure;

pub use pos::{CHUNK_SIZE, ChunkCoord, BlockPos};
pub use state::{Block, BlockState};
pub use structure::{SourceFormat, Structure, StructureId};

use thiserror::Error;

/// Validation errors raised at value/entity construction boundaries.
/// A model value never exists in an invalid state; these surface
/// immediately to the caller instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("position {0:?} outside the packable coordinate range")]
    PositionOutOfRange(BlockPos),
    #[error("duplicate block position {0:?}")]
    DuplicatePosition(BlockPos),
    #[error("block count {count} exceeds maximum {max}")]
    TooManyBlocks { count: usize, max: usize },
    #[error("block state type name is empty")]
    EmptyTypeName,
    #[error("block state property key is empty")]
    EmptyPropertyKey,
    #[error("block state property {0:?} has an empty value")]
    EmptyPropertyValue(String),
    #[error("malformed block state string: {0:?}")]
    MalformedState(String),
}
