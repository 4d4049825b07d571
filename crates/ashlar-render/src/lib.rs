//! Rendering policy crate: LOD selection, camera state, chunk mesh
//! generation, and the ports the GPU shell implements.
#![forbid(unsafe_code)]

pub mod camera;
pub mod face;
pub mod lod;
pub mod mesh;
pub mod port;
pub mod select;

pub use camera::{Camera, CameraAction, MIN_ZOOM, RenderState, Selection};
pub use face::Face;
pub use lod::{LodLevel, RenderQuality, chunk_center, lod_for_distance, visible_chunks};
pub use mesh::{ChunkMesh, MeshKey, build_chunk_mesh};
pub use port::{
    FaceUvs, FlatTexturePort, NullRenderPort, PortError, RaycastHit, RenderPort, TextureAtlas,
    TexturePort,
};
pub use select::{pick, resolve_selection};

use thiserror::Error;

/// Errors from loading quality preset configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("quality preset parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("quality '{0}': lod thresholds must be strictly increasing")]
    ThresholdOrder(String),
    #[error("quality '{0}': view distance must be positive")]
    ViewDistance(String),
    #[error("unknown quality preset '{0}'")]
    UnknownQuality(String),
}
