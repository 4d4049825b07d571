use std::collections::HashMap;
use std::sync::Arc;

use ashlar_model::{BlockPos, BlockState};
use thiserror::Error;

use crate::face::Face;
use crate::mesh::ChunkMesh;

/// Port/infrastructure failures. Carried as result values with stable
/// codes so callers can retry, fall back, or propagate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("texture atlas unavailable: {0}")]
    TextureUnavailable(String),
    #[error("render backend failure: {0}")]
    Backend(String),
}

impl PortError {
    pub fn code(&self) -> &'static str {
        match self {
            PortError::TextureUnavailable(_) => "TEXTURE_UNAVAILABLE",
            PortError::Backend(_) => "RENDER_BACKEND",
        }
    }
}

/// A GPU-side pick result: the struck block position and face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaycastHit {
    pub pos: BlockPos,
    pub face: Face,
}

/// Draw-side port implemented by the GPU shell (out of scope here).
/// `submit` is fire-and-forget; `raycast` resolves a screen point
/// against the renderer's acceleration structure.
pub trait RenderPort {
    fn raycast(&self, screen_x: f32, screen_y: f32) -> Option<RaycastHit>;
    fn submit(&mut self, meshes: &[Arc<ChunkMesh>]);
}

/// Per-face UV rectangle into the texture atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceUvs {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl FaceUvs {
    pub const FULL: FaceUvs = FaceUvs {
        min: [0.0, 0.0],
        max: [1.0, 1.0],
    };
}

/// Pure per-state UV lookup with a fallback entry for unknown block
/// types, so meshing never fails on an unmapped state.
#[derive(Clone, Debug)]
pub struct TextureAtlas {
    entries: HashMap<String, [FaceUvs; 6]>,
    fallback: [FaceUvs; 6],
}

impl TextureAtlas {
    pub fn new(entries: HashMap<String, [FaceUvs; 6]>, fallback: [FaceUvs; 6]) -> Self {
        Self { entries, fallback }
    }

    /// Atlas with only the fallback tile; every state maps to it.
    pub fn fallback_only() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: [FaceUvs::FULL; 6],
        }
    }

    pub fn face_uvs(&self, state: &BlockState, face: Face) -> FaceUvs {
        self.entries
            .get(state.name())
            .unwrap_or(&self.fallback)[face.index()]
    }
}

/// Texture-loading port implemented by the asset layer.
pub trait TexturePort {
    fn load_default_atlas(&self) -> Result<TextureAtlas, PortError>;
}

/// In-memory render port double: replays a scripted raycast answer and
/// counts submissions. Used by the viewer binary and tests.
#[derive(Default)]
pub struct NullRenderPort {
    pub scripted_hit: Option<RaycastHit>,
    pub submitted_meshes: usize,
}

impl RenderPort for NullRenderPort {
    fn raycast(&self, _screen_x: f32, _screen_y: f32) -> Option<RaycastHit> {
        self.scripted_hit
    }

    fn submit(&mut self, meshes: &[Arc<ChunkMesh>]) {
        self.submitted_meshes += meshes.len();
    }
}

/// Texture port double serving the fallback-only atlas.
#[derive(Default)]
pub struct FlatTexturePort;

impl TexturePort for FlatTexturePort {
    fn load_default_atlas(&self) -> Result<TextureAtlas, PortError> {
        Ok(TextureAtlas::fallback_only())
    }
}
