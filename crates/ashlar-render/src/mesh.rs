use std::sync::Arc;

use ashlar_model::{BlockState, CHUNK_SIZE, ChunkCoord, Structure, StructureId};

use crate::face::Face;
use crate::lod::LodLevel;
use crate::port::TextureAtlas;

/// Cache key for one built chunk mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshKey {
    pub structure: StructureId,
    pub chunk: ChunkCoord,
    pub lod: LodLevel,
}

/// CPU-side chunk geometry. Never mutated after creation; a structure or
/// LOD change produces a new mesh under a new key.
#[derive(Clone, Debug, Default)]
pub struct ChunkMesh {
    pub key: Option<MeshKey>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    #[inline]
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    fn push_quad(&mut self, face: Face, origin: [f32; 3], size: f32, uv: crate::port::FaceUvs) {
        let base = self.positions.len() as u32;
        for corner in face_corners(face, origin, size) {
            self.positions.push(corner);
            let n = face.normal();
            self.normals.push([n.x, n.y, n.z]);
        }
        self.uvs.extend_from_slice(&[
            [uv.min[0], uv.min[1]],
            [uv.max[0], uv.min[1]],
            [uv.max[0], uv.max[1]],
            [uv.min[0], uv.max[1]],
        ]);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Builds the mesh for one chunk at one detail tier. Blocks are merged
/// into cells of `lod.cell_size()` blocks per edge (a cell is emitted
/// when any source block occupies it); faces hidden by an occupied
/// neighboring cell in the same chunk are culled.
pub fn build_chunk_mesh(
    structure: &Structure,
    coord: ChunkCoord,
    lod: LodLevel,
    atlas: &TextureAtlas,
) -> ChunkMesh {
    let cell = lod.cell_size();
    let n = (CHUNK_SIZE / cell) as usize;
    let idx = |x: usize, y: usize, z: usize| (y * n + z) * n + x;

    // Representative state per cell: the block with the smallest packed
    // key wins so the result is independent of map iteration order.
    let mut cells: Vec<Option<(u64, Arc<BlockState>)>> = vec![None; n * n * n];
    let base = coord.base();
    for block in structure.blocks_in_chunk(coord) {
        let lx = ((block.pos.x - base.x) / cell) as usize;
        let ly = ((block.pos.y - base.y) / cell) as usize;
        let lz = ((block.pos.z - base.z) / cell) as usize;
        let slot = &mut cells[idx(lx, ly, lz)];
        let key = block.pos.key();
        match slot {
            Some((existing, _)) if *existing <= key => {}
            _ => *slot = Some((key, Arc::clone(&block.state))),
        }
    }

    let occupied = |x: i32, y: i32, z: i32| -> bool {
        if x < 0 || y < 0 || z < 0 {
            return false;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        if x >= n || y >= n || z >= n {
            return false;
        }
        cells[idx(x, y, z)].is_some()
    };

    let mut mesh = ChunkMesh {
        key: Some(MeshKey {
            structure: structure.id(),
            chunk: coord,
            lod,
        }),
        ..ChunkMesh::default()
    };

    for y in 0..n {
        for z in 0..n {
            for x in 0..n {
                let Some((_, state)) = &cells[idx(x, y, z)] else {
                    continue;
                };
                let origin = [
                    (base.x + x as i32 * cell) as f32,
                    (base.y + y as i32 * cell) as f32,
                    (base.z + z as i32 * cell) as f32,
                ];
                for face in Face::ALL {
                    let (dx, dy, dz) = face.delta();
                    if occupied(x as i32 + dx, y as i32 + dy, z as i32 + dz) {
                        continue;
                    }
                    let uv = atlas.face_uvs(state, face);
                    mesh.push_quad(face, origin, cell as f32, uv);
                }
            }
        }
    }
    mesh
}

fn face_corners(face: Face, o: [f32; 3], s: f32) -> [[f32; 3]; 4] {
    let [x, y, z] = o;
    match face {
        Face::PosY => [
            [x, y + s, z],
            [x, y + s, z + s],
            [x + s, y + s, z + s],
            [x + s, y + s, z],
        ],
        Face::NegY => [
            [x, y, z],
            [x + s, y, z],
            [x + s, y, z + s],
            [x, y, z + s],
        ],
        Face::PosX => [
            [x + s, y, z],
            [x + s, y + s, z],
            [x + s, y + s, z + s],
            [x + s, y, z + s],
        ],
        Face::NegX => [
            [x, y, z],
            [x, y, z + s],
            [x, y + s, z + s],
            [x, y + s, z],
        ],
        Face::PosZ => [
            [x, y, z + s],
            [x + s, y, z + s],
            [x + s, y + s, z + s],
            [x, y + s, z + s],
        ],
        Face::NegZ => [
            [x, y, z],
            [x, y + s, z],
            [x + s, y + s, z],
            [x + s, y, z],
        ],
    }
}
