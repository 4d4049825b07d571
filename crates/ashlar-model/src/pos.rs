use crate::ModelError;

/// Edge length of a cubic chunk, in blocks. Power of two.
pub const CHUNK_SIZE: i32 = 16;

// Packed keys give each axis 21 bits (offset-biased), so the packable
// coordinate range per axis is [-2^20, 2^20).
const KEY_BITS: u32 = 21;
const KEY_BIAS: i64 = 1 << 20;
const KEY_MASK: u64 = (1 << KEY_BITS) - 1;

pub const MIN_COORD: i32 = -(1 << 20);
pub const MAX_COORD: i32 = (1 << 20) - 1;

#[inline]
fn pack3(x: i32, y: i32, z: i32) -> u64 {
    let xb = (i64::from(x) + KEY_BIAS) as u64 & KEY_MASK;
    let yb = (i64::from(y) + KEY_BIAS) as u64 & KEY_MASK;
    let zb = (i64::from(z) + KEY_BIAS) as u64 & KEY_MASK;
    (xb << (2 * KEY_BITS)) | (yb << KEY_BITS) | zb
}

#[inline]
fn unpack3(key: u64) -> (i32, i32, i32) {
    let x = ((key >> (2 * KEY_BITS)) & KEY_MASK) as i64 - KEY_BIAS;
    let y = ((key >> KEY_BITS) & KEY_MASK) as i64 - KEY_BIAS;
    let z = (key & KEY_MASK) as i64 - KEY_BIAS;
    (x as i32, y as i32, z as i32)
}

/// Integer block position in structure space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn in_key_range(self) -> bool {
        let ok = |v: i32| (MIN_COORD..=MAX_COORD).contains(&v);
        ok(self.x) && ok(self.y) && ok(self.z)
    }

    /// Collision-free packed map key. Valid for positions within the
    /// packable range; `Structure` construction enforces the range.
    #[inline]
    pub fn key(self) -> u64 {
        pack3(self.x, self.y, self.z)
    }

    /// Range-checked variant of [`BlockPos::key`].
    pub fn try_key(self) -> Result<u64, ModelError> {
        if self.in_key_range() {
            Ok(self.key())
        } else {
            Err(ModelError::PositionOutOfRange(self))
        }
    }

    /// Inverse of [`BlockPos::key`]: `BlockPos::from_key(p.key()) == p`.
    #[inline]
    pub fn from_key(key: u64) -> Self {
        let (x, y, z) = unpack3(key);
        Self { x, y, z }
    }

    /// Euclidean distance, used for LOD selection.
    #[inline]
    pub fn distance(self, other: BlockPos) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Manhattan distance, used for cheap adjacency checks.
    #[inline]
    pub fn manhattan(self, other: BlockPos) -> i64 {
        i64::from((self.x - other.x).abs())
            + i64::from((self.y - other.y).abs())
            + i64::from((self.z - other.z).abs())
    }

    #[inline]
    pub fn chunk(self) -> ChunkCoord {
        ChunkCoord::from_pos(self)
    }
}

impl From<(i32, i32, i32)> for BlockPos {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

/// Coordinate of a cubic chunk of side [`CHUNK_SIZE`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    /// Floor division per axis, so negative coordinates partition
    /// correctly (block -1 belongs to chunk -1, not 0).
    #[inline]
    pub fn from_pos(p: BlockPos) -> Self {
        Self {
            cx: p.x.div_euclid(CHUNK_SIZE),
            cy: p.y.div_euclid(CHUNK_SIZE),
            cz: p.z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Minimum corner of the chunk in block coordinates.
    #[inline]
    pub fn base(self) -> BlockPos {
        BlockPos::new(
            self.cx * CHUNK_SIZE,
            self.cy * CHUNK_SIZE,
            self.cz * CHUNK_SIZE,
        )
    }

    #[inline]
    pub fn contains(self, p: BlockPos) -> bool {
        ChunkCoord::from_pos(p) == self
    }

    /// Packed map key, same scheme as [`BlockPos::key`].
    #[inline]
    pub fn key(self) -> u64 {
        pack3(self.cx, self.cy, self.cz)
    }

    #[inline]
    pub fn from_key(key: u64) -> Self {
        let (cx, cy, cz) = unpack3(key);
        Self { cx, cy, cz }
    }
}

impl From<(i32, i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_positions_floor_into_negative_chunks() {
        assert_eq!(
            ChunkCoord::from_pos(BlockPos::new(-1, -1, -1)),
            ChunkCoord::new(-1, -1, -1)
        );
        assert_eq!(
            ChunkCoord::from_pos(BlockPos::new(-16, 0, 15)),
            ChunkCoord::new(-1, 0, 0)
        );
        assert_eq!(
            ChunkCoord::from_pos(BlockPos::new(-17, 31, 16)),
            ChunkCoord::new(-2, 1, 1)
        );
    }

    #[test]
    fn key_round_trips_at_range_edges() {
        for &v in &[MIN_COORD, -1, 0, 1, MAX_COORD] {
            let p = BlockPos::new(v, -v.max(MIN_COORD + 1), v / 2);
            assert!(p.in_key_range());
            assert_eq!(BlockPos::from_key(p.key()), p);
        }
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let p = BlockPos::new(MAX_COORD + 1, 0, 0);
        assert!(p.try_key().is_err());
    }

    #[test]
    fn manhattan_counts_axis_steps() {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(1, -2, 3);
        assert_eq!(a.manhattan(b), 6);
        assert_eq!(b.manhattan(a), 6);
    }
}
