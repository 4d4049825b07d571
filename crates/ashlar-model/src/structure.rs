use std::fmt;

use hashbrown::HashMap;

use crate::{BlockPos, ChunkCoord, ModelError, state::Block};

pub type StructureId = u32;

/// Default ceiling on blocks per structure; construction rejects larger
/// inputs outright.
pub const DEFAULT_MAX_BLOCKS: usize = 1 << 22;

/// Which binary sub-format a structure was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Schematic,
    Structure,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Schematic => write!(f, "schematic"),
            SourceFormat::Structure => write!(f, "structure"),
        }
    }
}

/// Immutable collection of blocks with derived bounds and lookup by
/// position. Construction validates everything up front, so an instance
/// can never exist in an invalid state. "Mutation" is expressed as pure
/// functions returning a new instance with a bumped revision; block
/// states are shared via `Arc`, so copies stay cheap.
#[derive(Clone, Debug)]
pub struct Structure {
    id: StructureId,
    rev: u64,
    name: String,
    source: SourceFormat,
    blocks: HashMap<u64, Block>,
    bounds: Option<(BlockPos, BlockPos)>,
    max_blocks: usize,
}

impl Structure {
    pub fn new(
        id: StructureId,
        name: impl Into<String>,
        source: SourceFormat,
        blocks: Vec<Block>,
    ) -> Result<Self, ModelError> {
        Self::with_max_blocks(id, name, source, blocks, DEFAULT_MAX_BLOCKS)
    }

    pub fn with_max_blocks(
        id: StructureId,
        name: impl Into<String>,
        source: SourceFormat,
        blocks: Vec<Block>,
        max_blocks: usize,
    ) -> Result<Self, ModelError> {
        if blocks.len() > max_blocks {
            return Err(ModelError::TooManyBlocks {
                count: blocks.len(),
                max: max_blocks,
            });
        }
        let mut map: HashMap<u64, Block> = HashMap::with_capacity(blocks.len());
        for b in blocks {
            let key = b.pos.try_key()?;
            if map.insert(key, b.clone()).is_some() {
                return Err(ModelError::DuplicatePosition(b.pos));
            }
        }
        let bounds = compute_bounds(map.values().map(|b| b.pos));
        Ok(Self {
            id,
            rev: 1,
            name: name.into(),
            source,
            blocks: map,
            bounds,
            max_blocks,
        })
    }

    #[inline]
    pub fn id(&self) -> StructureId {
        self.id
    }

    /// Monotonic revision stamp; bumped by every mutating operation.
    #[inline]
    pub fn rev(&self) -> u64 {
        self.rev
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn source(&self) -> SourceFormat {
        self.source
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Tight bounding box of contained positions; `None` when empty.
    #[inline]
    pub fn bounds(&self) -> Option<(BlockPos, BlockPos)> {
        self.bounds
    }

    #[inline]
    pub fn block_at(&self, pos: BlockPos) -> Option<&Block> {
        if !pos.in_key_range() {
            return None;
        }
        self.blocks.get(&pos.key())
    }

    #[inline]
    pub fn contains(&self, pos: BlockPos) -> bool {
        self.block_at(pos).is_some()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Set of chunk coordinates occupied by at least one block, in a
    /// stable order.
    pub fn chunks(&self) -> Vec<ChunkCoord> {
        let mut out: Vec<ChunkCoord> = Vec::new();
        let mut seen: hashbrown::HashSet<u64> = hashbrown::HashSet::new();
        for b in self.blocks.values() {
            let c = b.pos.chunk();
            if seen.insert(c.key()) {
                out.push(c);
            }
        }
        out.sort_by_key(|c| (c.cx, c.cy, c.cz));
        out
    }

    /// Blocks whose positions fall inside the given chunk.
    pub fn blocks_in_chunk(&self, coord: ChunkCoord) -> Vec<&Block> {
        self.blocks
            .values()
            .filter(|b| b.pos.chunk() == coord)
            .collect()
    }

    /// Returns a copy with the block at `pos` removed. A miss returns an
    /// unchanged copy (same revision) so callers can skip invalidation.
    pub fn without_block(&self, pos: BlockPos) -> Structure {
        let mut next = self.clone();
        if pos.in_key_range() && next.blocks.remove(&pos.key()).is_some() {
            next.bounds = compute_bounds(next.blocks.values().map(|b| b.pos));
            next.bump_rev();
        }
        next
    }

    /// Returns a copy with `block` inserted, replacing any block already
    /// at that position. Growth is bounded by the cap the structure was
    /// built with.
    pub fn with_block(&self, block: Block) -> Result<Structure, ModelError> {
        let key = block.pos.try_key()?;
        let mut next = self.clone();
        let replaced = next.blocks.insert(key, block.clone()).is_some();
        if !replaced && next.blocks.len() > self.max_blocks {
            return Err(ModelError::TooManyBlocks {
                count: next.blocks.len(),
                max: self.max_blocks,
            });
        }
        if let Some((min, max)) = next.bounds {
            next.bounds = Some(extend_bounds(min, max, block.pos));
        } else {
            next.bounds = Some((block.pos, block.pos));
        }
        next.bump_rev();
        Ok(next)
    }

    fn bump_rev(&mut self) {
        self.rev = self.rev.wrapping_add(1).max(1);
    }
}

fn compute_bounds(positions: impl Iterator<Item = BlockPos>) -> Option<(BlockPos, BlockPos)> {
    let mut out: Option<(BlockPos, BlockPos)> = None;
    for p in positions {
        out = Some(match out {
            None => (p, p),
            Some((min, max)) => extend_bounds(min, max, p),
        });
    }
    out
}

#[inline]
fn extend_bounds(min: BlockPos, max: BlockPos, p: BlockPos) -> (BlockPos, BlockPos) {
    (
        BlockPos::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
        BlockPos::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BlockState;
    use std::sync::Arc;

    fn stone() -> Arc<BlockState> {
        Arc::new(BlockState::simple("minecraft:stone").unwrap())
    }

    fn structure_of(positions: &[(i32, i32, i32)]) -> Structure {
        let state = stone();
        let blocks = positions
            .iter()
            .map(|&(x, y, z)| Block::new(BlockPos::new(x, y, z), state.clone()))
            .collect();
        Structure::new(1, "test", SourceFormat::Schematic, blocks).unwrap()
    }

    #[test]
    fn duplicate_positions_fail_construction() {
        let state = stone();
        let blocks = vec![
            Block::new(BlockPos::new(0, 0, 0), state.clone()),
            Block::new(BlockPos::new(0, 0, 0), state),
        ];
        let err = Structure::new(1, "dup", SourceFormat::Schematic, blocks).unwrap_err();
        assert_eq!(err, ModelError::DuplicatePosition(BlockPos::new(0, 0, 0)));
    }

    #[test]
    fn block_limit_is_enforced() {
        let state = stone();
        let blocks = (0..4)
            .map(|x| Block::new(BlockPos::new(x, 0, 0), state.clone()))
            .collect();
        let err =
            Structure::with_max_blocks(1, "big", SourceFormat::Schematic, blocks, 3).unwrap_err();
        assert_eq!(err, ModelError::TooManyBlocks { count: 4, max: 3 });
    }

    #[test]
    fn with_block_honors_the_configured_cap() {
        let state = stone();
        let blocks = (0..2)
            .map(|x| Block::new(BlockPos::new(x, 0, 0), state.clone()))
            .collect();
        let s = Structure::with_max_blocks(1, "capped", SourceFormat::Schematic, blocks, 2).unwrap();
        // Replacing an existing block stays within the cap.
        let t = s
            .with_block(Block::new(BlockPos::new(0, 0, 0), state.clone()))
            .unwrap();
        assert_eq!(t.block_count(), 2);
        let err = t
            .with_block(Block::new(BlockPos::new(5, 0, 0), state))
            .unwrap_err();
        assert_eq!(err, ModelError::TooManyBlocks { count: 3, max: 2 });
    }

    #[test]
    fn bounds_are_tight() {
        let s = structure_of(&[(-3, 2, 7), (5, -1, 0)]);
        assert_eq!(
            s.bounds(),
            Some((BlockPos::new(-3, -1, 0), BlockPos::new(5, 2, 7)))
        );
        assert_eq!(s.block_count(), 2);
    }

    #[test]
    fn a_row_spanning_two_chunks_partitions_into_two() {
        let positions: Vec<(i32, i32, i32)> = (0..32).map(|x| (x, 0, 0)).collect();
        let s = structure_of(&positions);
        assert_eq!(
            s.chunks(),
            vec![ChunkCoord::new(0, 0, 0), ChunkCoord::new(1, 0, 0)]
        );
        assert_eq!(s.blocks_in_chunk(ChunkCoord::new(0, 0, 0)).len(), 16);
        assert_eq!(s.blocks_in_chunk(ChunkCoord::new(1, 0, 0)).len(), 16);
    }

    #[test]
    fn without_block_is_pure_and_bumps_rev() {
        let s = structure_of(&[(0, 0, 0), (9, 0, 0)]);
        let rev = s.rev();
        let t = s.without_block(BlockPos::new(9, 0, 0));
        assert_eq!(s.block_count(), 2, "original untouched");
        assert_eq!(t.block_count(), 1);
        assert_eq!(t.bounds(), Some((BlockPos::new(0, 0, 0), BlockPos::new(0, 0, 0))));
        assert!(t.rev() > rev);
        // Removing a missing block changes nothing, including the rev.
        let u = t.without_block(BlockPos::new(9, 0, 0));
        assert_eq!(u.rev(), t.rev());
    }

    #[test]
    fn with_block_replaces_in_place() {
        let s = structure_of(&[(0, 0, 0)]);
        let glass = Arc::new(BlockState::simple("minecraft:glass").unwrap());
        let t = s
            .with_block(Block::new(BlockPos::new(0, 0, 0), glass.clone()))
            .unwrap();
        assert_eq!(t.block_count(), 1);
        assert_eq!(t.block_at(BlockPos::new(0, 0, 0)).unwrap().state, glass);
    }
}
