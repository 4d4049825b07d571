use ashlar_model::pos::{MAX_COORD, MIN_COORD};
use ashlar_model::{BlockPos, CHUNK_SIZE, ChunkCoord};
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = i32> {
    MIN_COORD..=MAX_COORD
}

proptest! {
    // decode(key(p)) == p over the packable range
    #[test]
    fn block_pos_key_round_trips(x in coord(), y in coord(), z in coord()) {
        let p = BlockPos::new(x, y, z);
        prop_assert_eq!(BlockPos::from_key(p.key()), p);
    }

    #[test]
    fn chunk_coord_key_round_trips(x in coord(), y in coord(), z in coord()) {
        let c = ChunkCoord::new(x, y, z);
        prop_assert_eq!(ChunkCoord::from_key(c.key()), c);
    }

    // distinct positions never collide on key
    #[test]
    fn keys_are_collision_free(a in (coord(), coord(), coord()), b in (coord(), coord(), coord())) {
        let pa = BlockPos::new(a.0, a.1, a.2);
        let pb = BlockPos::new(b.0, b.1, b.2);
        prop_assert_eq!(pa == pb, pa.key() == pb.key());
    }

    // every position falls inside the half-open block range its chunk owns
    #[test]
    fn chunk_owns_its_positions(x in coord(), y in coord(), z in coord()) {
        let p = BlockPos::new(x, y, z);
        let c = ChunkCoord::from_pos(p);
        for (axis, base) in [(p.x, c.cx), (p.y, c.cy), (p.z, c.cz)] {
            prop_assert!(base * CHUNK_SIZE <= axis);
            prop_assert!(axis < (base + 1) * CHUNK_SIZE);
        }
        prop_assert!(c.contains(p));
    }

    #[test]
    fn manhattan_is_symmetric_and_nonnegative(a in (coord(), coord(), coord()), b in (coord(), coord(), coord())) {
        let pa = BlockPos::new(a.0, a.1, a.2);
        let pb = BlockPos::new(b.0, b.1, b.2);
        prop_assert_eq!(pa.manhattan(pb), pb.manhattan(pa));
        prop_assert!(pa.manhattan(pb) >= 0);
    }
}
