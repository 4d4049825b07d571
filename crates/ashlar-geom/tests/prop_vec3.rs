use ashlar_geom::{Aabb, Vec3};
use proptest::prelude::*;

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn bounded_f32() -> impl Strategy<Value = f32> {
    -1.0e5f32..=1.0e5
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (bounded_f32(), bounded_f32(), bounded_f32()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #[test]
    fn add_commutes(a in arb_vec3(), b in arb_vec3()) {
        prop_assert_eq!(a + b, b + a);
    }

    #[test]
    fn distance_is_symmetric(a in arb_vec3(), b in arb_vec3()) {
        prop_assert!(approx(a.distance(b), b.distance(a), 1e-3));
    }

    #[test]
    fn distance_to_self_is_zero(a in arb_vec3()) {
        prop_assert_eq!(a.distance(a), 0.0);
    }

    #[test]
    fn normalized_has_unit_length(a in arb_vec3()) {
        prop_assume!(a.length() > 1e-3);
        prop_assert!(approx(a.normalized().length(), 1.0, 1e-3));
    }

    #[test]
    fn cross_is_orthogonal(a in arb_vec3(), b in arb_vec3()) {
        let c = a.cross(b);
        let scale = a.length() * b.length();
        prop_assume!(scale > 1e-3);
        prop_assert!(approx(c.dot(a) / scale.max(1.0), 0.0, 1e-1));
    }

    #[test]
    fn aabb_center_splits_the_diagonal(a in arb_vec3(), b in arb_vec3()) {
        let lo = Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let hi = Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        let bb = Aabb::new(lo, hi);
        let c = bb.center();
        for (l, m, h) in [(lo.x, c.x, hi.x), (lo.y, c.y, hi.y), (lo.z, c.z, hi.z)] {
            prop_assert!(l <= m && m <= h);
        }
        prop_assert!(approx(c.distance(lo) + c.distance(hi), bb.diagonal(), 1e-1));
    }
}
