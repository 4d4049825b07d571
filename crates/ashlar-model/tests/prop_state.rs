use ashlar_model::BlockState;
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}"
}

fn namespaced() -> impl Strategy<Value = String> {
    (ident(), ident()).prop_map(|(ns, name)| format!("{ns}:{name}"))
}

fn props() -> impl Strategy<Value = Vec<(String, String)>> {
    proptest::collection::btree_map(ident(), ident(), 0..5)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    // parse(serialize(s)) == s for all valid states
    #[test]
    fn canonical_form_round_trips(name in namespaced(), props in props()) {
        let state = BlockState::new(name, props).unwrap();
        let text = state.to_string();
        prop_assert_eq!(BlockState::parse(&text).unwrap(), state);
    }

    // property insertion order never affects equality or serialization
    #[test]
    fn serialization_ignores_property_order(name in ident(), mut props in props()) {
        let forward = BlockState::new(name.clone(), props.clone()).unwrap();
        props.reverse();
        let backward = BlockState::new(name, props).unwrap();
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.to_string(), backward.to_string());
    }
}
