//! Lifecycle tests: reanimation from persistent identity, the persisted
//! collection-ID high-water mark, and collection disposal.

mod common;

use cairn::prelude::*;
use cairn::CairnError;
use common::TrackingReferenceManager;
use std::sync::Arc;

fn setup() -> (
    Arc<MemVatStore>,
    Arc<TrackingReferenceManager>,
    CollectionManager,
) {
    let store = Arc::new(MemVatStore::new());
    let vrm = Arc::new(TrackingReferenceManager::new());
    let manager = manager_over(&store, &vrm);
    (store, vrm, manager)
}

fn manager_over(
    store: &Arc<MemVatStore>,
    vrm: &Arc<TrackingReferenceManager>,
) -> CollectionManager {
    CollectionManager::new(
        Arc::clone(store) as Arc<dyn VatStore>,
        Arc::clone(vrm) as Arc<dyn ReferenceManager>,
        Arc::new(JsonMarshal::new()),
    )
    .unwrap()
}

fn prefix_of(external_id: &str) -> String {
    let (_, collection_id) = external_id.split_once('/').unwrap();
    format!("vc.{collection_id}.")
}

#[test]
fn test_reanimation_preserves_label_and_contents() {
    let (_, _, manager) = setup();
    let map = manager.make_scalar_map_store("inventory", None).unwrap();
    map.init(&Key::from("widget"), &Value::from(3.0)).unwrap();
    map.init(&Key::from("gadget"), &Value::from(5.0)).unwrap();
    let external_id = map.external_id();
    drop(map);

    let again = manager
        .reanimate(&external_id)
        .unwrap()
        .into_scalar_map()
        .unwrap();
    assert_eq!(again.label(), "inventory");
    assert_eq!(again.external_id(), external_id);
    assert_eq!(again.get(&Key::from("widget")).unwrap(), Value::from(3.0));
    assert_eq!(again.size().unwrap(), 2);
}

#[test]
fn test_reanimation_preserves_key_schema() {
    let (_, _, manager) = setup();
    let map = manager
        .make_scalar_map_store("narrow", Some(Pattern::eq("only")))
        .unwrap();
    let external_id = map.external_id();
    drop(map);

    let again = manager
        .reanimate(&external_id)
        .unwrap()
        .into_scalar_map()
        .unwrap();
    assert_eq!(again.key_schema(), &Pattern::eq("only"));
    assert!(matches!(
        again.init(&Key::from("other"), &Value::Null),
        Err(CairnError::SchemaViolation(_))
    ));
    again.init(&Key::from("only"), &Value::Null).unwrap();
}

#[test]
fn test_reanimation_recounts_size_lazily() {
    let (_, _, manager) = setup();
    let map = manager.make_scalar_map_store("counted", None).unwrap();
    for i in 0..3 {
        map.init(&Key::from(i as f64), &Value::Null).unwrap();
    }
    let external_id = map.external_id();
    drop(map);

    let again = manager
        .reanimate(&external_id)
        .unwrap()
        .into_scalar_map()
        .unwrap();
    assert_eq!(again.size().unwrap(), 3);
    again.init(&Key::from(99.0), &Value::Null).unwrap();
    assert_eq!(again.size().unwrap(), 4);
}

#[test]
fn test_reanimated_kind_matches_external_id() {
    let (_, _, manager) = setup();
    let set = manager.make_scalar_set_store("tags", None).unwrap();
    let external_id = set.external_id();
    drop(set);

    let again = manager.reanimate(&external_id).unwrap();
    assert!(matches!(again, AnyStore::ScalarSet(_)));
    assert_eq!(again.label(), "tags");
}

#[test]
fn test_reanimator_runs_through_the_reference_manager() {
    let (_, vrm, manager) = setup();
    let map = manager.make_scalar_map_store("via-vrm", None).unwrap();
    let external_id = map.external_id();
    let kind_id: u64 = external_id
        .strip_prefix("o+")
        .unwrap()
        .split_once('/')
        .unwrap()
        .0
        .parse()
        .unwrap();
    drop(map);

    vrm.run_reanimator(kind_id, &external_id).unwrap();
}

#[test]
fn test_reanimate_rejects_bad_identifiers() {
    let (_, _, manager) = setup();
    assert!(matches!(
        manager.reanimate("nonsense"),
        Err(CairnError::InvalidExternalId(_))
    ));
    assert!(matches!(
        manager.reanimate("o+999999/1"),
        Err(CairnError::UnknownKind(_))
    ));
}

#[test]
fn test_collection_ids_survive_restart() {
    let store = Arc::new(MemVatStore::new());
    let vrm = Arc::new(TrackingReferenceManager::new());

    let first = manager_over(&store, &vrm);
    let a = first.make_scalar_map_store("a", None).unwrap();
    let b = first.make_scalar_map_store("b", None).unwrap();
    let id_a = prefix_of(&a.external_id());
    let id_b = prefix_of(&b.external_id());
    assert_ne!(id_a, id_b);
    drop((a, b, first));

    // a fresh manager over the same rows must not reuse either ID
    let second = manager_over(&store, &vrm);
    let c = second.make_scalar_map_store("c", None).unwrap();
    let id_c = prefix_of(&c.external_id());
    assert_ne!(id_c, id_a);
    assert_ne!(id_c, id_b);
}

#[test]
fn test_kind_ids_survive_restart() {
    let store = Arc::new(MemVatStore::new());
    let vrm = Arc::new(TrackingReferenceManager::new());

    let first = manager_over(&store, &vrm);
    let map = first.make_scalar_map_store("m", None).unwrap();
    let external_id = map.external_id();
    drop((map, first));

    let second = manager_over(&store, &vrm);
    let again = second
        .reanimate(&external_id)
        .unwrap()
        .into_scalar_map()
        .unwrap();
    assert_eq!(again.label(), "m");
}

#[test]
fn test_delete_collection_sweeps_all_rows() {
    let (store, vrm, manager) = setup();
    let map = manager.make_scalar_map_store("doomed", None).unwrap();
    map.init(&Key::from("plain"), &Value::Remotable("o-7".into()))
        .unwrap();
    map.init(&Key::Remotable("o-8".into()), &Value::from(1.0))
        .unwrap();
    let external_id = map.external_id();
    let prefix = prefix_of(&external_id);
    drop(map);

    assert!(!store.keys_with_prefix(&prefix).is_empty());
    manager.delete_collection(&external_id).unwrap();
    assert!(store.keys_with_prefix(&prefix).is_empty());
    assert!(vrm.refcounts_balanced());
}

#[test]
fn test_dropped_collection_disposer() {
    let (store, vrm, manager) = setup();
    let map = manager.make_scalar_map_store("gc", None).unwrap();
    map.init(&Key::from("k"), &Value::Remotable("o-1".into()))
        .unwrap();
    let prefix = prefix_of(&map.external_id());
    drop(map);

    vrm.drop_collection(&prefix).unwrap();
    assert!(store.keys_with_prefix(&prefix).is_empty());
    assert!(vrm.refcounts_balanced());
}

#[test]
fn test_distinct_reanimations_share_rows() {
    let (_, _, manager) = setup();
    let map = manager.make_scalar_map_store("shared", None).unwrap();
    map.init(&Key::from("k"), &Value::from(1.0)).unwrap();
    let external_id = map.external_id();

    let h1 = manager
        .reanimate(&external_id)
        .unwrap()
        .into_scalar_map()
        .unwrap();
    let h2 = manager
        .reanimate(&external_id)
        .unwrap()
        .into_scalar_map()
        .unwrap();
    h1.set(&Key::from("k"), &Value::from(2.0)).unwrap();
    assert_eq!(h2.get(&Key::from("k")).unwrap(), Value::from(2.0));
}
