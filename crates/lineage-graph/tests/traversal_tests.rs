//! Traversal and mutation behaviour, run against every store backend.

use lineage_core::{Edge, Node};
use lineage_graph::{
    EdgeStore, ErrorKind, GraphError, GraphService, MemoryEdgeStore, Operation, SledEdgeStore,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

/// One store per backend. The temp dir keeps the sled database alive.
fn stores() -> Vec<(&'static str, Arc<dyn EdgeStore>, TempDir)> {
    let memory_dir = tempfile::tempdir().unwrap();
    let memory: Arc<dyn EdgeStore> = Arc::new(MemoryEdgeStore::new());

    let sled_dir = tempfile::tempdir().unwrap();
    let sled: Arc<dyn EdgeStore> =
        Arc::new(SledEdgeStore::open(sled_dir.path().join("db"), "edge").unwrap());

    vec![("memory", memory, memory_dir), ("sled", sled, sled_dir)]
}

/// A service per backend.
fn services() -> Vec<(&'static str, GraphService, TempDir)> {
    stores()
        .into_iter()
        .map(|(name, store, dir)| (name, GraphService::new(store), dir))
        .collect()
}

fn n(id: &str, t: &str) -> Node {
    Node::new(id, t)
}

fn ids(nodes: &[Node]) -> BTreeSet<String> {
    nodes.iter().map(|node| node.id.clone()).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn load(svc: &GraphService, edges: &[(Node, Node)]) {
    for (source, target) in edges {
        svc.add_edge(source.clone(), target.clone()).await.unwrap();
    }
}

/// The example forest used by `lineage seed`:
///
/// ```text
/// p1 -> s1..s10 -> j1 -> c1
/// p1 -> s11 -> j2 -> c1
/// p1 -> s12 -> j3 -> c2
/// p2 -> s13 -> j3 -> c2
/// ```
fn example_forest() -> Vec<(Node, Node)> {
    let mut edges = vec![(n("j1", "J"), n("c1", "C"))];
    for i in 1..=10 {
        let s = format!("s{i}");
        edges.push((n(&s, "S"), n("j1", "J")));
        edges.push((n("p1", "P"), n(&s, "S")));
    }
    edges.extend([
        (n("j2", "J"), n("c1", "C")),
        (n("s11", "S"), n("j2", "J")),
        (n("p1", "P"), n("s11", "S")),
        (n("j3", "J"), n("c2", "C")),
        (n("s12", "S"), n("j3", "J")),
        (n("p1", "P"), n("s12", "S")),
        (n("s13", "S"), n("j3", "J")),
        (n("p2", "P"), n("s13", "S")),
    ]);
    edges
}

#[tokio::test]
async fn test_shared_descendant_appears_once() {
    for (name, svc, _dir) in services() {
        load(
            &svc,
            &[
                (n("p1", "P"), n("s1", "S")),
                (n("s1", "S"), n("j1", "J")),
                (n("j1", "J"), n("c1", "C")),
                (n("p1", "P"), n("s2", "S")),
                (n("s2", "S"), n("j1", "J")),
            ],
        )
        .await;

        let found = svc.descendants("p1").await.unwrap();
        assert_eq!(found.len(), 4, "{name}");
        assert_eq!(ids(&found), set(&["s1", "s2", "j1", "c1"]), "{name}");
    }
}

#[tokio::test]
async fn test_ascendants_exclude_other_lineages() {
    for (name, svc, _dir) in services() {
        load(
            &svc,
            &[
                (n("p1", "P"), n("s1", "S")),
                (n("s1", "S"), n("j1", "J")),
                (n("j1", "J"), n("c1", "C")),
                (n("p2", "P"), n("s2", "S")),
                (n("s2", "S"), n("j2", "J")),
                (n("j2", "J"), n("c2", "C")),
                (n("p1", "P"), n("s3", "S")),
                (n("s3", "S"), n("j2", "J")),
            ],
        )
        .await;

        let found = svc.ascendants("c1").await.unwrap();
        assert_eq!(ids(&found), set(&["j1", "s1", "p1"]), "{name}");

        let found = svc.ascendants("c2").await.unwrap();
        assert_eq!(ids(&found), set(&["j2", "s2", "s3", "p1", "p2"]), "{name}");
    }
}

#[tokio::test]
async fn test_ascendants_through_shared_node() {
    for (name, svc, _dir) in services() {
        load(
            &svc,
            &[
                (n("p1", "P"), n("s1", "S")),
                (n("s1", "S"), n("j1", "J")),
                (n("j1", "J"), n("c1", "C")),
                (n("p2", "P"), n("s2", "S")),
                (n("s2", "S"), n("j1", "J")),
                (n("j1", "J"), n("c2", "C")),
            ],
        )
        .await;

        // j1 is shared, so both lineages lead to c1; c2 is a sibling, not an ancestor
        let found = svc.ascendants("c1").await.unwrap();
        assert_eq!(ids(&found), set(&["j1", "s1", "s2", "p1", "p2"]), "{name}");
        assert!(!ids(&found).contains("c2"), "{name}");
    }
}

#[tokio::test]
async fn test_first_descendants_stop_at_match() {
    for (name, svc, _dir) in services() {
        load(
            &svc,
            &[
                (n("p1", "P"), n("s", "S")),
                (n("s", "S"), n("j", "J")),
                (n("j", "J"), n("c", "C")),
            ],
        )
        .await;

        assert_eq!(
            svc.first_descendants_of_type("p1", "J").await.unwrap(),
            vec![n("j", "J")],
            "{name}"
        );
        assert_eq!(
            svc.first_descendants_of_type("p1", "C").await.unwrap(),
            vec![n("c", "C")],
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_match_below_match_is_hidden() {
    for (name, svc, _dir) in services() {
        load(
            &svc,
            &[
                (n("x", "X"), n("a", "T")),
                (n("a", "T"), n("b", "T")),
            ],
        )
        .await;

        let found = svc.first_descendants_of_type("x", "T").await.unwrap();
        assert_eq!(found, vec![n("a", "T")], "{name}");
    }
}

#[tokio::test]
async fn test_add_then_remove_edge() {
    for (name, svc, _dir) in services() {
        svc.add_edge(n("a", "A"), n("b", "B")).await.unwrap();
        assert!(svc.children("a").await.unwrap().contains(&n("b", "B")), "{name}");

        svc.remove_edge(n("a", "A"), n("b", "B")).await.unwrap();
        assert!(!svc.children("a").await.unwrap().contains(&n("b", "B")), "{name}");
    }
}

#[tokio::test]
async fn test_remove_missing_edge_is_noop() {
    for (name, svc, _dir) in services() {
        load(&svc, &[(n("a", "A"), n("b", "B"))]).await;

        svc.remove_edge(n("b", "B"), n("a", "A")).await.unwrap();
        svc.remove_edge(n("zz", "Z"), n("yy", "Y")).await.unwrap();

        assert_eq!(svc.stats().await.unwrap().edge_count, 1, "{name}");
        assert_eq!(svc.children("a").await.unwrap(), vec![n("b", "B")], "{name}");
    }
}

#[tokio::test]
async fn test_cycles_terminate() {
    for (name, svc, _dir) in services() {
        load(
            &svc,
            &[
                (n("a", "A"), n("b", "B")),
                (n("b", "B"), n("c", "C")),
                (n("c", "C"), n("a", "A")),
                (n("c", "C"), n("d", "D")),
            ],
        )
        .await;

        let down = svc.descendants("a").await.unwrap();
        assert_eq!(down.len(), 4, "{name}");
        assert_eq!(ids(&down), set(&["a", "b", "c", "d"]), "{name}");

        let up = svc.ascendants("a").await.unwrap();
        assert_eq!(up.len(), 3, "{name}");
        assert_eq!(ids(&up), set(&["a", "b", "c"]), "{name}");

        let typed = svc.first_descendants_of_type("a", "D").await.unwrap();
        assert_eq!(typed, vec![n("d", "D")], "{name}");
    }
}

#[tokio::test]
async fn test_example_forest() {
    for (name, svc, _dir) in services() {
        load(&svc, &example_forest()).await;

        let below_p1 = svc.descendants("p1").await.unwrap();
        assert_eq!(below_p1.len(), 17, "{name}");
        assert_eq!(
            below_p1.iter().filter(|node| node.id == "c1").count(),
            1,
            "{name}"
        );

        let above_c2 = svc.ascendants("c2").await.unwrap();
        assert_eq!(ids(&above_c2), set(&["j3", "s12", "s13", "p1", "p2"]), "{name}");

        let above_c1 = svc.ascendants("c1").await.unwrap();
        assert!(!ids(&above_c1).contains("p2"), "{name}");
        assert_eq!(above_c1.len(), 14, "{name}");

        assert_eq!(
            ids(&svc.first_descendants_of_type("p1", "J").await.unwrap()),
            set(&["j1", "j2", "j3"]),
            "{name}"
        );
        assert_eq!(
            ids(&svc.first_descendants_of_type("p2", "C").await.unwrap()),
            set(&["c2"]),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_direction_symmetry_and_duality() {
    for (name, svc, _dir) in services() {
        let edges = example_forest();
        load(&svc, &edges).await;

        for (source, target) in &edges {
            assert!(svc.children(&source.id).await.unwrap().contains(target), "{name}");
            assert!(svc.parents(&target.id).await.unwrap().contains(source), "{name}");
        }

        let nodes: BTreeSet<Node> = edges
            .iter()
            .flat_map(|(s, t)| [s.clone(), t.clone()])
            .collect();

        for x in &nodes {
            let below = svc.descendants(&x.id).await.unwrap();
            for y in &nodes {
                let above = svc.ascendants(&y.id).await.unwrap();
                assert_eq!(
                    below.contains(y),
                    above.contains(x),
                    "{name}: {x} / {y}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_conflicting_type_is_refused() {
    for (name, svc, _dir) in services() {
        load(&svc, &[(n("a", "A"), n("b", "B"))]).await;

        let err = svc.add_edge(n("c", "C"), n("b", "Q")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity, "{name}");
        assert_eq!(svc.stats().await.unwrap().edge_count, 1, "{name}");
    }
}

#[tokio::test]
async fn test_concurrent_writers_and_readers() {
    for (name, svc, _dir) in services() {
        let mut tasks = Vec::new();
        for i in 0..16 {
            let svc = svc.clone();
            tasks.push(tokio::spawn(async move {
                svc.add_edge(n("root", "R"), n(&format!("leaf{i}"), "L"))
                    .await
                    .unwrap();
                svc.descendants("root").await.unwrap().len()
            }));
        }
        for task in tasks {
            let seen = task.await.unwrap();
            assert!((1..=16).contains(&seen), "{name}");
        }

        assert_eq!(svc.children("root").await.unwrap().len(), 16, "{name}");
    }
}

#[tokio::test]
async fn test_traversal_reports_id_stored_under_two_types() {
    for (name, store, _dir) in stores() {
        // written past the service, as a second writer racing add_edge could
        store
            .insert_edge(&Edge::new(n("a", "A"), n("y", "B")))
            .await
            .unwrap();
        store
            .insert_edge(&Edge::new(n("y", "Q"), n("z", "Z")))
            .await
            .unwrap();
        let svc = GraphService::new(store);

        let err = svc.descendants("a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity, "{name}");
        assert_eq!(err.operation(), Some(Operation::Descendants), "{name}");
        match err.root() {
            GraphError::TypeConflict { id, .. } => assert_eq!(id, "y", "{name}"),
            other => panic!("{name}: unexpected error {other}"),
        }

        let err = svc.ascendants("z").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity, "{name}");

        let err = svc.first_descendants_of_type("a", "Z").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity, "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_sled_databases_accept_writes() {
    let mut tasks = Vec::new();
    for worker in 0..8 {
        tasks.push(tokio::spawn(async move {
            let dir = tempfile::tempdir().unwrap();
            let store = SledEdgeStore::open(dir.path().join("db"), "edge").unwrap();
            let svc = GraphService::new(Arc::new(store));

            for i in 0..20 {
                svc.add_edge(n("root", "R"), n(&format!("w{worker}n{i}"), "N"))
                    .await
                    .unwrap();
            }
            svc.descendants("root").await.unwrap().len()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), 20);
    }
}
