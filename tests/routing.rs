//! Route queries and book transfers across a library network

use libris_rs::{Book, BookStatus, CatalogError, Criterion, Library, LibraryBuilder, LibraryGraph};

/// The four-node network used throughout: A-B, B-C, A-C, and an isolated D
fn graph() -> LibraryGraph {
    let mut g = LibraryGraph::new();
    for id in ["A", "B", "C", "D"] {
        g.add_node(id, None);
    }
    g.add_edge("A", "B", 5.0, 1.0, true).unwrap();
    g.add_edge("B", "C", 3.0, 2.0, true).unwrap();
    g.add_edge("A", "C", 10.0, 0.5, true).unwrap();
    g
}

#[test]
fn test_shortest_paths_by_each_criterion() {
    let g = graph();

    let by_time = g.shortest_path_by_time("A", "C");
    assert_eq!((by_time.weight, by_time.path.clone()), (8.0, vec!["A".into(), "B".into(), "C".into()]));

    let by_cost = g.shortest_path_by_cost("A", "C");
    assert_eq!((by_cost.weight, by_cost.path.clone()), (0.5, vec!["A".into(), "C".into()]));

    // Weights are symmetric, so the reverse trip mirrors the path
    let back = g.shortest_path_by_time("C", "A");
    assert_eq!(back.path, vec!["C", "B", "A"]);
}

#[test]
fn test_directed_edge_is_one_way() {
    let mut g = LibraryGraph::new();
    g.add_node("X", None);
    g.add_node("Y", None);
    g.add_edge("X", "Y", 1.0, 1.0, false).unwrap();

    assert!(g.shortest_path_by_time("X", "Y").is_found());
    assert!(!g.shortest_path_by_time("Y", "X").is_found());
    assert_eq!(g.degree_in("Y"), Some(1));
    assert_eq!(g.degree_out("Y"), Some(0));
}

#[test]
fn test_alternates_terminate_on_single_path() {
    let mut g = LibraryGraph::new();
    for id in ["P", "Q", "R", "S"] {
        g.add_node(id, None);
    }
    g.add_edge("P", "Q", 2.0, 2.0, false).unwrap();
    g.add_edge("Q", "R", 2.0, 2.0, false).unwrap();
    g.add_edge("R", "S", 2.0, 2.0, false).unwrap();

    let routes = g.k_alternate_paths("P", "S", Criterion::Cost, 3);
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].weight, 6.0);
    assert_eq!(routes[0].hops(), 3);
}

#[test]
fn test_alternates_are_nondecreasing_and_distinct() {
    let mut g = LibraryGraph::new();
    for id in ["S", "M1", "M2", "M3", "T"] {
        g.add_node(id, None);
    }
    g.add_edge("S", "M1", 1.0, 1.0, true).unwrap();
    g.add_edge("S", "M2", 2.0, 1.0, true).unwrap();
    g.add_edge("S", "M3", 3.0, 1.0, true).unwrap();
    g.add_edge("M1", "T", 1.0, 1.0, true).unwrap();
    g.add_edge("M2", "T", 1.0, 1.0, true).unwrap();
    g.add_edge("M3", "T", 1.0, 1.0, true).unwrap();

    let routes = g.k_alternate_paths("S", "T", Criterion::Time, 5);
    assert_eq!(routes.len(), 3);
    assert!(routes.windows(2).all(|w| w[0].weight <= w[1].weight));
    assert_eq!(routes[0].path, vec!["S", "M1", "T"]);
    assert_eq!(routes[2].path, vec!["S", "M3", "T"]);

    let mut paths: Vec<_> = routes.iter().map(|r| r.path.clone()).collect();
    paths.dedup();
    assert_eq!(paths.len(), 3);
}

#[test]
fn test_graph_statistics_and_enumeration() {
    let g = graph();
    let stats = g.statistics();
    assert_eq!(stats.nodes, 4);
    assert_eq!(stats.edges, 6);
    assert_eq!(stats.isolated_nodes, 1);

    let ids: Vec<&str> = g.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C", "D"]);

    let edges = g.edges();
    assert_eq!(edges.len(), 6);
    assert!(edges.iter().all(|e| e.time >= 0.0 && e.cost >= 0.0));

    let json = serde_json::to_string(&stats).unwrap();
    assert!(json.contains("\"isolated_nodes\":1"));
}

#[test]
fn test_transfer_round_trip() {
    let mut library = LibraryBuilder::new().alternate_routes(2).build().unwrap();
    for id in ["A", "B", "C", "D"] {
        library.add_library(id, None);
    }
    library.connect("A", "B", 5.0, 1.0, true).unwrap();
    library.connect("B", "C", 3.0, 2.0, true).unwrap();
    library.connect("A", "C", 10.0, 0.5, true).unwrap();

    library
        .add_book(Book::new("Dune", "1000000000000", "SciFi", 1965, "Herbert").at_library("A"))
        .unwrap();
    library
        .add_book(Book::new("Emma", "9780141439587", "Classic", 1815, "Austen").at_library("C"))
        .unwrap();

    let route = library.dispatch("1000000000000", "C", Criterion::Cost).unwrap();
    assert_eq!(route.path, vec!["A", "C"]);
    assert_eq!(library.catalog().books_at("A").len(), 1);

    library.receive("1000000000000").unwrap();
    assert!(library.catalog().books_at("A").is_empty());
    assert_eq!(library.catalog().books_at("C").len(), 2);
    assert_eq!(
        library.catalog().get_by_title("Dune").map(|b| b.status),
        Some(BookStatus::Available)
    );

    assert_eq!(library.alternate_routes("A", "C", Criterion::Time).len(), 2);
    assert!(library.remove_library("A").unwrap());
}

#[test]
fn test_unshelved_book_cannot_be_dispatched() {
    let mut library = Library::new();
    library.add_library("A", None);
    library
        .add_book(Book::new("Dune", "1000000000000", "SciFi", 1965, "Herbert"))
        .unwrap();

    assert!(matches!(
        library.dispatch("1000000000000", "A", Criterion::Time),
        Err(CatalogError::MissingField("library"))
    ));

    library.shelve("1000000000000", "B").unwrap();
    assert!(library.graph().has_node("B"));
    assert!(matches!(
        library.dispatch("1000000000000", "A", Criterion::Time),
        Err(CatalogError::NoRoute { .. })
    ));
}
