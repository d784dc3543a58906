//! End-to-end integration tests for shortestPath/allShortestPaths and
//! variable-length relationship patterns.
//! Each test exercises: analyze -> substitute -> fast-path-or-pipeline against MemoryBackend.

use cyform::{Graph, PropertyMap, Value, StorageBackend, NodeId};

/// Alice -[:KNOWS]-> Bob -[:KNOWS]-> Charlie -[:KNOWS]-> Dave, plus a direct
/// Alice -[:KNOWS]-> Charlie shortcut, so the shortest Alice->Charlie path is
/// length 1 even though a longer one also exists.
async fn setup_diamond() -> Graph<cyform::storage::MemoryBackend> {
    let graph = Graph::open_memory().await.unwrap();

    for name in ["Alice", "Bob", "Charlie", "Dave"] {
        graph.execute(&format!("CREATE (n:Person {{name: '{name}'}})"), PropertyMap::new()).await.unwrap();
    }

    let backend = graph.backend();
    backend.create_edge(NodeId(1), NodeId(2), "KNOWS", PropertyMap::new()).await.unwrap();
    backend.create_edge(NodeId(2), NodeId(3), "KNOWS", PropertyMap::new()).await.unwrap();
    backend.create_edge(NodeId(3), NodeId(4), "KNOWS", PropertyMap::new()).await.unwrap();
    backend.create_edge(NodeId(1), NodeId(3), "KNOWS", PropertyMap::new()).await.unwrap();

    graph
}

// ============================================================================
// 1. shortestPath finds the shorter of two routes
// ============================================================================

#[tokio::test]
async fn test_shortest_path_prefers_direct_shortcut() {
    let graph = setup_diamond().await;

    let result = graph
        .execute(
            "MATCH p = shortestPath((a:Person {name: 'Alice'})-[:KNOWS*]->(c:Person {name: 'Charlie'})) RETURN length(p)",
            PropertyMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    let len: i64 = result.rows[0].get("length").unwrap();
    assert_eq!(len, 1, "the direct Alice->Charlie edge should win over the 2-hop route");
}

// ============================================================================
// 2. allShortestPaths returns every path tied for the minimum length
// ============================================================================

#[tokio::test]
async fn test_all_shortest_paths_returns_every_minimal_route() {
    let graph = Graph::open_memory().await.unwrap();
    for name in ["A", "B", "C", "D"] {
        graph.execute(&format!("CREATE (n:Person {{name: '{name}'}})"), PropertyMap::new()).await.unwrap();
    }
    let backend = graph.backend();
    // Two independent 2-hop routes from A to D: A->B->D and A->C->D.
    backend.create_edge(NodeId(1), NodeId(2), "KNOWS", PropertyMap::new()).await.unwrap();
    backend.create_edge(NodeId(2), NodeId(4), "KNOWS", PropertyMap::new()).await.unwrap();
    backend.create_edge(NodeId(1), NodeId(3), "KNOWS", PropertyMap::new()).await.unwrap();
    backend.create_edge(NodeId(3), NodeId(4), "KNOWS", PropertyMap::new()).await.unwrap();

    let result = graph
        .execute(
            "MATCH p = allShortestPaths((a:Person {name: 'A'})-[:KNOWS*]->(d:Person {name: 'D'})) RETURN length(p)",
            PropertyMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 2, "both 2-hop routes should be returned");
    for row in &result.rows {
        let len: i64 = row.get("length").unwrap();
        assert_eq!(len, 2);
    }
}

// ============================================================================
// 3. shortestPath with no connecting route returns zero rows
// ============================================================================

#[tokio::test]
async fn test_shortest_path_no_route_returns_empty() {
    let graph = Graph::open_memory().await.unwrap();
    graph.execute("CREATE (n:Person {name: 'Island1'})", PropertyMap::new()).await.unwrap();
    graph.execute("CREATE (n:Person {name: 'Island2'})", PropertyMap::new()).await.unwrap();

    let result = graph
        .execute(
            "MATCH p = shortestPath((a:Person {name: 'Island1'})-[:KNOWS*]->(b:Person {name: 'Island2'})) RETURN length(p)",
            PropertyMap::new(),
        )
        .await
        .unwrap();

    assert!(result.rows.is_empty());
}

// ============================================================================
// 4. Variable-length pattern with an explicit bound only matches within it
// ============================================================================

#[tokio::test]
async fn test_variable_length_pattern_respects_explicit_bound() {
    let graph = setup_diamond().await;

    // Alice to Dave is 3 hops via Bob/Charlie; *1..2 must not reach it.
    let result = graph
        .execute(
            "MATCH (a:Person {name: 'Alice'})-[:KNOWS*1..2]->(d:Person {name: 'Dave'}) RETURN d.name",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    assert!(result.rows.is_empty(), "Dave is 3 hops away, outside the *1..2 bound");

    let result = graph
        .execute(
            "MATCH (a:Person {name: 'Alice'})-[:KNOWS*1..3]->(d:Person {name: 'Dave'}) RETURN d.name",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 1, "Dave is reachable within *1..3");
}

// ============================================================================
// 5. Variable-length pattern enumerates every path up to the bound
// ============================================================================

#[tokio::test]
async fn test_variable_length_pattern_enumerates_multiple_hop_counts() {
    let graph = setup_diamond().await;

    // *1..3 from Alice to Charlie matches both the direct edge (1 hop) and
    // the Bob-mediated route (2 hops).
    let result = graph
        .execute(
            "MATCH (a:Person {name: 'Alice'})-[:KNOWS*1..3]->(c:Person {name: 'Charlie'}) RETURN c.name",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 2, "both the 1-hop and 2-hop Alice->Charlie routes should be enumerated");
    for row in &result.rows {
        let name: String = row.get("c.name").unwrap();
        assert_eq!(name, "Charlie");
    }
}

// ============================================================================
// 6. Path functions over a materialized path binding
// ============================================================================

#[tokio::test]
async fn test_path_nodes_and_relationships_functions() {
    let graph = setup_diamond().await;

    let result = graph
        .execute(
            "MATCH p = shortestPath((a:Person {name: 'Alice'})-[:KNOWS*]->(d:Person {name: 'Dave'})) RETURN nodes(p), relationships(p)",
            PropertyMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    match result.rows[0].get_value("nodes") {
        Some(Value::List(nodes)) => assert_eq!(nodes.len(), 4, "Alice->Bob->Charlie->Dave has 4 nodes"),
        other => panic!("expected List, got {other:?}"),
    }
    match result.rows[0].get_value("relationships") {
        Some(Value::List(rels)) => assert_eq!(rels.len(), 3),
        other => panic!("expected List, got {other:?}"),
    }
}
