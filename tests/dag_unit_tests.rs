extern crate currawong;

use currawong::dag::{level_recomb_probs, Dag, DagEdge, DagLevel};

/**
 * Two parent nodes per level (one root level), two out-edges per node
 * carrying symbols 0 and 1, edge with symbol s leading to child s.
 */
fn ladder_dag(n_levels: usize) -> Dag {
    let mut levels = Vec::with_capacity(n_levels);
    levels.push(
        DagLevel::new(
            vec![1.0],
            vec![DagEdge::new(0, 0, 0, 0.5), DagEdge::new(0, 1, 1, 0.5)],
        )
        .unwrap(),
    );
    for _ in 1..n_levels {
        levels.push(
            DagLevel::new(
                vec![0.5, 0.5],
                vec![
                    DagEdge::new(0, 0, 0, 0.5),
                    DagEdge::new(0, 1, 1, 0.5),
                    DagEdge::new(1, 0, 0, 0.5),
                    DagEdge::new(1, 1, 1, 0.5),
                ],
            )
            .unwrap(),
        );
    }
    let pos = (0..n_levels).map(|m| m as f64 * 0.1).collect();
    Dag::new(levels, pos).unwrap()
}

#[test]
fn test_level_queries() {
    let dag = ladder_dag(3);
    assert_eq!(dag.n_levels(), 3);
    assert_eq!(dag.n_parent_nodes(0), 1);
    assert_eq!(dag.n_parent_nodes(1), 2);
    assert_eq!(dag.n_edges(1), 4);
    assert_eq!(dag.n_out_edges(1, 0), 2);
    assert_eq!(dag.max_nodes(), 2);
    assert_eq!(dag.max_edges(), 4);

    let e = dag.out_edge(1, 1, 0);
    assert_eq!(dag.parent_node(1, e), 1);
    assert_eq!(dag.symbol(1, e), 0);
    assert_eq!(dag.child_node(1, e), 0);
    assert_eq!(dag.out_edge_by_symbol(1, 1, 1), Some(3));
    assert_eq!(dag.out_edge_by_symbol(1, 1, 7), None);
    assert!((dag.cond_edge_prob(1, e) - 0.5).abs() < 1e-7);
    assert!((dag.edge_prob(1, e) - 0.25).abs() < 1e-7);
    assert!((dag.parent_prob(1, 0) - 0.5).abs() < 1e-7);
}

#[test]
fn test_level_validation() {
    // conditional edge probabilities of a parent must sum to one
    assert!(DagLevel::new(
        vec![1.0],
        vec![DagEdge::new(0, 0, 0, 0.5), DagEdge::new(0, 1, 1, 0.3)],
    )
    .is_err());
    // parent probabilities must sum to one
    assert!(DagLevel::new(
        vec![0.5, 0.2],
        vec![
            DagEdge::new(0, 0, 0, 1.0),
            DagEdge::new(1, 0, 0, 1.0),
        ],
    )
    .is_err());
    // every parent node needs an out-edge
    assert!(DagLevel::new(
        vec![0.5, 0.5],
        vec![DagEdge::new(0, 0, 0, 1.0)],
    )
    .is_err());
}

#[test]
fn test_dag_validation() {
    // child nodes of one level must be the parent nodes of the next
    let l0 = DagLevel::new(
        vec![1.0],
        vec![DagEdge::new(0, 0, 0, 0.5), DagEdge::new(0, 1, 1, 0.5)],
    )
    .unwrap();
    let l1 = DagLevel::new(vec![1.0], vec![DagEdge::new(0, 0, 0, 1.0)]).unwrap();
    assert!(Dag::new(vec![l0.clone(), l1], vec![0.0, 0.1]).is_err());
    // positions must match the level count
    assert!(Dag::new(vec![l0], vec![0.0, 0.1]).is_err());
}

#[test]
fn test_recomb_probs_grow_with_distance() {
    let dag = ladder_dag(4);
    let p = level_recomb_probs(&dag, 10_000.0, 200, 1.0, 1.0);
    assert_eq!(p.len(), 4);
    assert_eq!(p[0], 0.0);
    assert!(p[1] > 0.0 && p[1] < 1.0);
    // equal spacing gives equal jump probabilities
    assert!((p[1] - p[2]).abs() < 1e-9);

    let wider = level_recomb_probs(&dag, 10_000.0, 200, 5.0, 1.0);
    assert!(wider[1] > p[1]);
    let smaller_ne = level_recomb_probs(&dag, 100.0, 200, 1.0, 1.0);
    assert!(smaller_ne[1] < p[1]);
}
