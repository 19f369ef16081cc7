use crate::errors::HmmError;

const PROB_SUM_TOLERANCE: f32 = 1e-3;

/**
 * One edge of a leveled DAG under construction. Node indices are local to
 * a level: parent indexes the level's parent nodes and child indexes the
 * parent nodes of the next level.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DagEdge {
    pub parent: usize,
    pub child: usize,
    pub symbol: usize,
    pub cond_prob: f32,
}

impl DagEdge {
    pub fn new(parent: usize, child: usize, symbol: usize, cond_prob: f32) -> DagEdge {
        DagEdge {
            parent,
            child,
            symbol,
            cond_prob,
        }
    }
}

/**
 * One level of a leveled DAG: the parent nodes with their marginal
 * probabilities and the out-edges grouped by parent node. Edge indices are
 * level local and stable after construction.
 */
#[derive(Debug, Clone)]
pub struct DagLevel {
    parent_probs: Vec<f32>,
    // out-edges sorted by parent node, located through edge_start
    edge_start: Vec<u32>,
    edge_parent: Vec<u32>,
    edge_child: Vec<u32>,
    edge_symbol: Vec<u16>,
    cond_edge_probs: Vec<f32>,
    edge_probs: Vec<f32>,
    n_child_nodes: usize,
}

impl DagLevel {
    pub fn new(parent_probs: Vec<f32>, mut edges: Vec<DagEdge>) -> Result<DagLevel, HmmError> {
        let n_parents = parent_probs.len();
        if n_parents == 0 || edges.is_empty() {
            return Err(HmmError::InconsistentInputs {
                msg: "a DAG level must have at least one parent node and one edge".to_string(),
            });
        }
        let parent_sum: f32 = parent_probs.iter().sum();
        if (parent_sum - 1.0).abs() > PROB_SUM_TOLERANCE {
            return Err(HmmError::InconsistentInputs {
                msg: format!("parent node probabilities sum to {}", parent_sum),
            });
        }
        if parent_probs.iter().any(|p| !(*p > 0.0 && p.is_finite())) {
            return Err(HmmError::InconsistentInputs {
                msg: "parent node probabilities must be positive".to_string(),
            });
        }
        for edge in edges.iter() {
            if edge.parent >= n_parents {
                return Err(HmmError::InconsistentInputs {
                    msg: format!("edge parent node out of bounds: {}", edge.parent),
                });
            }
            if !(edge.cond_prob > 0.0 && edge.cond_prob.is_finite()) {
                return Err(HmmError::InconsistentInputs {
                    msg: format!("conditional edge probability must be positive: {}", edge.cond_prob),
                });
            }
        }
        edges.sort_by_key(|e| e.parent);

        let mut edge_start = vec![0u32; n_parents + 1];
        for edge in edges.iter() {
            edge_start[edge.parent + 1] += 1;
        }
        for p in 0..n_parents {
            if edge_start[p + 1] == 0 {
                return Err(HmmError::InconsistentInputs {
                    msg: format!("parent node {} has no out-edge", p),
                });
            }
            edge_start[p + 1] += edge_start[p];
        }
        for p in 0..n_parents {
            let start = edge_start[p] as usize;
            let end = edge_start[p + 1] as usize;
            let cond_sum: f32 = edges[start..end].iter().map(|e| e.cond_prob).sum();
            if (cond_sum - 1.0).abs() > PROB_SUM_TOLERANCE {
                return Err(HmmError::InconsistentInputs {
                    msg: format!(
                        "conditional edge probabilities of parent node {} sum to {}",
                        p, cond_sum
                    ),
                });
            }
        }

        let n_child_nodes = edges.iter().map(|e| e.child).max().unwrap() + 1;
        let edge_parent: Vec<u32> = edges.iter().map(|e| e.parent as u32).collect();
        let edge_child: Vec<u32> = edges.iter().map(|e| e.child as u32).collect();
        let edge_symbol: Vec<u16> = edges.iter().map(|e| e.symbol as u16).collect();
        let cond_edge_probs: Vec<f32> = edges.iter().map(|e| e.cond_prob).collect();
        let edge_probs: Vec<f32> = edges
            .iter()
            .map(|e| parent_probs[e.parent] * e.cond_prob)
            .collect();

        Ok(DagLevel {
            parent_probs,
            edge_start,
            edge_parent,
            edge_child,
            edge_symbol,
            cond_edge_probs,
            edge_probs,
            n_child_nodes,
        })
    }

    pub fn n_parent_nodes(&self) -> usize {
        self.parent_probs.len()
    }

    pub fn n_child_nodes(&self) -> usize {
        self.n_child_nodes
    }

    pub fn n_edges(&self) -> usize {
        self.edge_parent.len()
    }

    pub fn parent_prob(&self, node: usize) -> f32 {
        self.parent_probs[node]
    }

    pub fn n_out_edges(&self, node: usize) -> usize {
        (self.edge_start[node + 1] - self.edge_start[node]) as usize
    }

    pub fn out_edge(&self, node: usize, index: usize) -> usize {
        assert!(
            index < self.n_out_edges(node),
            "out-edge index out of bounds for node {}: {}",
            node,
            index
        );
        self.edge_start[node] as usize + index
    }

    /**
     * The out-edge of node carrying symbol, if one exists.
     */
    pub fn out_edge_by_symbol(&self, node: usize, symbol: usize) -> Option<usize> {
        let start = self.edge_start[node] as usize;
        let end = self.edge_start[node + 1] as usize;
        (start..end).find(|&e| self.edge_symbol[e] as usize == symbol)
    }

    pub fn symbol(&self, edge: usize) -> usize {
        self.edge_symbol[edge] as usize
    }

    pub fn parent_node(&self, edge: usize) -> usize {
        self.edge_parent[edge] as usize
    }

    pub fn child_node(&self, edge: usize) -> usize {
        self.edge_child[edge] as usize
    }

    pub fn cond_edge_prob(&self, edge: usize) -> f32 {
        self.cond_edge_probs[edge]
    }

    pub fn edge_prob(&self, edge: usize) -> f32 {
        self.edge_probs[edge]
    }
}
