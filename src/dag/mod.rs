pub mod dag_level;

pub use dag_level::{DagEdge, DagLevel};

use crate::errors::HmmError;

/**
 * An immutable leveled DAG modeling haplotype frequencies. Level m owns the
 * transition from marker m-1 state space to marker m state space; edges go
 * only from the parent nodes of a level to the parent nodes of the next
 * level. The DAG is built by an external collaborator and queried read-only
 * here, so any number of threads may share one instance.
 */
#[derive(Debug, Clone)]
pub struct Dag {
    levels: Vec<DagLevel>,
    pos: Vec<f64>,
    max_nodes: usize,
    max_edges: usize,
}

impl Dag {
    /**
     * @param levels the DAG levels in marker order
     * @param pos the per-level positions consumed by the recombination
     * model, in strictly nondecreasing order
     */
    pub fn new(levels: Vec<DagLevel>, pos: Vec<f64>) -> Result<Dag, HmmError> {
        if levels.is_empty() {
            return Err(HmmError::InconsistentInputs {
                msg: "a DAG must have at least one level".to_string(),
            });
        }
        if pos.len() != levels.len() {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "{} positions for {} DAG levels",
                    pos.len(),
                    levels.len()
                ),
            });
        }
        for w in pos.windows(2) {
            if w[1] < w[0] {
                return Err(HmmError::InconsistentInputs {
                    msg: "DAG positions must be nondecreasing".to_string(),
                });
            }
        }
        for m in 0..levels.len() - 1 {
            if levels[m].n_child_nodes() != levels[m + 1].n_parent_nodes() {
                return Err(HmmError::InconsistentInputs {
                    msg: format!(
                        "level {} has {} child nodes but level {} has {} parent nodes",
                        m,
                        levels[m].n_child_nodes(),
                        m + 1,
                        levels[m + 1].n_parent_nodes()
                    ),
                });
            }
        }
        let max_nodes = levels
            .iter()
            .map(|l| l.n_parent_nodes())
            .chain(std::iter::once(levels.last().unwrap().n_child_nodes()))
            .max()
            .unwrap();
        let max_edges = levels.iter().map(|l| l.n_edges()).max().unwrap();
        Ok(Dag {
            levels,
            pos,
            max_nodes,
            max_edges,
        })
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, marker: usize) -> &DagLevel {
        &self.levels[marker]
    }

    pub fn n_parent_nodes(&self, marker: usize) -> usize {
        self.levels[marker].n_parent_nodes()
    }

    pub fn n_edges(&self, marker: usize) -> usize {
        self.levels[marker].n_edges()
    }

    pub fn n_out_edges(&self, marker: usize, node: usize) -> usize {
        self.levels[marker].n_out_edges(node)
    }

    pub fn out_edge(&self, marker: usize, node: usize, index: usize) -> usize {
        self.levels[marker].out_edge(node, index)
    }

    pub fn out_edge_by_symbol(&self, marker: usize, node: usize, symbol: usize) -> Option<usize> {
        self.levels[marker].out_edge_by_symbol(node, symbol)
    }

    pub fn symbol(&self, marker: usize, edge: usize) -> usize {
        self.levels[marker].symbol(edge)
    }

    pub fn parent_node(&self, marker: usize, edge: usize) -> usize {
        self.levels[marker].parent_node(edge)
    }

    pub fn child_node(&self, marker: usize, edge: usize) -> usize {
        self.levels[marker].child_node(edge)
    }

    pub fn cond_edge_prob(&self, marker: usize, edge: usize) -> f32 {
        self.levels[marker].cond_edge_prob(edge)
    }

    pub fn edge_prob(&self, marker: usize, edge: usize) -> f32 {
        self.levels[marker].edge_prob(edge)
    }

    pub fn parent_prob(&self, marker: usize, node: usize) -> f32 {
        self.levels[marker].parent_prob(node)
    }

    /**
     * The largest node count over all levels.
     */
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /**
     * The largest edge count over all levels.
     */
    pub fn max_edges(&self) -> usize {
        self.max_edges
    }

    /**
     * The per-level positions consumed by the recombination model.
     */
    pub fn pos_array(&self) -> &[f64] {
        &self.pos
    }
}

/**
 * Per-level recombination jump probabilities for the DAG transition model.
 * The distance between adjacent level positions (in cM, rescaled by
 * map_scale) enters the population-genetic jump formula with the effective
 * population size ne and the haplotype count the DAG was built from. The
 * first level has no predecessor and gets probability zero.
 */
pub fn level_recomb_probs(
    dag: &Dag,
    ne: f64,
    n_haps: usize,
    map_scale: f64,
    model_scale: f64,
) -> Vec<f32> {
    assert!(n_haps > 0, "haplotype count must be positive");
    assert!(ne > 0.0 && map_scale > 0.0 && model_scale > 0.0);
    let pos = dag.pos_array();
    let mut p_recomb = vec![0f32; dag.n_levels()];
    for m in 1..dag.n_levels() {
        let morgans = (pos[m] - pos[m - 1]) * map_scale / 100.0;
        let x = 0.04 * ne * model_scale * morgans / n_haps as f64;
        p_recomb[m] = (-(-x).exp_m1()) as f32;
    }
    p_recomb
}
