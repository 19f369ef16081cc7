use crate::baum::node_map::NodeMap;
use crate::baum::MIN_STATE_VALUE;
use crate::dag::Dag;
use crate::model::likelihoods::AlleleLikelihoods;

/**
 * One level of the haploid Baum recursion. The active states are single
 * DAG edges, the emission evidence is per-haplotype allele likelihoods,
 * and the post-backward output is a posterior allele distribution.
 */
#[derive(Debug, Clone)]
pub struct HapBaumLevel {
    marker: usize,
    hap: usize,
    size: usize,
    edges: Vec<u32>,
    fwd_values: Vec<f32>,
    bwd_values: Vec<f32>,
    fwd_value_sum: f32,
    bwd_value_sum: f32,
    al_probs: Vec<f32>,
}

impl HapBaumLevel {
    pub fn new() -> HapBaumLevel {
        HapBaumLevel {
            marker: 0,
            hap: 0,
            size: 0,
            edges: Vec::new(),
            fwd_values: Vec::new(),
            bwd_values: Vec::new(),
            fwd_value_sum: 0.0,
            bwd_value_sum: 0.0,
            al_probs: Vec::new(),
        }
    }

    fn push_state(&mut self, edge: usize, fwd_value: f32) {
        if self.size == self.edges.len() {
            let new_capacity = std::cmp::max(self.size + 1, 3 * self.edges.len() / 2 + 1);
            self.edges.resize(new_capacity, 0);
            self.fwd_values.resize(new_capacity, 0.0);
            self.bwd_values.resize(new_capacity, 0.0);
        }
        self.edges[self.size] = edge as u32;
        self.fwd_values[self.size] = fwd_value;
        self.size += 1;
    }

    pub fn set_forward_values<A: AlleleLikelihoods>(
        &mut self,
        dag: &Dag,
        al: &A,
        nodes: &mut NodeMap<1>,
        marker: usize,
        hap: usize,
    ) {
        self.marker = marker;
        self.hap = hap;
        self.size = 0;
        self.fwd_value_sum = 0.0;
        self.bwd_value_sum = 0.0;
        self.al_probs.clear();
        self.al_probs.resize(al.marker(marker).n_alleles(), 0.0);

        for i in 0..nodes.size() {
            let node = nodes.enum_key(i)[0] as usize;
            let node_value = nodes.enum_value(i);
            for j in 0..dag.n_out_edges(marker, node) {
                let edge = dag.out_edge(marker, node, j);
                let symbol = dag.symbol(marker, edge);
                let ep = al.al(marker, hap, symbol);
                if ep > 0.0 {
                    let mut fwd = ep * node_value * dag.cond_edge_prob(marker, edge);
                    if fwd < MIN_STATE_VALUE {
                        fwd = MIN_STATE_VALUE;
                    }
                    self.push_state(edge, fwd);
                }
            }
        }
        nodes.clear();

        let sum: f32 = self.fwd_values[..self.size].iter().sum();
        self.fwd_value_sum = sum;
        if self.size > 0 {
            assert!(sum > 0.0, "forward value sum is not positive at marker {}", marker);
            for i in 0..self.size {
                self.fwd_values[i] /= sum;
            }
            for i in 0..self.size {
                let child = dag.child_node(marker, self.edges[i] as usize) as u32;
                nodes.sum_update([child], self.fwd_values[i]);
            }
        }
    }

    pub fn set_backward_values<A: AlleleLikelihoods>(
        &mut self,
        dag: &Dag,
        al: &A,
        nodes: &mut NodeMap<1>,
    ) {
        let marker = self.marker;
        self.bwd_value_sum = 0.0;
        for i in 0..self.size {
            let child = dag.child_node(marker, self.edges[i] as usize) as u32;
            let b = nodes.value([child]);
            self.bwd_values[i] = b;
            self.bwd_value_sum += b;
        }
        nodes.clear();
        assert!(
            self.bwd_value_sum > 0.0,
            "backward value sum is not positive at marker {}",
            marker
        );
        for i in 0..self.size {
            self.bwd_values[i] /= self.bwd_value_sum;
        }
        self.fill_al_probs(dag);
        for i in 0..self.size {
            let edge = self.edges[i] as usize;
            let ep = al.al(marker, self.hap, dag.symbol(marker, edge));
            let mut value = self.bwd_values[i] * dag.cond_edge_prob(marker, edge) * ep;
            if value > 0.0 {
                if value < MIN_STATE_VALUE {
                    value = MIN_STATE_VALUE;
                }
                nodes.sum_update([dag.parent_node(marker, edge) as u32], value);
            }
        }
    }

    pub fn set_initial_backward_values<A: AlleleLikelihoods>(
        &mut self,
        dag: &Dag,
        al: &A,
        nodes: &mut NodeMap<1>,
    ) {
        assert!(self.size > 0, "cannot initialize backward values on an empty level");
        let marker = self.marker;
        let bwd = 1.0 / self.size as f32;
        self.bwd_value_sum = 1.0;
        for i in 0..self.size {
            self.bwd_values[i] = bwd;
        }
        self.fill_al_probs(dag);
        nodes.clear();
        for i in 0..self.size {
            let edge = self.edges[i] as usize;
            let ep = al.al(marker, self.hap, dag.symbol(marker, edge));
            let mut value = bwd * dag.cond_edge_prob(marker, edge) * ep;
            if value > 0.0 {
                if value < MIN_STATE_VALUE {
                    value = MIN_STATE_VALUE;
                }
                nodes.sum_update([dag.parent_node(marker, edge) as u32], value);
            }
        }
    }

    fn fill_al_probs(&mut self, dag: &Dag) {
        for i in 0..self.size {
            let symbol = dag.symbol(self.marker, self.edges[i] as usize);
            self.al_probs[symbol] += self.fwd_values[i] * self.bwd_values[i];
        }
        let sum: f32 = self.al_probs.iter().sum();
        assert!(
            sum > 0.0,
            "posterior allele probabilities have no mass at marker {}",
            self.marker
        );
        self.al_probs.iter_mut().for_each(|p| *p /= sum);
    }

    pub fn set_child_nodes(&self, dag: &Dag, nodes: &mut NodeMap<1>) {
        nodes.clear();
        for i in 0..self.size {
            let child = dag.child_node(self.marker, self.edges[i] as usize) as u32;
            nodes.sum_update([child], self.fwd_values[i]);
        }
    }

    pub fn marker(&self) -> usize {
        self.marker
    }

    pub fn hap(&self) -> usize {
        self.hap
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn edge(&self, state: usize) -> usize {
        assert!(state < self.size);
        self.edges[state] as usize
    }

    pub fn fwd_value(&self, state: usize) -> f32 {
        assert!(state < self.size);
        self.fwd_values[state]
    }

    pub fn bwd_value(&self, state: usize) -> f32 {
        assert!(state < self.size);
        self.bwd_values[state]
    }

    pub fn fwd_value_sum(&self) -> f32 {
        self.fwd_value_sum
    }

    pub fn bwd_value_sum(&self) -> f32 {
        self.bwd_value_sum
    }

    /**
     * Posterior allele probabilities. Meaningful only after the backward
     * values have been set at this level.
     */
    pub fn al_probs(&self) -> &[f32] {
        &self.al_probs
    }

    pub fn capacity(&self) -> usize {
        self.edges.len()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.size = 0;
        self.edges = vec![0; capacity];
        self.fwd_values = vec![0.0; capacity];
        self.bwd_values = vec![0.0; capacity];
    }
}

impl Default for HapBaumLevel {
    fn default() -> HapBaumLevel {
        HapBaumLevel::new()
    }
}
