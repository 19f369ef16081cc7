use crate::baum::node_map::NodeMap;
use crate::baum::MIN_STATE_VALUE;
use crate::dag::Dag;
use crate::model::genotype_index;
use crate::model::likelihoods::GenotypeLikelihoods;

/**
 * One level of the diploid Baum forward-backward recursion for a single
 * sample. The active states are ordered-edge pairs of the DAG level; the
 * forward pass consumes the node-pair frontier of the previous level and
 * replaces it with the child-node frontier, and the backward pass does the
 * mirror update and fills the posterior genotype probabilities.
 *
 * A level object is recycled across markers and samples by its driver, so
 * all state arrays are allocation-stable and explicitly sized.
 */
#[derive(Debug, Clone)]
pub struct SingleBaumLevel {
    marker: usize,
    sample: usize,
    size: usize,
    edges1: Vec<u32>,
    edges2: Vec<u32>,
    fwd_values: Vec<f32>,
    bwd_values: Vec<f32>,
    fwd_value_sum: f32,
    bwd_value_sum: f32,
    gt_probs: Vec<f32>,
}

impl SingleBaumLevel {
    pub fn new() -> SingleBaumLevel {
        SingleBaumLevel {
            marker: 0,
            sample: 0,
            size: 0,
            edges1: Vec::new(),
            edges2: Vec::new(),
            fwd_values: Vec::new(),
            bwd_values: Vec::new(),
            fwd_value_sum: 0.0,
            bwd_value_sum: 0.0,
            gt_probs: Vec::new(),
        }
    }

    fn push_state(&mut self, edge1: usize, edge2: usize, fwd_value: f32) {
        if self.size == self.edges1.len() {
            let new_capacity = std::cmp::max(self.size + 1, 3 * self.edges1.len() / 2 + 1);
            self.edges1.resize(new_capacity, 0);
            self.edges2.resize(new_capacity, 0);
            self.fwd_values.resize(new_capacity, 0.0);
            self.bwd_values.resize(new_capacity, 0.0);
        }
        self.edges1[self.size] = edge1 as u32;
        self.edges2[self.size] = edge2 as u32;
        self.fwd_values[self.size] = fwd_value;
        self.size += 1;
    }

    /**
     * Initializes the level from the forward frontier of the previous
     * level, normalizes the forward values, and replaces the frontier with
     * the accumulated child-node values.
     */
    pub fn set_forward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut NodeMap<2>,
        marker: usize,
        sample: usize,
    ) {
        self.marker = marker;
        self.sample = sample;
        self.size = 0;
        self.fwd_value_sum = 0.0;
        self.bwd_value_sum = 0.0;
        self.gt_probs.clear();
        self.gt_probs.resize(gl.marker(marker).n_genotypes(), 0.0);

        for i in 0..nodes.size() {
            let key = nodes.enum_key(i);
            let node_value = nodes.enum_value(i);
            let (n1, n2) = (key[0] as usize, key[1] as usize);
            for j1 in 0..dag.n_out_edges(marker, n1) {
                let e1 = dag.out_edge(marker, n1, j1);
                let symbol1 = dag.symbol(marker, e1);
                for j2 in 0..dag.n_out_edges(marker, n2) {
                    let e2 = dag.out_edge(marker, n2, j2);
                    let symbol2 = dag.symbol(marker, e2);
                    let ep = gl.gl(marker, sample, symbol1, symbol2);
                    if ep > 0.0 {
                        let mut fwd = ep
                            * node_value
                            * dag.cond_edge_prob(marker, e1)
                            * dag.cond_edge_prob(marker, e2);
                        if fwd < MIN_STATE_VALUE {
                            fwd = MIN_STATE_VALUE;
                        }
                        self.push_state(e1, e2, fwd);
                    }
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
                let child1 = dag.child_node(marker, self.edges1[i] as usize) as u32;
                let child2 = dag.child_node(marker, self.edges2[i] as usize) as u32;
                nodes.sum_update([child1, child2], self.fwd_values[i]);
            }
        }
    }

    /**
     * Consumes the backward frontier of the next level, normalizes the
     * backward values, fills the posterior genotype probabilities, and
     * replaces the frontier with the parent-node contributions of this
     * level.
     */
    pub fn set_backward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut NodeMap<2>,
    ) {
        let marker = self.marker;
        self.bwd_value_sum = 0.0;
        for i in 0..self.size {
            let child1 = dag.child_node(marker, self.edges1[i] as usize) as u32;
            let child2 = dag.child_node(marker, self.edges2[i] as usize) as u32;
            let b = nodes.value([child1, child2]);
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
        self.fill_gt_probs(dag);
        for i in 0..self.size {
            let e1 = self.edges1[i] as usize;
            let e2 = self.edges2[i] as usize;
            let ep = gl.gl(marker, self.sample, dag.symbol(marker, e1), dag.symbol(marker, e2));
            let mut value = self.bwd_values[i]
                * dag.cond_edge_prob(marker, e1)
                * dag.cond_edge_prob(marker, e2)
                * ep;
            if value > 0.0 {
                if value < MIN_STATE_VALUE {
                    value = MIN_STATE_VALUE;
                }
                let parent1 = dag.parent_node(marker, e1) as u32;
                let parent2 = dag.parent_node(marker, e2) as u32;
                nodes.sum_update([parent1, parent2], value);
            }
        }
    }

    /**
     * Backward initialization at the final level: uniform backward values,
     * posterior genotype probabilities proportional to the forward values,
     * and the parent-node frontier of this level.
     */
    pub fn set_initial_backward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut NodeMap<2>,
    ) {
        assert!(self.size > 0, "cannot initialize backward values on an empty level");
        let marker = self.marker;
        let bwd = 1.0 / self.size as f32;
        self.bwd_value_sum = 1.0;
        for i in 0..self.size {
            self.bwd_values[i] = bwd;
        }
        self.fill_gt_probs(dag);
        nodes.clear();
        for i in 0..self.size {
            let e1 = self.edges1[i] as usize;
            let e2 = self.edges2[i] as usize;
            let ep = gl.gl(marker, self.sample, dag.symbol(marker, e1), dag.symbol(marker, e2));
            let mut value = bwd
                * dag.cond_edge_prob(marker, e1)
                * dag.cond_edge_prob(marker, e2)
                * ep;
            if value > 0.0 {
                if value < MIN_STATE_VALUE {
                    value = MIN_STATE_VALUE;
                }
                let parent1 = dag.parent_node(marker, e1) as u32;
                let parent2 = dag.parent_node(marker, e2) as u32;
                nodes.sum_update([parent1, parent2], value);
            }
        }
    }

    fn fill_gt_probs(&mut self, dag: &Dag) {
        // gt_probs was zeroed by set_forward_values
        for i in 0..self.size {
            let symbol1 = dag.symbol(self.marker, self.edges1[i] as usize);
            let symbol2 = dag.symbol(self.marker, self.edges2[i] as usize);
            let state_prob = self.fwd_values[i] * self.bwd_values[i];
            self.gt_probs[genotype_index(symbol1, symbol2)] += state_prob;
        }
        let sum: f32 = self.gt_probs.iter().sum();
        assert!(
            sum > 0.0,
            "posterior genotype probabilities have no mass at marker {}",
            self.marker
        );
        self.gt_probs.iter_mut().for_each(|p| *p /= sum);
    }

    /**
     * Replaces the frontier with this level's child-node values. Used to
     * restore the forward frontier from a checkpoint level.
     */
    pub fn set_child_nodes(&self, dag: &Dag, nodes: &mut NodeMap<2>) {
        nodes.clear();
        for i in 0..self.size {
            let child1 = dag.child_node(self.marker, self.edges1[i] as usize) as u32;
            let child2 = dag.child_node(self.marker, self.edges2[i] as usize) as u32;
            nodes.sum_update([child1, child2], self.fwd_values[i]);
        }
    }

    pub fn marker(&self) -> usize {
        self.marker
    }

    pub fn sample(&self) -> usize {
        self.sample
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn edge1(&self, state: usize) -> usize {
        assert!(state < self.size);
        self.edges1[state] as usize
    }

    pub fn edge2(&self, state: usize) -> usize {
        assert!(state < self.size);
        self.edges2[state] as usize
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
     * Posterior genotype probabilities. Meaningful only after the backward
     * values have been set at this level.
     */
    pub fn gt_probs(&self) -> &[f32] {
        &self.gt_probs
    }

    pub fn capacity(&self) -> usize {
        self.edges1.len()
    }

    /**
     * Discards the state arrays and reallocates them with the target
     * capacity. The level must be reinitialized before further use.
     */
    pub fn set_capacity(&mut self, capacity: usize) {
        self.size = 0;
        self.edges1 = vec![0; capacity];
        self.edges2 = vec![0; capacity];
        self.fwd_values = vec![0.0; capacity];
        self.bwd_values = vec![0.0; capacity];
    }
}

impl Default for SingleBaumLevel {
    fn default() -> SingleBaumLevel {
        SingleBaumLevel::new()
    }
}
