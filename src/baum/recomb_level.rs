use crate::baum::recomb_nodes::RecombNodes;
use crate::baum::MIN_STATE_VALUE;
use crate::dag::Dag;
use crate::ibd::permitted_states::DiploidStates;
use crate::model::genotype_index;
use crate::model::likelihoods::GenotypeLikelihoods;

/**
 * One level of the diploid Baum recursion with recombination-augmented
 * transitions. A state may be reached from any node pair of the previous
 * level: the transition mixes the no-jump term with one-sided and
 * two-sided jumps weighted by the per-marker jump probability, which the
 * frontier's row, column, and grand sums evaluate in constant time per
 * state. The state space is every ordered edge pair of the level, or the
 * pairs a permitted-state stream yields in the restricted variant.
 */
#[derive(Debug, Clone)]
pub struct RecombSingleBaumLevel {
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

impl RecombSingleBaumLevel {
    pub fn new() -> RecombSingleBaumLevel {
        RecombSingleBaumLevel {
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

    fn begin_forward<G: GenotypeLikelihoods>(&mut self, gl: &G, marker: usize, sample: usize) {
        self.marker = marker;
        self.sample = sample;
        self.size = 0;
        self.fwd_value_sum = 0.0;
        self.bwd_value_sum = 0.0;
        self.gt_probs.clear();
        self.gt_probs.resize(gl.marker(marker).n_genotypes(), 0.0);
    }

    fn transition_value(
        &self,
        dag: &Dag,
        nodes: &RecombNodes,
        p_recomb: f32,
        edge1: usize,
        edge2: usize,
    ) -> f32 {
        let marker = self.marker;
        let pn1 = dag.parent_node(marker, edge1) as u32;
        let pn2 = dag.parent_node(marker, edge2) as u32;
        let pp1 = dag.parent_prob(marker, pn1 as usize);
        let pp2 = dag.parent_prob(marker, pn2 as usize);
        let no_jump = 1.0 - p_recomb;
        no_jump * no_jump * nodes.value(pn1, pn2)
            + no_jump * p_recomb * pp2 * nodes.sum_node1(pn1)
            + p_recomb * no_jump * pp1 * nodes.sum_node2(pn2)
            + p_recomb * p_recomb * pp1 * pp2 * nodes.sum()
    }

    fn try_push_state<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &RecombNodes,
        p_recomb: f32,
        edge1: usize,
        edge2: usize,
    ) {
        let marker = self.marker;
        let symbol1 = dag.symbol(marker, edge1);
        let symbol2 = dag.symbol(marker, edge2);
        let ep = gl.gl(marker, self.sample, symbol1, symbol2);
        if ep > 0.0 {
            let tr = self.transition_value(dag, nodes, p_recomb, edge1, edge2);
            if tr > 0.0 {
                let mut fwd = ep
                    * dag.cond_edge_prob(marker, edge1)
                    * dag.cond_edge_prob(marker, edge2)
                    * tr;
                if fwd < MIN_STATE_VALUE {
                    fwd = MIN_STATE_VALUE;
                }
                self.push_state(edge1, edge2, fwd);
            }
        }
    }

    fn finish_forward(&mut self, dag: &Dag, nodes: &mut RecombNodes) {
        nodes.clear();
        let sum: f32 = self.fwd_values[..self.size].iter().sum();
        self.fwd_value_sum = sum;
        if self.size > 0 {
            assert!(
                sum > 0.0,
                "forward value sum is not positive at marker {}",
                self.marker
            );
            for i in 0..self.size {
                self.fwd_values[i] /= sum;
            }
            for i in 0..self.size {
                let child1 = dag.child_node(self.marker, self.edges1[i] as usize) as u32;
                let child2 = dag.child_node(self.marker, self.edges2[i] as usize) as u32;
                nodes.sum_update(child1, child2, self.fwd_values[i]);
            }
        }
    }

    /**
     * Forward update over every ordered edge pair of the level.
     */
    pub fn set_forward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut RecombNodes,
        p_recomb: &[f32],
        marker: usize,
        sample: usize,
    ) {
        self.begin_forward(gl, marker, sample);
        let r = p_recomb[marker];
        for edge1 in 0..dag.n_edges(marker) {
            for edge2 in 0..dag.n_edges(marker) {
                self.try_push_state(dag, gl, nodes, r, edge1, edge2);
            }
        }
        self.finish_forward(dag, nodes);
    }

    /**
     * Forward update restricted to the edge pairs the permitted-state
     * stream yields at this marker.
     */
    pub fn set_forward_values_restricted<G: GenotypeLikelihoods, S: DiploidStates + ?Sized>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut RecombNodes,
        p_recomb: &[f32],
        states: &mut S,
        marker: usize,
        sample: usize,
    ) {
        self.begin_forward(gl, marker, sample);
        let r = p_recomb[marker];
        states.set_marker(marker);
        while states.has_next() {
            states.next();
            self.try_push_state(dag, gl, nodes, r, states.edge1(), states.edge2());
        }
        self.finish_forward(dag, nodes);
    }

    /**
     * Backward update. The frontier holds the contributions pushed by the
     * next level keyed by its parent-node pairs; lookups through the row
     * and column sums divide by the marginal probability of the child node
     * they project away.
     */
    pub fn set_backward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut RecombNodes,
        p_recomb: &[f32],
    ) {
        let marker = self.marker;
        let next = marker + 1;
        let r = p_recomb[next];
        let no_jump = 1.0 - r;
        self.bwd_value_sum = 0.0;
        for i in 0..self.size {
            let child1 = dag.child_node(marker, self.edges1[i] as usize) as u32;
            let child2 = dag.child_node(marker, self.edges2[i] as usize) as u32;
            let pp1 = dag.parent_prob(next, child1 as usize);
            let pp2 = dag.parent_prob(next, child2 as usize);
            let b = no_jump * no_jump * nodes.value(child1, child2) / (pp1 * pp2)
                + no_jump * r * nodes.sum_node1(child1) / pp1
                + r * no_jump * nodes.sum_node2(child2) / pp2
                + r * r * nodes.sum();
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
        self.push_backward_frontier(dag, gl, nodes);
    }

    /**
     * Backward initialization at the final level.
     */
    pub fn set_initial_backward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut RecombNodes,
    ) {
        assert!(self.size > 0, "cannot initialize backward values on an empty level");
        let bwd = 1.0 / self.size as f32;
        self.bwd_value_sum = 1.0;
        for i in 0..self.size {
            self.bwd_values[i] = bwd;
        }
        self.fill_gt_probs(dag);
        nodes.clear();
        self.push_backward_frontier(dag, gl, nodes);
    }

    fn fill_gt_probs(&mut self, dag: &Dag) {
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

    fn push_backward_frontier<G: GenotypeLikelihoods>(
        &self,
        dag: &Dag,
        gl: &G,
        nodes: &mut RecombNodes,
    ) {
        let marker = self.marker;
        for i in 0..self.size {
            let e1 = self.edges1[i] as usize;
            let e2 = self.edges2[i] as usize;
            let pn1 = dag.parent_node(marker, e1);
            let pn2 = dag.parent_node(marker, e2);
            let ep = gl.gl(marker, self.sample, dag.symbol(marker, e1), dag.symbol(marker, e2));
            let mut value = self.bwd_values[i]
                * dag.cond_edge_prob(marker, e1)
                * dag.cond_edge_prob(marker, e2)
                * ep
                * dag.parent_prob(marker, pn1)
                * dag.parent_prob(marker, pn2);
            if value > 0.0 {
                if value < MIN_STATE_VALUE {
                    value = MIN_STATE_VALUE;
                }
                nodes.sum_update(pn1 as u32, pn2 as u32, value);
            }
        }
    }

    /**
     * Replaces the frontier with this level's child-node values. Used to
     * restore the forward frontier from a checkpoint level.
     */
    pub fn set_child_nodes(&self, dag: &Dag, nodes: &mut RecombNodes) {
        nodes.clear();
        for i in 0..self.size {
            let child1 = dag.child_node(self.marker, self.edges1[i] as usize) as u32;
            let child2 = dag.child_node(self.marker, self.edges2[i] as usize) as u32;
            nodes.sum_update(child1, child2, self.fwd_values[i]);
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

    pub fn gt_probs(&self) -> &[f32] {
        &self.gt_probs
    }

    pub fn capacity(&self) -> usize {
        self.edges1.len()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.size = 0;
        self.edges1 = vec![0; capacity];
        self.edges2 = vec![0; capacity];
        self.fwd_values = vec![0.0; capacity];
        self.bwd_values = vec![0.0; capacity];
    }
}

impl Default for RecombSingleBaumLevel {
    fn default() -> RecombSingleBaumLevel {
        RecombSingleBaumLevel::new()
    }
}
