use crate::baum::node_map::NodeMap;
use crate::baum::MIN_STATE_VALUE;
use crate::dag::Dag;
use crate::model::genotype_index;
use crate::model::likelihoods::GenotypeLikelihoods;

/**
 * One level of the parent-offspring duo Baum recursion. The active states
 * are edge triples: the transmitted haplotype shared by parent and
 * offspring, the parent's untransmitted haplotype, and the offspring's
 * untransmitted haplotype. Emission is the product of the two individual
 * genotype likelihoods, and the backward pass fills a posterior genotype
 * distribution for each individual.
 */
#[derive(Debug, Clone)]
pub struct DuoBaumLevel {
    marker: usize,
    sample_a: usize,
    sample_b: usize,
    size: usize,
    edges_ab1: Vec<u32>,
    edges_a2: Vec<u32>,
    edges_b2: Vec<u32>,
    fwd_values: Vec<f32>,
    bwd_values: Vec<f32>,
    fwd_value_sum: f32,
    bwd_value_sum: f32,
    gt_probs_a: Vec<f32>,
    gt_probs_b: Vec<f32>,
}

impl DuoBaumLevel {
    pub fn new() -> DuoBaumLevel {
        DuoBaumLevel {
            marker: 0,
            sample_a: 0,
            sample_b: 0,
            size: 0,
            edges_ab1: Vec::new(),
            edges_a2: Vec::new(),
            edges_b2: Vec::new(),
            fwd_values: Vec::new(),
            bwd_values: Vec::new(),
            fwd_value_sum: 0.0,
            bwd_value_sum: 0.0,
            gt_probs_a: Vec::new(),
            gt_probs_b: Vec::new(),
        }
    }

    fn push_state(&mut self, edge_ab1: usize, edge_a2: usize, edge_b2: usize, fwd_value: f32) {
        if self.size == self.edges_ab1.len() {
            let new_capacity = std::cmp::max(self.size + 1, 3 * self.edges_ab1.len() / 2 + 1);
            self.edges_ab1.resize(new_capacity, 0);
            self.edges_a2.resize(new_capacity, 0);
            self.edges_b2.resize(new_capacity, 0);
            self.fwd_values.resize(new_capacity, 0.0);
            self.bwd_values.resize(new_capacity, 0.0);
        }
        self.edges_ab1[self.size] = edge_ab1 as u32;
        self.edges_a2[self.size] = edge_a2 as u32;
        self.edges_b2[self.size] = edge_b2 as u32;
        self.fwd_values[self.size] = fwd_value;
        self.size += 1;
    }

    pub fn set_forward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut NodeMap<3>,
        marker: usize,
        sample_a: usize,
        sample_b: usize,
    ) {
        self.marker = marker;
        self.sample_a = sample_a;
        self.sample_b = sample_b;
        self.size = 0;
        self.fwd_value_sum = 0.0;
        self.bwd_value_sum = 0.0;
        let n_genotypes = gl.marker(marker).n_genotypes();
        self.gt_probs_a.clear();
        self.gt_probs_a.resize(n_genotypes, 0.0);
        self.gt_probs_b.clear();
        self.gt_probs_b.resize(n_genotypes, 0.0);

        for i in 0..nodes.size() {
            let key = nodes.enum_key(i);
            let node_value = nodes.enum_value(i);
            let (n_ab1, n_a2, n_b2) = (key[0] as usize, key[1] as usize, key[2] as usize);
            for j1 in 0..dag.n_out_edges(marker, n_ab1) {
                let e_ab1 = dag.out_edge(marker, n_ab1, j1);
                let s_ab1 = dag.symbol(marker, e_ab1);
                for j2 in 0..dag.n_out_edges(marker, n_a2) {
                    let e_a2 = dag.out_edge(marker, n_a2, j2);
                    let s_a2 = dag.symbol(marker, e_a2);
                    let ep_a = gl.gl(marker, sample_a, s_ab1, s_a2);
                    if ep_a <= 0.0 {
                        continue;
                    }
                    for j3 in 0..dag.n_out_edges(marker, n_b2) {
                        let e_b2 = dag.out_edge(marker, n_b2, j3);
                        let s_b2 = dag.symbol(marker, e_b2);
                        let ep = ep_a * gl.gl(marker, sample_b, s_ab1, s_b2);
                        if ep > 0.0 {
                            let mut fwd = ep
                                * node_value
                                * dag.cond_edge_prob(marker, e_ab1)
                                * dag.cond_edge_prob(marker, e_a2)
                                * dag.cond_edge_prob(marker, e_b2);
                            if fwd < MIN_STATE_VALUE {
                                fwd = MIN_STATE_VALUE;
                            }
                            self.push_state(e_ab1, e_a2, e_b2, fwd);
                        }
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
                let child_ab1 = dag.child_node(marker, self.edges_ab1[i] as usize) as u32;
                let child_a2 = dag.child_node(marker, self.edges_a2[i] as usize) as u32;
                let child_b2 = dag.child_node(marker, self.edges_b2[i] as usize) as u32;
                nodes.sum_update([child_ab1, child_a2, child_b2], self.fwd_values[i]);
            }
        }
    }

    pub fn set_backward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut NodeMap<3>,
    ) {
        let marker = self.marker;
        self.bwd_value_sum = 0.0;
        for i in 0..self.size {
            let child_ab1 = dag.child_node(marker, self.edges_ab1[i] as usize) as u32;
            let child_a2 = dag.child_node(marker, self.edges_a2[i] as usize) as u32;
            let child_b2 = dag.child_node(marker, self.edges_b2[i] as usize) as u32;
            let b = nodes.value([child_ab1, child_a2, child_b2]);
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
            let (e_ab1, e_a2, e_b2) = self.state_edges(i);
            let ep = self.emission(dag, gl, e_ab1, e_a2, e_b2);
            let mut value = self.bwd_values[i]
                * dag.cond_edge_prob(marker, e_ab1)
                * dag.cond_edge_prob(marker, e_a2)
                * dag.cond_edge_prob(marker, e_b2)
                * ep;
            if value > 0.0 {
                if value < MIN_STATE_VALUE {
                    value = MIN_STATE_VALUE;
                }
                let parent_ab1 = dag.parent_node(marker, e_ab1) as u32;
                let parent_a2 = dag.parent_node(marker, e_a2) as u32;
                let parent_b2 = dag.parent_node(marker, e_b2) as u32;
                nodes.sum_update([parent_ab1, parent_a2, parent_b2], value);
            }
        }
    }

    pub fn set_initial_backward_values<G: GenotypeLikelihoods>(
        &mut self,
        dag: &Dag,
        gl: &G,
        nodes: &mut NodeMap<3>,
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
            let (e_ab1, e_a2, e_b2) = self.state_edges(i);
            let ep = self.emission(dag, gl, e_ab1, e_a2, e_b2);
            let mut value = bwd
                * dag.cond_edge_prob(marker, e_ab1)
                * dag.cond_edge_prob(marker, e_a2)
                * dag.cond_edge_prob(marker, e_b2)
                * ep;
            if value > 0.0 {
                if value < MIN_STATE_VALUE {
                    value = MIN_STATE_VALUE;
                }
                let parent_ab1 = dag.parent_node(marker, e_ab1) as u32;
                let parent_a2 = dag.parent_node(marker, e_a2) as u32;
                let parent_b2 = dag.parent_node(marker, e_b2) as u32;
                nodes.sum_update([parent_ab1, parent_a2, parent_b2], value);
            }
        }
    }

    fn state_edges(&self, state: usize) -> (usize, usize, usize) {
        (
            self.edges_ab1[state] as usize,
            self.edges_a2[state] as usize,
            self.edges_b2[state] as usize,
        )
    }

    fn emission<G: GenotypeLikelihoods>(
        &self,
        dag: &Dag,
        gl: &G,
        e_ab1: usize,
        e_a2: usize,
        e_b2: usize,
    ) -> f32 {
        let marker = self.marker;
        let s_ab1 = dag.symbol(marker, e_ab1);
        let s_a2 = dag.symbol(marker, e_a2);
        let s_b2 = dag.symbol(marker, e_b2);
        gl.gl(marker, self.sample_a, s_ab1, s_a2) * gl.gl(marker, self.sample_b, s_ab1, s_b2)
    }

    fn fill_gt_probs(&mut self, dag: &Dag) {
        for i in 0..self.size {
            let (e_ab1, e_a2, e_b2) = self.state_edges(i);
            let s_ab1 = dag.symbol(self.marker, e_ab1);
            let s_a2 = dag.symbol(self.marker, e_a2);
            let s_b2 = dag.symbol(self.marker, e_b2);
            let state_prob = self.fwd_values[i] * self.bwd_values[i];
            self.gt_probs_a[genotype_index(s_ab1, s_a2)] += state_prob;
            self.gt_probs_b[genotype_index(s_ab1, s_b2)] += state_prob;
        }
        let sum_a: f32 = self.gt_probs_a.iter().sum();
        let sum_b: f32 = self.gt_probs_b.iter().sum();
        assert!(
            sum_a > 0.0 && sum_b > 0.0,
            "posterior genotype probabilities have no mass at marker {}",
            self.marker
        );
        self.gt_probs_a.iter_mut().for_each(|p| *p /= sum_a);
        self.gt_probs_b.iter_mut().for_each(|p| *p /= sum_b);
    }

    pub fn set_child_nodes(&self, dag: &Dag, nodes: &mut NodeMap<3>) {
        nodes.clear();
        for i in 0..self.size {
            let child_ab1 = dag.child_node(self.marker, self.edges_ab1[i] as usize) as u32;
            let child_a2 = dag.child_node(self.marker, self.edges_a2[i] as usize) as u32;
            let child_b2 = dag.child_node(self.marker, self.edges_b2[i] as usize) as u32;
            nodes.sum_update([child_ab1, child_a2, child_b2], self.fwd_values[i]);
        }
    }

    pub fn marker(&self) -> usize {
        self.marker
    }

    pub fn sample_a(&self) -> usize {
        self.sample_a
    }

    pub fn sample_b(&self) -> usize {
        self.sample_b
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn edge_ab1(&self, state: usize) -> usize {
        assert!(state < self.size);
        self.edges_ab1[state] as usize
    }

    pub fn edge_a2(&self, state: usize) -> usize {
        assert!(state < self.size);
        self.edges_a2[state] as usize
    }

    pub fn edge_b2(&self, state: usize) -> usize {
        assert!(state < self.size);
        self.edges_b2[state] as usize
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

    pub fn gt_probs_a(&self) -> &[f32] {
        &self.gt_probs_a
    }

    pub fn gt_probs_b(&self) -> &[f32] {
        &self.gt_probs_b
    }

    pub fn capacity(&self) -> usize {
        self.edges_ab1.len()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.size = 0;
        self.edges_ab1 = vec![0; capacity];
        self.edges_a2 = vec![0; capacity];
        self.edges_b2 = vec![0; capacity];
        self.fwd_values = vec![0.0; capacity];
        self.bwd_values = vec![0.0; capacity];
    }
}

impl Default for DuoBaumLevel {
    fn default() -> DuoBaumLevel {
        DuoBaumLevel::new()
    }
}
