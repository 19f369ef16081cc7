use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::baum::recomb_level::RecombSingleBaumLevel;
use crate::baum::recomb_nodes::RecombNodes;
use crate::baum::single_baum::check_dag_and_gl;
use crate::baum::{checkpoint_window, mix_seed, PRUNE_SAMPLE_SIZE};
use crate::dag::Dag;
use crate::errors::HmmError;
use crate::haplotype::hap_pair::BitHapPair;
use crate::ibd::permitted_states::DiploidStates;
use crate::model::likelihoods::GenotypeLikelihoods;

/**
 * Diploid haplotype sampler with recombination-augmented transitions.
 * Shares the windowed checkpointing and traceback structure of the
 * no-recombination sampler, but every edge pair is reachable at every
 * level through the jump terms, and the diploid state space may be
 * restricted to a permitted-state stream built from shared IBS segments.
 */
pub struct RecombSingleBaum<'a, G: GenotypeLikelihoods> {
    dag: &'a Dag,
    gl: &'a G,
    seed: i64,
    n_copies: usize,
    p_recomb: Vec<f32>,
    rng: StdRng,
    levels: Vec<RecombSingleBaumLevel>,
    fwd_nodes: RecombNodes,
    bwd_nodes: RecombNodes,
    window_index: isize,
    array_index: isize,
    node1: Vec<u32>,
    node2: Vec<u32>,
    node_value: Vec<f64>,
    tr_factor: Vec<f64>,
    alleles1: Vec<Vec<usize>>,
    alleles2: Vec<Vec<usize>>,
}

impl<'a, G: GenotypeLikelihoods> RecombSingleBaum<'a, G> {
    /**
     * @param p_recomb the per-level recombination jump probability; the
     * entry for the first level is ignored
     */
    pub fn new(
        dag: &'a Dag,
        gl: &'a G,
        seed: i64,
        n_copies: usize,
        low_mem: bool,
        p_recomb: Vec<f32>,
    ) -> Result<RecombSingleBaum<'a, G>, HmmError> {
        check_dag_and_gl(dag, gl)?;
        if n_copies == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "at least one haplotype pair must be sampled per individual".to_string(),
            });
        }
        if p_recomb.len() != dag.n_levels() {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "{} recombination probabilities for {} DAG levels",
                    p_recomb.len(),
                    dag.n_levels()
                ),
            });
        }
        if p_recomb.iter().any(|r| !(*r >= 0.0 && *r < 1.0)) {
            return Err(HmmError::InconsistentInputs {
                msg: "recombination probabilities must lie in [0, 1)".to_string(),
            });
        }
        let window = checkpoint_window(dag.n_levels(), low_mem);
        Ok(RecombSingleBaum {
            dag,
            gl,
            seed,
            n_copies,
            p_recomb,
            rng: StdRng::seed_from_u64(seed as u64),
            levels: (0..window).map(|_| RecombSingleBaumLevel::new()).collect(),
            fwd_nodes: RecombNodes::new(),
            bwd_nodes: RecombNodes::new(),
            window_index: 0,
            array_index: -1,
            node1: vec![0; n_copies],
            node2: vec![0; n_copies],
            node_value: vec![0.0; n_copies],
            tr_factor: vec![0.0; n_copies],
            alleles1: vec![Vec::new(); n_copies],
            alleles2: vec![Vec::new(); n_copies],
        })
    }

    pub fn n_copies(&self) -> usize {
        self.n_copies
    }

    pub fn random_sample(&mut self, sample: usize) -> Result<Vec<BitHapPair>, HmmError> {
        self.sample_internal(sample, None, None)
    }

    pub fn random_sample_probs(
        &mut self,
        sample: usize,
        gt_probs: &mut [f32],
    ) -> Result<Vec<BitHapPair>, HmmError> {
        let markers = self.gl.markers();
        assert_eq!(
            gt_probs.len(),
            markers.sum_genotypes(markers.n_markers()),
            "posterior genotype slice has wrong length"
        );
        self.sample_internal(sample, Some(gt_probs), None)
    }

    /**
     * Samples haplotype pairs with the diploid state space restricted to
     * the pairs yielded by the permitted-state stream.
     */
    pub fn random_restricted_sample(
        &mut self,
        sample: usize,
        states: &mut dyn DiploidStates,
        gt_probs: Option<&mut [f32]>,
    ) -> Result<Vec<BitHapPair>, HmmError> {
        if states.n_markers() != self.dag.n_levels() {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "permitted-state stream covers {} markers but the DAG has {} levels",
                    states.n_markers(),
                    self.dag.n_levels()
                ),
            });
        }
        self.sample_internal(sample, gt_probs, Some(states))
    }

    fn sample_internal(
        &mut self,
        sample: usize,
        mut gt_probs: Option<&mut [f32]>,
        mut states: Option<&mut dyn DiploidStates>,
    ) -> Result<Vec<BitHapPair>, HmmError> {
        let n_markers = self.dag.n_levels();
        assert!(sample < self.gl.n_samples(), "sample index out of bounds: {}", sample);
        self.rng = StdRng::seed_from_u64(mix_seed(self.seed, sample));
        for copy in 0..self.n_copies {
            self.alleles1[copy].clear();
            self.alleles1[copy].resize(n_markers, 0);
            self.alleles2[copy].clear();
            self.alleles2[copy].resize(n_markers, 0);
        }

        self.forward_algorithm(sample, &mut states)?;

        let last = self.array_index as usize;
        for copy in 0..self.n_copies {
            self.init_sample_alleles(last, copy);
        }
        if let Some(probs) = gt_probs.as_deref_mut() {
            self.levels[last].set_initial_backward_values(self.dag, self.gl, &mut self.bwd_nodes);
            self.copy_gt_probs(last, probs);
        }
        for _m in (0..n_markers - 1).rev() {
            let level = self.previous_level(sample, &mut states);
            for copy in 0..self.n_copies {
                self.sample_alleles(level, copy);
            }
            if let Some(probs) = gt_probs.as_deref_mut() {
                self.levels[level].set_backward_values(
                    self.dag,
                    self.gl,
                    &mut self.bwd_nodes,
                    &self.p_recomb,
                );
                self.copy_gt_probs(level, probs);
            }
        }
        self.bwd_nodes.clear();
        self.prune_levels();

        let markers = self.gl.markers().clone();
        Ok((0..self.n_copies)
            .map(|copy| {
                BitHapPair::new(
                    markers.clone(),
                    sample,
                    &self.alleles1[copy],
                    &self.alleles2[copy],
                )
            })
            .collect())
    }

    fn forward_algorithm(
        &mut self,
        sample: usize,
        states: &mut Option<&mut dyn DiploidStates>,
    ) -> Result<(), HmmError> {
        self.fwd_nodes.clear();
        for n1 in 0..self.dag.n_parent_nodes(0) {
            let p1 = self.dag.parent_prob(0, n1);
            for n2 in 0..self.dag.n_parent_nodes(0) {
                let p = p1 * self.dag.parent_prob(0, n2);
                if p > 0.0 {
                    self.fwd_nodes.sum_update(n1 as u32, n2 as u32, p);
                }
            }
        }
        self.window_index = 0;
        self.array_index = -1;
        for marker in 0..self.dag.n_levels() {
            let index = self.next_level_index();
            self.set_level_forward(index, marker, sample, states);
            if self.levels[index].size() == 0 {
                return Err(HmmError::NoConsistentState { marker, sample });
            }
        }
        Ok(())
    }

    fn set_level_forward(
        &mut self,
        index: usize,
        marker: usize,
        sample: usize,
        states: &mut Option<&mut dyn DiploidStates>,
    ) {
        match states {
            Some(states) => self.levels[index].set_forward_values_restricted(
                self.dag,
                self.gl,
                &mut self.fwd_nodes,
                &self.p_recomb,
                &mut **states,
                marker,
                sample,
            ),
            None => self.levels[index].set_forward_values(
                self.dag,
                self.gl,
                &mut self.fwd_nodes,
                &self.p_recomb,
                marker,
                sample,
            ),
        }
    }

    fn next_level_index(&mut self) -> usize {
        self.array_index += 1;
        if self.array_index as usize == self.levels.len() {
            self.window_index += 1;
            self.array_index = self.window_index;
        }
        self.array_index as usize
    }

    fn previous_level(
        &mut self,
        sample: usize,
        states: &mut Option<&mut dyn DiploidStates>,
    ) -> usize {
        if self.array_index == self.window_index {
            self.window_index -= 1;
            let checkpoint = self.window_index as usize;
            self.array_index = self.window_index;
            self.levels[checkpoint].set_child_nodes(self.dag, &mut self.fwd_nodes);
            let start = self.levels[checkpoint].marker() + 1;
            let end = start + (self.levels.len() - checkpoint - 1);
            for marker in start..end {
                let index = self.next_level_index();
                self.set_level_forward(index, marker, sample, states);
            }
            self.array_index as usize
        } else {
            self.array_index -= 1;
            self.array_index as usize
        }
    }

    fn init_sample_alleles(&mut self, level: usize, copy: usize) {
        let d = self.rng.gen::<f64>();
        let size = self.levels[level].size();
        let mut state = size - 1;
        let mut sum = 0f64;
        for j in 0..size {
            sum += self.levels[level].fwd_value(j) as f64;
            if d <= sum {
                state = j;
                break;
            }
        }
        self.save_current_data(level, copy, state);
    }

    fn save_current_data(&mut self, level: usize, copy: usize, state: usize) {
        let lv = &self.levels[level];
        let marker = lv.marker();
        let e1 = lv.edge1(state);
        let e2 = lv.edge2(state);
        let symbol1 = self.dag.symbol(marker, e1);
        let symbol2 = self.dag.symbol(marker, e2);
        let ep = self.gl.gl(marker, lv.sample(), symbol1, symbol2);
        self.node1[copy] = self.dag.parent_node(marker, e1) as u32;
        self.node2[copy] = self.dag.parent_node(marker, e2) as u32;
        self.node_value[copy] = lv.fwd_value(state) as f64 * lv.fwd_value_sum() as f64 / ep as f64;
        self.tr_factor[copy] = self.dag.cond_edge_prob(marker, e1) as f64
            * self.dag.cond_edge_prob(marker, e2) as f64;
        self.alleles1[copy][marker] = symbol1;
        self.alleles2[copy][marker] = symbol2;
    }

    /**
     * Draws the state at this level conditional on the state sampled at
     * the next level, weighting every state by the mixed transition into
     * the sampled node pair. Cumulative rounding may leave the draw
     * uncovered, in which case the last state is taken.
     */
    fn sample_alleles(&mut self, level: usize, copy: usize) {
        let marker = self.levels[level].marker();
        let next = marker + 1;
        let r = self.p_recomb[next] as f64;
        let no_jump = 1.0 - r;
        let n1 = self.node1[copy];
        let n2 = self.node2[copy];
        let pp1 = self.dag.parent_prob(next, n1 as usize) as f64;
        let pp2 = self.dag.parent_prob(next, n2 as usize) as f64;
        let d = self.rng.gen::<f64>() * self.node_value[copy];
        let size = self.levels[level].size();
        let mut state = size - 1;
        let mut sum = 0f64;
        for j in 0..size {
            let c1 = self.dag.child_node(marker, self.levels[level].edge1(j)) as u32;
            let c2 = self.dag.child_node(marker, self.levels[level].edge2(j)) as u32;
            let mut tp = r * r * pp1 * pp2;
            if c1 == n1 {
                tp += no_jump * r * pp2;
                if c2 == n2 {
                    tp += no_jump * no_jump;
                }
            }
            if c2 == n2 {
                tp += r * no_jump * pp1;
            }
            sum += self.levels[level].fwd_value(j) as f64 * self.tr_factor[copy] * tp;
            if d <= sum {
                state = j;
                break;
            }
        }
        if d > sum {
            trace!("traceback cumulative sum fell short of the draw at marker {}", marker);
        }
        self.save_current_data(level, copy, state);
    }

    fn copy_gt_probs(&self, level: usize, gt_probs: &mut [f32]) {
        let markers = self.gl.markers();
        let marker = self.levels[level].marker();
        let start = markers.sum_genotypes(marker);
        let end = markers.sum_genotypes(marker + 1);
        gt_probs[start..end].copy_from_slice(self.levels[level].gt_probs());
    }

    fn prune_levels(&mut self) {
        let n = self.levels.len();
        let mut total = 0usize;
        for _ in 0..PRUNE_SAMPLE_SIZE {
            let i = self.rng.gen_range(0, n);
            total += self.levels[i].capacity();
        }
        let mean = total as f64 / PRUNE_SAMPLE_SIZE as f64;
        let target = (1.5 * mean) as usize + 1;
        for level in self.levels.iter_mut() {
            if level.capacity() as f64 > 3.0 * mean {
                debug!(
                    "resetting level capacity from {} to {}",
                    level.capacity(),
                    target
                );
                level.set_capacity(target);
            }
        }
    }
}
