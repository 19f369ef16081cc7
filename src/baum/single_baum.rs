use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::baum::node_map::NodeMap;
use crate::baum::single_level::SingleBaumLevel;
use crate::baum::{checkpoint_window, mix_seed, PRUNE_SAMPLE_SIZE};
use crate::dag::Dag;
use crate::errors::HmmError;
use crate::haplotype::hap_pair::BitHapPair;
use crate::model::likelihoods::GenotypeLikelihoods;

/**
 * Diploid haplotype sampler for one individual at a time. Runs the Baum
 * forward recursion over the DAG with windowed checkpointing, then draws
 * haplotype pairs from the posterior by stochastic traceback, re-running
 * stretches of the forward recursion when a needed level has been evicted
 * from the window. One instance is confined to one worker thread; the
 * random stream is re-derived from (seed, sample) so output is identical
 * for any work schedule.
 */
pub struct SingleBaum<'a, G: GenotypeLikelihoods> {
    dag: &'a Dag,
    gl: &'a G,
    seed: i64,
    n_copies: usize,
    rng: StdRng,
    levels: Vec<SingleBaumLevel>,
    fwd_nodes: NodeMap<2>,
    bwd_nodes: NodeMap<2>,
    window_index: isize,
    array_index: isize,
    node1: Vec<u32>,
    node2: Vec<u32>,
    node_value: Vec<f64>,
    tr_factor: Vec<f64>,
    alleles1: Vec<Vec<usize>>,
    alleles2: Vec<Vec<usize>>,
}

impl<'a, G: GenotypeLikelihoods> SingleBaum<'a, G> {
    /**
     * @param n_copies the number of haplotype pairs sampled per individual
     * @param low_mem selects the windowed checkpointing scheme over
     * storing every level
     */
    pub fn new(
        dag: &'a Dag,
        gl: &'a G,
        seed: i64,
        n_copies: usize,
        low_mem: bool,
    ) -> Result<SingleBaum<'a, G>, HmmError> {
        check_dag_and_gl(dag, gl)?;
        if n_copies == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "at least one haplotype pair must be sampled per individual".to_string(),
            });
        }
        let window = checkpoint_window(dag.n_levels(), low_mem);
        Ok(SingleBaum {
            dag,
            gl,
            seed,
            n_copies,
            rng: StdRng::seed_from_u64(seed as u64),
            levels: (0..window).map(|_| SingleBaumLevel::new()).collect(),
            fwd_nodes: NodeMap::new(),
            bwd_nodes: NodeMap::new(),
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

    /**
     * Samples haplotype pairs for sample from the posterior.
     */
    pub fn random_sample(&mut self, sample: usize) -> Result<Vec<BitHapPair>, HmmError> {
        self.sample_internal(sample, None)
    }

    /**
     * Samples haplotype pairs and fills gt_probs with the posterior
     * genotype probabilities of every marker. The slice length must equal
     * the genotype prefix sum over all markers.
     */
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
        self.sample_internal(sample, Some(gt_probs))
    }

    fn sample_internal(
        &mut self,
        sample: usize,
        mut gt_probs: Option<&mut [f32]>,
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

        self.forward_algorithm(sample)?;

        let last = self.array_index as usize;
        for copy in 0..self.n_copies {
            self.init_sample_alleles(last, copy);
        }
        if let Some(probs) = gt_probs.as_deref_mut() {
            self.levels[last].set_initial_backward_values(self.dag, self.gl, &mut self.bwd_nodes);
            self.copy_gt_probs(last, probs);
        }
        for _m in (0..n_markers - 1).rev() {
            let level = self.previous_level(sample);
            for copy in 0..self.n_copies {
                self.sample_alleles(level, copy);
            }
            if let Some(probs) = gt_probs.as_deref_mut() {
                self.levels[level].set_backward_values(self.dag, self.gl, &mut self.bwd_nodes);
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

    fn forward_algorithm(&mut self, sample: usize) -> Result<(), HmmError> {
        self.fwd_nodes.clear();
        for n1 in 0..self.dag.n_parent_nodes(0) {
            let p1 = self.dag.parent_prob(0, n1);
            for n2 in 0..self.dag.n_parent_nodes(0) {
                let p = p1 * self.dag.parent_prob(0, n2);
                if p > 0.0 {
                    self.fwd_nodes.sum_update([n1 as u32, n2 as u32], p);
                }
            }
        }
        self.window_index = 0;
        self.array_index = -1;
        for marker in 0..self.dag.n_levels() {
            let index = self.next_level_index();
            self.levels[index].set_forward_values(
                self.dag,
                self.gl,
                &mut self.fwd_nodes,
                marker,
                sample,
            );
            if self.levels[index].size() == 0 {
                return Err(HmmError::NoConsistentState { marker, sample });
            }
        }
        Ok(())
    }

    fn next_level_index(&mut self) -> usize {
        self.array_index += 1;
        if self.array_index as usize == self.levels.len() {
            self.window_index += 1;
            self.array_index = self.window_index;
        }
        self.array_index as usize
    }

    /**
     * Returns the index of the level one marker before the current one,
     * re-running the forward recursion from the nearest checkpoint when
     * the level is no longer in the window.
     */
    fn previous_level(&mut self, sample: usize) -> usize {
        if self.array_index == self.window_index {
            self.window_index -= 1;
            let checkpoint = self.window_index as usize;
            self.array_index = self.window_index;
            self.levels[checkpoint].set_child_nodes(self.dag, &mut self.fwd_nodes);
            let start = self.levels[checkpoint].marker() + 1;
            let end = start + (self.levels.len() - checkpoint - 1);
            for marker in start..end {
                let index = self.next_level_index();
                self.levels[index].set_forward_values(
                    self.dag,
                    self.gl,
                    &mut self.fwd_nodes,
                    marker,
                    sample,
                );
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
     * the next level. Under the no-recombination transition only states
     * whose child nodes match the sampled node pair have positive weight.
     * Cumulative rounding may leave the draw uncovered, in which case the
     * last matching state is taken.
     */
    fn sample_alleles(&mut self, level: usize, copy: usize) {
        let marker = self.levels[level].marker();
        let d = self.rng.gen::<f64>() * self.node_value[copy];
        let size = self.levels[level].size();
        let mut selected = None;
        let mut last_match = None;
        let mut sum = 0f64;
        for j in 0..size {
            let c1 = self.dag.child_node(marker, self.levels[level].edge1(j)) as u32;
            let c2 = self.dag.child_node(marker, self.levels[level].edge2(j)) as u32;
            if c1 == self.node1[copy] && c2 == self.node2[copy] {
                last_match = Some(j);
                sum += self.levels[level].fwd_value(j) as f64 * self.tr_factor[copy];
                if d <= sum {
                    selected = Some(j);
                    break;
                }
            }
        }
        let state = match selected.or(last_match) {
            Some(j) => j,
            None => {
                warn!(
                    "no traceback state matches the sampled nodes at marker {}; keeping last state",
                    marker
                );
                size - 1
            }
        };
        if selected.is_none() {
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

    /**
     * Bounds level memory across individuals: a sample of levels estimates
     * the mean state capacity, and any level whose allocation exceeds
     * three times the mean is reset toward it.
     */
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

pub(crate) fn check_dag_and_gl<G: GenotypeLikelihoods>(
    dag: &Dag,
    gl: &G,
) -> Result<(), HmmError> {
    if dag.n_levels() != gl.n_markers() {
        return Err(HmmError::InconsistentInputs {
            msg: format!(
                "DAG has {} levels but the likelihood data has {} markers",
                dag.n_levels(),
                gl.n_markers()
            ),
        });
    }
    for m in 0..dag.n_levels() {
        let n_alleles = gl.marker(m).n_alleles();
        for e in 0..dag.n_edges(m) {
            if dag.symbol(m, e) >= n_alleles {
                return Err(HmmError::InconsistentInputs {
                    msg: format!(
                        "edge symbol {} at level {} exceeds the marker allele count {}",
                        dag.symbol(m, e),
                        m,
                        n_alleles
                    ),
                });
            }
        }
    }
    Ok(())
}
