use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::baum::hap_level::HapBaumLevel;
use crate::baum::node_map::NodeMap;
use crate::baum::{checkpoint_window, mix_seed, PRUNE_SAMPLE_SIZE};
use crate::dag::Dag;
use crate::errors::HmmError;
use crate::model::likelihoods::AlleleLikelihoods;

/**
 * Haploid sampler over the DAG for per-haplotype allele evidence. Runs
 * the haploid Baum recursion with windowed checkpointing, samples single
 * haplotypes by stochastic traceback, and optionally fills posterior
 * allele probabilities per marker.
 */
pub struct HapBaum<'a, A: AlleleLikelihoods> {
    dag: &'a Dag,
    al: &'a A,
    seed: i64,
    n_copies: usize,
    rng: StdRng,
    levels: Vec<HapBaumLevel>,
    fwd_nodes: NodeMap<1>,
    bwd_nodes: NodeMap<1>,
    window_index: isize,
    array_index: isize,
    node: Vec<u32>,
    node_value: Vec<f64>,
    tr_factor: Vec<f64>,
    alleles: Vec<Vec<usize>>,
}

impl<'a, A: AlleleLikelihoods> HapBaum<'a, A> {
    pub fn new(
        dag: &'a Dag,
        al: &'a A,
        seed: i64,
        n_copies: usize,
        low_mem: bool,
    ) -> Result<HapBaum<'a, A>, HmmError> {
        if dag.n_levels() != al.n_markers() {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "DAG has {} levels but the likelihood data has {} markers",
                    dag.n_levels(),
                    al.n_markers()
                ),
            });
        }
        if n_copies == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "at least one haplotype must be sampled".to_string(),
            });
        }
        let window = checkpoint_window(dag.n_levels(), low_mem);
        Ok(HapBaum {
            dag,
            al,
            seed,
            n_copies,
            rng: StdRng::seed_from_u64(seed as u64),
            levels: (0..window).map(|_| HapBaumLevel::new()).collect(),
            fwd_nodes: NodeMap::new(),
            bwd_nodes: NodeMap::new(),
            window_index: 0,
            array_index: -1,
            node: vec![0; n_copies],
            node_value: vec![0.0; n_copies],
            tr_factor: vec![0.0; n_copies],
            alleles: vec![Vec::new(); n_copies],
        })
    }

    pub fn n_copies(&self) -> usize {
        self.n_copies
    }

    /**
     * Samples haplotypes for hap from the posterior, one allele sequence
     * per copy.
     */
    pub fn random_sample(&mut self, hap: usize) -> Result<Vec<Vec<usize>>, HmmError> {
        self.sample_internal(hap, None)
    }

    /**
     * Samples haplotypes and fills al_probs with the posterior allele
     * probabilities of every marker. The slice length must equal the
     * allele prefix sum over all markers.
     */
    pub fn random_sample_probs(
        &mut self,
        hap: usize,
        al_probs: &mut [f32],
    ) -> Result<Vec<Vec<usize>>, HmmError> {
        let markers = self.al.markers();
        assert_eq!(
            al_probs.len(),
            markers.sum_alleles(markers.n_markers()),
            "posterior allele slice has wrong length"
        );
        self.sample_internal(hap, Some(al_probs))
    }

    fn sample_internal(
        &mut self,
        hap: usize,
        mut al_probs: Option<&mut [f32]>,
    ) -> Result<Vec<Vec<usize>>, HmmError> {
        let n_markers = self.dag.n_levels();
        assert!(hap < self.al.n_haps(), "haplotype index out of bounds: {}", hap);
        self.rng = StdRng::seed_from_u64(mix_seed(self.seed, hap));
        for copy in 0..self.n_copies {
            self.alleles[copy].clear();
            self.alleles[copy].resize(n_markers, 0);
        }

        self.forward_algorithm(hap)?;

        let last = self.array_index as usize;
        for copy in 0..self.n_copies {
            self.init_sample_allele(last, copy);
        }
        if let Some(probs) = al_probs.as_deref_mut() {
            self.levels[last].set_initial_backward_values(self.dag, self.al, &mut self.bwd_nodes);
            self.copy_al_probs(last, probs);
        }
        for _m in (0..n_markers - 1).rev() {
            let level = self.previous_level(hap);
            for copy in 0..self.n_copies {
                self.sample_allele(level, copy);
            }
            if let Some(probs) = al_probs.as_deref_mut() {
                self.levels[level].set_backward_values(self.dag, self.al, &mut self.bwd_nodes);
                self.copy_al_probs(level, probs);
            }
        }
        self.bwd_nodes.clear();
        self.prune_levels();

        Ok(self.alleles[..self.n_copies].to_vec())
    }

    fn forward_algorithm(&mut self, hap: usize) -> Result<(), HmmError> {
        self.fwd_nodes.clear();
        for n in 0..self.dag.n_parent_nodes(0) {
            let p = self.dag.parent_prob(0, n);
            if p > 0.0 {
                self.fwd_nodes.sum_update([n as u32], p);
            }
        }
        self.window_index = 0;
        self.array_index = -1;
        for marker in 0..self.dag.n_levels() {
            let index = self.next_level_index();
            self.levels[index].set_forward_values(
                self.dag,
                self.al,
                &mut self.fwd_nodes,
                marker,
                hap,
            );
            if self.levels[index].size() == 0 {
                return Err(HmmError::NoConsistentState { marker, sample: hap });
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

    fn previous_level(&mut self, hap: usize) -> usize {
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
                    self.al,
                    &mut self.fwd_nodes,
                    marker,
                    hap,
                );
            }
            self.array_index as usize
        } else {
            self.array_index -= 1;
            self.array_index as usize
        }
    }

    fn init_sample_allele(&mut self, level: usize, copy: usize) {
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
        let edge = lv.edge(state);
        let symbol = self.dag.symbol(marker, edge);
        let ep = self.al.al(marker, lv.hap(), symbol);
        self.node[copy] = self.dag.parent_node(marker, edge) as u32;
        self.node_value[copy] = lv.fwd_value(state) as f64 * lv.fwd_value_sum() as f64 / ep as f64;
        self.tr_factor[copy] = self.dag.cond_edge_prob(marker, edge) as f64;
        self.alleles[copy][marker] = symbol;
    }

    fn sample_allele(&mut self, level: usize, copy: usize) {
        let marker = self.levels[level].marker();
        let d = self.rng.gen::<f64>() * self.node_value[copy];
        let size = self.levels[level].size();
        let mut selected = None;
        let mut last_match = None;
        let mut sum = 0f64;
        for j in 0..size {
            let child = self.dag.child_node(marker, self.levels[level].edge(j)) as u32;
            if child == self.node[copy] {
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
                    "no traceback state matches the sampled node at marker {}; keeping last state",
                    marker
                );
                size - 1
            }
        };
        self.save_current_data(level, copy, state);
    }

    fn copy_al_probs(&self, level: usize, al_probs: &mut [f32]) {
        let markers = self.al.markers();
        let marker = self.levels[level].marker();
        let start = markers.sum_alleles(marker);
        let end = markers.sum_alleles(marker + 1);
        al_probs[start..end].copy_from_slice(self.levels[level].al_probs());
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
                level.set_capacity(target);
            }
        }
    }
}
