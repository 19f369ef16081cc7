use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::baum::duo_level::DuoBaumLevel;
use crate::baum::node_map::NodeMap;
use crate::baum::single_baum::check_dag_and_gl;
use crate::baum::{checkpoint_window, mix_seed, PRUNE_SAMPLE_SIZE};
use crate::dag::Dag;
use crate::errors::HmmError;
use crate::haplotype::hap_pair::BitHapPair;
use crate::model::likelihoods::GenotypeLikelihoods;

/**
 * Haplotype sampler for parent-offspring duos. The hidden state tracks the
 * transmitted haplotype jointly with both untransmitted haplotypes, so one
 * traceback yields a consistent haplotype pair for each individual.
 */
pub struct DuoBaum<'a, G: GenotypeLikelihoods> {
    dag: &'a Dag,
    gl: &'a G,
    seed: i64,
    n_copies: usize,
    rng: StdRng,
    levels: Vec<DuoBaumLevel>,
    fwd_nodes: NodeMap<3>,
    bwd_nodes: NodeMap<3>,
    window_index: isize,
    array_index: isize,
    node_ab1: Vec<u32>,
    node_a2: Vec<u32>,
    node_b2: Vec<u32>,
    node_value: Vec<f64>,
    tr_factor: Vec<f64>,
    alleles_ab1: Vec<Vec<usize>>,
    alleles_a2: Vec<Vec<usize>>,
    alleles_b2: Vec<Vec<usize>>,
}

impl<'a, G: GenotypeLikelihoods> DuoBaum<'a, G> {
    pub fn new(
        dag: &'a Dag,
        gl: &'a G,
        seed: i64,
        n_copies: usize,
        low_mem: bool,
    ) -> Result<DuoBaum<'a, G>, HmmError> {
        check_dag_and_gl(dag, gl)?;
        if n_copies == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "at least one haplotype pair must be sampled per duo".to_string(),
            });
        }
        let window = checkpoint_window(dag.n_levels(), low_mem);
        Ok(DuoBaum {
            dag,
            gl,
            seed,
            n_copies,
            rng: StdRng::seed_from_u64(seed as u64),
            levels: (0..window).map(|_| DuoBaumLevel::new()).collect(),
            fwd_nodes: NodeMap::new(),
            bwd_nodes: NodeMap::new(),
            window_index: 0,
            array_index: -1,
            node_ab1: vec![0; n_copies],
            node_a2: vec![0; n_copies],
            node_b2: vec![0; n_copies],
            node_value: vec![0.0; n_copies],
            tr_factor: vec![0.0; n_copies],
            alleles_ab1: vec![Vec::new(); n_copies],
            alleles_a2: vec![Vec::new(); n_copies],
            alleles_b2: vec![Vec::new(); n_copies],
        })
    }

    pub fn n_copies(&self) -> usize {
        self.n_copies
    }

    /**
     * Samples haplotype pairs for a parent-offspring duo. Returns the
     * parent pairs and the offspring pairs; in each copy the first
     * haplotype of both pairs is the transmitted one.
     */
    pub fn random_sample(
        &mut self,
        sample_a: usize,
        sample_b: usize,
    ) -> Result<(Vec<BitHapPair>, Vec<BitHapPair>), HmmError> {
        self.sample_internal(sample_a, sample_b, None, None)
    }

    /**
     * Samples haplotype pairs and fills the posterior genotype
     * probabilities of both individuals.
     */
    pub fn random_sample_probs(
        &mut self,
        sample_a: usize,
        sample_b: usize,
        gt_probs_a: &mut [f32],
        gt_probs_b: &mut [f32],
    ) -> Result<(Vec<BitHapPair>, Vec<BitHapPair>), HmmError> {
        let markers = self.gl.markers();
        let expected = markers.sum_genotypes(markers.n_markers());
        assert_eq!(gt_probs_a.len(), expected, "posterior genotype slice has wrong length");
        assert_eq!(gt_probs_b.len(), expected, "posterior genotype slice has wrong length");
        self.sample_internal(sample_a, sample_b, Some(gt_probs_a), Some(gt_probs_b))
    }

    fn sample_internal(
        &mut self,
        sample_a: usize,
        sample_b: usize,
        mut gt_probs_a: Option<&mut [f32]>,
        mut gt_probs_b: Option<&mut [f32]>,
    ) -> Result<(Vec<BitHapPair>, Vec<BitHapPair>), HmmError> {
        let n_markers = self.dag.n_levels();
        assert!(sample_a < self.gl.n_samples() && sample_b < self.gl.n_samples());
        assert!(sample_a != sample_b, "a duo needs two distinct samples");
        self.rng = StdRng::seed_from_u64(mix_seed(
            self.seed,
            sample_a * self.gl.n_samples() + sample_b,
        ));
        for copy in 0..self.n_copies {
            for alleles in [
                &mut self.alleles_ab1[copy],
                &mut self.alleles_a2[copy],
                &mut self.alleles_b2[copy],
            ] {
                alleles.clear();
                alleles.resize(n_markers, 0);
            }
        }

        self.forward_algorithm(sample_a, sample_b)?;

        let last = self.array_index as usize;
        for copy in 0..self.n_copies {
            self.init_sample_alleles(last, copy);
        }
        let fill_probs = gt_probs_a.is_some() || gt_probs_b.is_some();
        if fill_probs {
            self.levels[last].set_initial_backward_values(self.dag, self.gl, &mut self.bwd_nodes);
            self.copy_gt_probs(last, gt_probs_a.as_deref_mut(), gt_probs_b.as_deref_mut());
        }
        for _m in (0..n_markers - 1).rev() {
            let level = self.previous_level(sample_a, sample_b);
            for copy in 0..self.n_copies {
                self.sample_alleles(level, copy);
            }
            if fill_probs {
                self.levels[level].set_backward_values(self.dag, self.gl, &mut self.bwd_nodes);
                self.copy_gt_probs(level, gt_probs_a.as_deref_mut(), gt_probs_b.as_deref_mut());
            }
        }
        self.bwd_nodes.clear();
        self.prune_levels();

        let markers = self.gl.markers().clone();
        let pairs_a = (0..self.n_copies)
            .map(|copy| {
                BitHapPair::new(
                    markers.clone(),
                    sample_a,
                    &self.alleles_ab1[copy],
                    &self.alleles_a2[copy],
                )
            })
            .collect();
        let pairs_b = (0..self.n_copies)
            .map(|copy| {
                BitHapPair::new(
                    markers.clone(),
                    sample_b,
                    &self.alleles_ab1[copy],
                    &self.alleles_b2[copy],
                )
            })
            .collect();
        Ok((pairs_a, pairs_b))
    }

    fn forward_algorithm(&mut self, sample_a: usize, sample_b: usize) -> Result<(), HmmError> {
        self.fwd_nodes.clear();
        let n_roots = self.dag.n_parent_nodes(0);
        for n1 in 0..n_roots {
            let p1 = self.dag.parent_prob(0, n1);
            for n2 in 0..n_roots {
                let p2 = p1 * self.dag.parent_prob(0, n2);
                for n3 in 0..n_roots {
                    let p = p2 * self.dag.parent_prob(0, n3);
                    if p > 0.0 {
                        self.fwd_nodes
                            .sum_update([n1 as u32, n2 as u32, n3 as u32], p);
                    }
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
                sample_a,
                sample_b,
            );
            if self.levels[index].size() == 0 {
                return Err(HmmError::NoConsistentState { marker, sample: sample_a });
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

    fn previous_level(&mut self, sample_a: usize, sample_b: usize) -> usize {
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
                    sample_a,
                    sample_b,
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
        let e_ab1 = lv.edge_ab1(state);
        let e_a2 = lv.edge_a2(state);
        let e_b2 = lv.edge_b2(state);
        let s_ab1 = self.dag.symbol(marker, e_ab1);
        let s_a2 = self.dag.symbol(marker, e_a2);
        let s_b2 = self.dag.symbol(marker, e_b2);
        let ep = self.gl.gl(marker, lv.sample_a(), s_ab1, s_a2)
            * self.gl.gl(marker, lv.sample_b(), s_ab1, s_b2);
        self.node_ab1[copy] = self.dag.parent_node(marker, e_ab1) as u32;
        self.node_a2[copy] = self.dag.parent_node(marker, e_a2) as u32;
        self.node_b2[copy] = self.dag.parent_node(marker, e_b2) as u32;
        self.node_value[copy] = lv.fwd_value(state) as f64 * lv.fwd_value_sum() as f64 / ep as f64;
        self.tr_factor[copy] = self.dag.cond_edge_prob(marker, e_ab1) as f64
            * self.dag.cond_edge_prob(marker, e_a2) as f64
            * self.dag.cond_edge_prob(marker, e_b2) as f64;
        self.alleles_ab1[copy][marker] = s_ab1;
        self.alleles_a2[copy][marker] = s_a2;
        self.alleles_b2[copy][marker] = s_b2;
    }

    fn sample_alleles(&mut self, level: usize, copy: usize) {
        let marker = self.levels[level].marker();
        let d = self.rng.gen::<f64>() * self.node_value[copy];
        let size = self.levels[level].size();
        let mut selected = None;
        let mut last_match = None;
        let mut sum = 0f64;
        for j in 0..size {
            let c_ab1 = self.dag.child_node(marker, self.levels[level].edge_ab1(j)) as u32;
            let c_a2 = self.dag.child_node(marker, self.levels[level].edge_a2(j)) as u32;
            let c_b2 = self.dag.child_node(marker, self.levels[level].edge_b2(j)) as u32;
            if c_ab1 == self.node_ab1[copy]
                && c_a2 == self.node_a2[copy]
                && c_b2 == self.node_b2[copy]
            {
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
        self.save_current_data(level, copy, state);
    }

    fn copy_gt_probs(
        &self,
        level: usize,
        gt_probs_a: Option<&mut [f32]>,
        gt_probs_b: Option<&mut [f32]>,
    ) {
        let markers = self.gl.markers();
        let marker = self.levels[level].marker();
        let start = markers.sum_genotypes(marker);
        let end = markers.sum_genotypes(marker + 1);
        if let Some(probs) = gt_probs_a {
            probs[start..end].copy_from_slice(self.levels[level].gt_probs_a());
        }
        if let Some(probs) = gt_probs_b {
            probs[start..end].copy_from_slice(self.levels[level].gt_probs_b());
        }
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
