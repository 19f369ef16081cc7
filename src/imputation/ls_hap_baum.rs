use crate::baum::checkpoint_window;
use crate::errors::HmmError;
use crate::imputation::ref_clusters::RefClusters;

/**
 * Li-Stephens haploid imputation HMM. The hidden state is the copied
 * reference haplotype; the recursion runs over marker clusters with a
 * per-cluster recombination probability, the forward rows are kept in the
 * same windowed checkpoint ring the DAG samplers use, and the posterior
 * state mass is collapsed into per-segment allele-sequence buckets from
 * which allele probabilities at every reference marker are interpolated.
 */
pub struct LsHapBaum<'a> {
    data: &'a RefClusters,
    n: usize,
    rows: Vec<Vec<f32>>,
    row_sums: Vec<f32>,
    row_clusters: Vec<usize>,
    window_index: isize,
    array_index: isize,
    fwd_buf: Vec<f32>,
    last_sum: f32,
    bwd: Vec<f32>,
    fwd_hap_probs: Vec<Vec<f32>>,
    bwd_hap_probs: Vec<Vec<f32>>,
}

impl<'a> LsHapBaum<'a> {
    pub fn new(data: &'a RefClusters, low_mem: bool) -> LsHapBaum<'a> {
        let n = data.n_ref_haps();
        let window = checkpoint_window(data.n_clusters(), low_mem);
        let fwd_hap_probs = (0..data.n_clusters())
            .map(|c| vec![0f32; data.n_seq(c + 1)])
            .collect();
        let bwd_hap_probs = (0..data.n_clusters())
            .map(|c| vec![0f32; data.n_seq(c)])
            .collect();
        LsHapBaum {
            data,
            n,
            rows: (0..window).map(|_| vec![0f32; n]).collect(),
            row_sums: vec![0f32; window],
            row_clusters: vec![0; window],
            window_index: 0,
            array_index: -1,
            fwd_buf: vec![0f32; n],
            last_sum: 0.0,
            bwd: vec![0f32; n],
            fwd_hap_probs,
            bwd_hap_probs,
        }
    }

    /**
     * Imputes posterior allele probabilities for one target haplotype at
     * every reference marker. The returned row is laid out through the
     * reference markers' allele prefix sums.
     */
    pub fn impute(&mut self, targ_hap: usize) -> Result<Vec<f32>, HmmError> {
        assert!(
            targ_hap < self.data.n_targ_haps(),
            "target haplotype index out of bounds: {}",
            targ_hap
        );
        let n_clusters = self.data.n_clusters();
        self.forward_algorithm(targ_hap)?;

        for probs in self.fwd_hap_probs.iter_mut() {
            probs.iter_mut().for_each(|p| *p = 0.0);
        }
        for probs in self.bwd_hap_probs.iter_mut() {
            probs.iter_mut().for_each(|p| *p = 0.0);
        }

        let init = 1.0 / self.n as f32;
        self.bwd.iter_mut().for_each(|b| *b = init);
        let last = self.array_index as usize;
        self.set_state_probs(n_clusters - 1, last);
        for m in (0..n_clusters.saturating_sub(1)).rev() {
            let row = self.previous_row(targ_hap);
            self.update_backward(m + 1, targ_hap);
            self.set_state_probs(m, row);
        }
        Ok(self.interpolate_allele_probs())
    }

    fn forward_algorithm(&mut self, targ_hap: usize) -> Result<(), HmmError> {
        self.window_index = 0;
        self.array_index = -1;
        self.last_sum = 0.0;
        for cluster in 0..self.data.n_clusters() {
            self.set_forward(cluster, targ_hap)?;
            let index = self.next_row_index();
            self.rows[index].copy_from_slice(&self.fwd_buf);
            self.row_sums[index] = self.last_sum;
            self.row_clusters[index] = cluster;
        }
        Ok(())
    }

    fn set_forward(&mut self, cluster: usize, targ_hap: usize) -> Result<(), HmmError> {
        if cluster == 0 {
            for h in 0..self.n {
                self.fwd_buf[h] = self.data.emission(0, targ_hap, h);
            }
        } else {
            let p_recomb = self.data.p_recomb(cluster);
            let scale = (1.0 - p_recomb) / self.last_sum;
            let shift = p_recomb / self.n as f32;
            for h in 0..self.n {
                self.fwd_buf[h] = self.data.emission(cluster, targ_hap, h)
                    * (scale * self.fwd_buf[h] + shift);
            }
        }
        self.last_sum = self.fwd_buf.iter().sum();
        if !(self.last_sum > 0.0) {
            return Err(HmmError::NoConsistentState {
                marker: cluster,
                sample: targ_hap,
            });
        }
        Ok(())
    }

    fn next_row_index(&mut self) -> usize {
        self.array_index += 1;
        if self.array_index as usize == self.rows.len() {
            self.window_index += 1;
            self.array_index = self.window_index;
        }
        self.array_index as usize
    }

    fn previous_row(&mut self, targ_hap: usize) -> usize {
        if self.array_index == self.window_index {
            self.window_index -= 1;
            let checkpoint = self.window_index as usize;
            self.array_index = self.window_index;
            self.fwd_buf.copy_from_slice(&self.rows[checkpoint]);
            self.last_sum = self.row_sums[checkpoint];
            let start = self.row_clusters[checkpoint] + 1;
            let end = start + (self.rows.len() - checkpoint - 1);
            for cluster in start..end {
                // re-running a previously completed stretch cannot fail
                self.set_forward(cluster, targ_hap)
                    .expect("forward recomputation failed");
                let index = self.next_row_index();
                self.rows[index].copy_from_slice(&self.fwd_buf);
                self.row_sums[index] = self.last_sum;
                self.row_clusters[index] = cluster;
            }
            self.array_index as usize
        } else {
            self.array_index -= 1;
            self.array_index as usize
        }
    }

    /**
     * Backward step from cluster to cluster - 1: the emission of the later
     * cluster is applied first, then the jump mixture after summing.
     */
    fn update_backward(&mut self, cluster: usize, targ_hap: usize) {
        let mut sum = 0f32;
        for h in 0..self.n {
            self.bwd[h] *= self.data.emission(cluster, targ_hap, h);
            sum += self.bwd[h];
        }
        let p_recomb = self.data.p_recomb(cluster);
        let scale = (1.0 - p_recomb) / sum;
        let shift = p_recomb / self.n as f32;
        for h in 0..self.n {
            self.bwd[h] = scale * self.bwd[h] + shift;
        }
    }

    /**
     * Collapses the posterior state mass at a cluster into the
     * allele-sequence buckets of the two flanking segments.
     */
    fn set_state_probs(&mut self, cluster: usize, row: usize) {
        let mut sum = 0f32;
        for h in 0..self.n {
            sum += self.rows[row][h] * self.bwd[h];
        }
        assert!(sum > 0.0, "posterior state mass vanished at cluster {}", cluster);
        for h in 0..self.n {
            let p = self.rows[row][h] * self.bwd[h] / sum;
            let fwd_seq = self.data.seq_idx(cluster + 1, h);
            let bwd_seq = self.data.seq_idx(cluster, h);
            self.fwd_hap_probs[cluster][fwd_seq] += p;
            self.bwd_hap_probs[cluster][bwd_seq] += p;
        }
    }

    /**
     * Produces allele probabilities at every reference marker by linear
     * interpolation between the flanking cluster buckets, suppressing
     * classes below the per-segment threshold.
     */
    fn interpolate_allele_probs(&self) -> Vec<f32> {
        let data = self.data;
        let markers = data.ref_markers();
        let n_clusters = data.n_clusters();
        let mut al_probs = vec![0f32; markers.sum_alleles(markers.n_markers())];
        for j in 0..data.n_ref_markers() {
            let segment = data.segment_of(j);
            let wt = data.weight(j);
            let threshold = data.seq_threshold(segment);
            let start = markers.sum_alleles(j);
            if segment >= 1 && wt > 0.0 {
                let bucket = &self.fwd_hap_probs[segment - 1];
                for (seq, p) in bucket.iter().enumerate() {
                    if *p >= threshold {
                        al_probs[start + data.seq_allele(segment, seq, j)] += wt * p;
                    }
                }
            }
            if segment < n_clusters && wt < 1.0 {
                let bucket = &self.bwd_hap_probs[segment];
                for (seq, p) in bucket.iter().enumerate() {
                    if *p >= threshold {
                        al_probs[start + data.seq_allele(segment, seq, j)] += (1.0 - wt) * p;
                    }
                }
            }
            let end = markers.sum_alleles(j + 1);
            let sum: f32 = al_probs[start..end].iter().sum();
            assert!(sum > 0.0, "imputed allele mass vanished at marker {}", j);
            al_probs[start..end].iter_mut().for_each(|p| *p /= sum);
        }
        al_probs
    }
}
