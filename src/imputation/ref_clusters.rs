use ndarray::Array2;

use crate::errors::HmmError;
use crate::haplotype::hap_pair::SampleHapPairs;
use crate::imputation::hap_coder::code_sequences;
use crate::model::markers::Markers;

/**
 * The reference panel prepared for Li-Stephens imputation. Target markers
 * are collapsed into clusters of nearby markers; within a cluster every
 * haplotype is reduced to an allele-sequence code, and the emission of the
 * HMM compares target and reference codes. Between consecutive cluster
 * midpoints the panel is additionally collapsed into per-segment
 * allele-sequence classes, which carry the posterior mass used to impute
 * alleles at reference-only markers.
 *
 * Segment s covers the reference markers from the midpoint of cluster s-1
 * to the midpoint of cluster s, so every interior cluster overlaps the
 * segments on both of its sides.
 */
pub struct RefClusters {
    ref_haps: SampleHapPairs,
    n_clusters: usize,
    n_targ_haps: usize,
    err_prob: f32,
    no_err_prob: f32,
    p_recomb: Vec<f32>,
    targ_codes: Array2<u32>,
    ref_codes: Array2<u32>,
    seq_idx: Vec<Vec<u32>>,
    n_seq: Vec<usize>,
    rep_hap: Vec<Vec<u32>>,
    seg_of: Vec<u32>,
    wt: Vec<f32>,
}

impl RefClusters {
    /**
     * @param targ_to_ref for each target marker, its index in the
     * reference marker list (strictly increasing)
     * @param gen_pos genetic position in cM of every reference marker
     * @param err per-allele emission error probability
     * @param ne effective population size of the recombination model
     * @param cluster_cm maximum genetic span of one marker cluster
     */
    pub fn new(
        ref_haps: &SampleHapPairs,
        targ_haps: &SampleHapPairs,
        targ_to_ref: &[usize],
        gen_pos: &[f64],
        err: f32,
        ne: f64,
        cluster_cm: f64,
    ) -> Result<RefClusters, HmmError> {
        let n_ref_markers = ref_haps.n_markers();
        let n_targ_markers = targ_haps.n_markers();
        if targ_to_ref.len() != n_targ_markers {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "{} marker mappings for {} target markers",
                    targ_to_ref.len(),
                    n_targ_markers
                ),
            });
        }
        if n_targ_markers == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "imputation requires at least one target marker".to_string(),
            });
        }
        if gen_pos.len() != n_ref_markers {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "{} genetic positions for {} reference markers",
                    gen_pos.len(),
                    n_ref_markers
                ),
            });
        }
        for w in targ_to_ref.windows(2) {
            if w[1] <= w[0] {
                return Err(HmmError::InconsistentInputs {
                    msg: "target marker mapping must be strictly increasing".to_string(),
                });
            }
        }
        if *targ_to_ref.last().unwrap() >= n_ref_markers {
            return Err(HmmError::InconsistentInputs {
                msg: "target marker mapping exceeds the reference marker list".to_string(),
            });
        }
        for (t, r) in targ_to_ref.iter().enumerate() {
            if targ_haps.markers().marker(t).n_alleles() != ref_haps.markers().marker(*r).n_alleles()
            {
                return Err(HmmError::InconsistentInputs {
                    msg: format!(
                        "target marker {} and reference marker {} disagree on allele count",
                        t, r
                    ),
                });
            }
        }
        if !(0.0..=0.5).contains(&err) {
            return Err(HmmError::InconsistentInputs {
                msg: format!("allele error probability {} outside [0, 0.5]", err),
            });
        }
        if ne <= 0.0 || cluster_cm < 0.0 {
            return Err(HmmError::InconsistentInputs {
                msg: "effective population size and cluster span must be positive".to_string(),
            });
        }

        let n_ref_haps = ref_haps.n_haps();
        let n_targ_haps = targ_haps.n_haps();
        let clusters = Self::cluster_markers(targ_to_ref, gen_pos, cluster_cm);
        let n_clusters = clusters.len();

        // joint allele-sequence codes per cluster, reference haps first
        let mut ref_codes = Array2::zeros((n_clusters, n_ref_haps));
        let mut targ_codes = Array2::zeros((n_clusters, n_targ_haps));
        for (c, cluster) in clusters.iter().enumerate() {
            let positions = cluster.1 - cluster.0;
            let (codes, _) = code_sequences(positions, n_ref_haps + n_targ_haps, |p, h| {
                let t = cluster.0 + p;
                if h < n_ref_haps {
                    ref_haps.allele(targ_to_ref[t], h)
                } else {
                    targ_haps.allele(t, h - n_ref_haps)
                }
            });
            for h in 0..n_ref_haps {
                ref_codes[(c, h)] = codes[h];
            }
            for h in 0..n_targ_haps {
                targ_codes[(c, h)] = codes[n_ref_haps + h];
            }
        }

        // cluster midpoints in reference marker space
        let mids: Vec<usize> = clusters
            .iter()
            .map(|c| targ_to_ref[c.0 + (c.1 - c.0 - 1) / 2])
            .collect();
        let mid_pos: Vec<f64> = clusters
            .iter()
            .map(|c| (gen_pos[targ_to_ref[c.0]] + gen_pos[targ_to_ref[c.1 - 1]]) / 2.0)
            .collect();

        let mut p_recomb = vec![0f32; n_clusters];
        for c in 1..n_clusters {
            let morgans = (mid_pos[c] - mid_pos[c - 1]).max(0.0) / 100.0;
            let x = 0.04 * ne * morgans / n_ref_haps as f64;
            p_recomb[c] = (-(-x).exp_m1()) as f32;
        }

        // segment bounds: [bound(s), bound(s+1)) for s in 0..=n_clusters
        let mut bounds = Vec::with_capacity(n_clusters + 2);
        bounds.push(0);
        bounds.extend(mids.iter().copied());
        bounds.push(n_ref_markers);
        let mut seg_of = vec![0u32; n_ref_markers];
        for s in 0..=n_clusters {
            let (lo, hi) = (bounds[s], bounds[s + 1].max(bounds[s]));
            for j in lo..hi {
                seg_of[j] = s as u32;
            }
        }
        let mut seq_idx = Vec::with_capacity(n_clusters + 1);
        let mut n_seq = Vec::with_capacity(n_clusters + 1);
        let mut rep_hap = Vec::with_capacity(n_clusters + 1);
        for s in 0..=n_clusters {
            let lo = bounds[s];
            let hi = bounds[s + 1].max(lo);
            let (codes, count) =
                code_sequences(hi - lo, n_ref_haps, |p, h| ref_haps.allele(lo + p, h));
            let mut reps = vec![u32::MAX; count];
            for (h, code) in codes.iter().enumerate() {
                if reps[*code as usize] == u32::MAX {
                    reps[*code as usize] = h as u32;
                }
            }
            seq_idx.push(codes);
            n_seq.push(count);
            rep_hap.push(reps);
        }

        // linear interpolation weight toward the left cluster's bucket
        let mut wt = vec![0f32; n_ref_markers];
        for j in 0..n_ref_markers {
            let s = seg_of[j] as usize;
            wt[j] = if s == 0 {
                0.0
            } else if s == n_clusters {
                1.0
            } else {
                let left = mid_pos[s - 1];
                let right = mid_pos[s];
                if right > left {
                    (((right - gen_pos[j]) / (right - left)).clamp(0.0, 1.0)) as f32
                } else {
                    0.5
                }
            };
        }

        debug!(
            "{} target markers collapsed into {} clusters over {} reference markers",
            n_targ_markers, n_clusters, n_ref_markers
        );

        Ok(RefClusters {
            ref_haps: ref_haps.clone(),
            n_clusters,
            n_targ_haps,
            err_prob: err,
            no_err_prob: 1.0 - err,
            p_recomb,
            targ_codes,
            ref_codes,
            seq_idx,
            n_seq,
            rep_hap,
            seg_of,
            wt,
        })
    }

    /**
     * Groups consecutive target markers whose genetic span stays within
     * cluster_cm. Returns half-open target marker ranges.
     */
    fn cluster_markers(
        targ_to_ref: &[usize],
        gen_pos: &[f64],
        cluster_cm: f64,
    ) -> Vec<(usize, usize)> {
        let mut clusters = Vec::new();
        let mut start = 0usize;
        for t in 1..targ_to_ref.len() {
            if gen_pos[targ_to_ref[t]] - gen_pos[targ_to_ref[start]] > cluster_cm {
                clusters.push((start, t));
                start = t;
            }
        }
        clusters.push((start, targ_to_ref.len()));
        clusters
    }

    pub fn ref_haps(&self) -> &SampleHapPairs {
        &self.ref_haps
    }

    pub fn ref_markers(&self) -> &Markers {
        self.ref_haps.markers()
    }

    pub fn n_ref_markers(&self) -> usize {
        self.ref_haps.n_markers()
    }

    pub fn n_ref_haps(&self) -> usize {
        self.ref_haps.n_haps()
    }

    pub fn n_targ_haps(&self) -> usize {
        self.n_targ_haps
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn err_prob(&self) -> f32 {
        self.err_prob
    }

    pub fn no_err_prob(&self) -> f32 {
        self.no_err_prob
    }

    pub fn p_recomb(&self, cluster: usize) -> f32 {
        self.p_recomb[cluster]
    }

    /**
     * Emission probability of reference haplotype h for the target
     * haplotype at this cluster.
     */
    pub fn emission(&self, cluster: usize, targ_hap: usize, ref_hap: usize) -> f32 {
        if self.targ_codes[(cluster, targ_hap)] == self.ref_codes[(cluster, ref_hap)] {
            self.no_err_prob
        } else {
            self.err_prob
        }
    }

    /**
     * Number of segments; segment s is bounded by the midpoints of
     * clusters s-1 and s.
     */
    pub fn n_segments(&self) -> usize {
        self.n_clusters + 1
    }

    pub fn n_seq(&self, segment: usize) -> usize {
        self.n_seq[segment]
    }

    /**
     * The allele-sequence class of ref_hap within segment.
     */
    pub fn seq_idx(&self, segment: usize, ref_hap: usize) -> usize {
        self.seq_idx[segment][ref_hap] as usize
    }

    /**
     * The allele carried by a segment class at a reference marker inside
     * the segment.
     */
    pub fn seq_allele(&self, segment: usize, seq: usize, ref_marker: usize) -> usize {
        debug_assert_eq!(self.seg_of[ref_marker] as usize, segment);
        self.ref_haps
            .allele(ref_marker, self.rep_hap[segment][seq] as usize)
    }

    pub fn segment_of(&self, ref_marker: usize) -> usize {
        self.seg_of[ref_marker] as usize
    }

    /**
     * Interpolation weight of the left-flanking cluster bucket at a
     * reference marker; the right-flanking bucket gets the complement.
     */
    pub fn weight(&self, ref_marker: usize) -> f32 {
        self.wt[ref_marker]
    }

    /**
     * Per-segment floor under which an allele-sequence class contributes
     * nothing to imputed allele probabilities.
     */
    pub fn seq_threshold(&self, segment: usize) -> f32 {
        (0.005f32).min(1.0 / self.n_seq[segment] as f32)
    }
}
