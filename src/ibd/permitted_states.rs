use std::sync::Arc;

use itertools::Itertools;
use ndarray::Array2;
use rayon::prelude::*;

use crate::dag::Dag;
use crate::errors::HmmError;
use crate::haplotype::hap_pair::SampleHapPairs;
use crate::ibd::hap_segment::HapSegment;
use crate::ibd::interval_tree::CenteredIntervalTree;

/**
 * Segments whose span sticks out of a covering segment by at most this
 * many markers are still treated as contained and dropped.
 */
const END_FILTER: usize = 1;

/**
 * A finite cursor over the permitted diploid states of one sample. At each
 * marker the stream yields a sequence of ordered edge pairs; the stream is
 * reset with set_marker and is not restartable otherwise.
 */
pub trait DiploidStates {
    fn n_markers(&self) -> usize;

    fn set_marker(&mut self, marker: usize);

    fn marker(&self) -> usize;

    fn has_next(&self) -> bool;

    /**
     * Advances to the next permitted pair, exposed by edge1 and edge2.
     */
    fn next(&mut self);

    fn edge1(&self) -> usize;

    fn edge2(&self) -> usize;
}

/**
 * For every marker and reference haplotype, the DAG edge the haplotype
 * traverses at that level. Haplotypes are traced through the DAG by
 * following the out-edge carrying their allele; a haplotype whose allele
 * has no matching out-edge from the current node is re-anchored at the
 * first parent node with a matching edge, and marked absent where no node
 * carries one.
 */
#[derive(Debug)]
pub struct HapStates {
    states: Array2<i32>,
}

impl HapStates {
    pub fn new(dag: &Dag, haps: &SampleHapPairs) -> Result<HapStates, HmmError> {
        if dag.n_levels() != haps.n_markers() {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "DAG has {} levels but the haplotypes cover {} markers",
                    dag.n_levels(),
                    haps.n_markers()
                ),
            });
        }
        let n_markers = dag.n_levels();
        let n_haps = haps.n_haps();
        let columns: Vec<Vec<i32>> = (0..n_haps)
            .into_par_iter()
            .map(|hap| Self::trace(dag, haps, hap))
            .collect();
        let states = Array2::from_shape_fn((n_markers, n_haps), |(m, h)| columns[h][m]);
        Ok(HapStates { states })
    }

    fn trace(dag: &Dag, haps: &SampleHapPairs, hap: usize) -> Vec<i32> {
        let mut states = vec![-1i32; dag.n_levels()];
        let mut node: Option<usize> = None;
        for m in 0..dag.n_levels() {
            let allele = haps.allele(m, hap);
            let edge = node
                .and_then(|n| dag.out_edge_by_symbol(m, n, allele))
                .or_else(|| {
                    (0..dag.n_parent_nodes(m)).find_map(|n| dag.out_edge_by_symbol(m, n, allele))
                });
            match edge {
                Some(e) => {
                    states[m] = e as i32;
                    node = Some(dag.child_node(m, e));
                }
                None => {
                    states[m] = -1;
                    node = None;
                }
            }
        }
        states
    }

    pub fn n_markers(&self) -> usize {
        self.states.nrows()
    }

    pub fn n_haps(&self) -> usize {
        self.states.ncols()
    }

    /**
     * The edge traversed by hap at marker, if the haplotype is present in
     * the DAG there.
     */
    pub fn edge(&self, marker: usize, hap: usize) -> Option<usize> {
        let e = self.states[(marker, hap)];
        if e < 0 {
            None
        } else {
            Some(e as usize)
        }
    }
}

/**
 * Drops segments properly contained in a longer segment, with END_FILTER
 * markers of slack at the boundaries. Segments with identical spans all
 * survive; their reference haplotypes are distinct.
 */
fn filter_contained(mut segments: Vec<HapSegment>) -> Vec<HapSegment> {
    segments.sort_by_key(|s| (s.start(), std::cmp::Reverse(s.end()), s.hap()));
    segments.dedup();
    let mut kept: Vec<HapSegment> = Vec::with_capacity(segments.len());
    // largest end among kept segments starting strictly before the
    // current start group, and within the current start group
    let mut prev_max_end: Option<usize> = None;
    let mut group_start = usize::MAX;
    let mut group_max_end: Option<usize> = None;
    for segment in segments {
        if segment.start() != group_start {
            if let Some(end) = group_max_end {
                prev_max_end = Some(prev_max_end.map_or(end, |e| e.max(end)));
            }
            group_start = segment.start();
            group_max_end = None;
        }
        let in_earlier = prev_max_end.map_or(false, |e| segment.end() <= e + END_FILTER);
        let in_group = group_max_end.map_or(false, |e| segment.end() < e);
        if !(in_earlier || in_group) {
            group_max_end = Some(group_max_end.map_or(segment.end(), |e| e.max(segment.end())));
            kept.push(segment);
        }
    }
    kept
}

/**
 * Extends each segment in both directions by ibd_extend_cm, but leaves a
 * boundary in place when the extended flank would run into another
 * segment.
 */
fn extend_segments(
    segments: Vec<HapSegment>,
    pos: &[f64],
    ibd_extend_cm: f64,
) -> Vec<HapSegment> {
    if ibd_extend_cm <= 0.0 {
        return segments;
    }
    let n_markers = pos.len();
    let raw = CenteredIntervalTree::new(n_markers, segments.clone());
    segments
        .into_iter()
        .map(|segment| {
            let lo = pos[segment.start()] - ibd_extend_cm;
            let hi = pos[segment.end()] + ibd_extend_cm;
            let ext_start = pos.partition_point(|p| *p < lo);
            let ext_end = pos.partition_point(|p| *p <= hi) - 1;
            let mut start = segment.start();
            let mut end = segment.end();
            if ext_start < start && !raw.overlaps_other(ext_start, start - 1, &segment) {
                start = ext_start;
            }
            if ext_end > end && !raw.overlaps_other(end + 1, ext_end, &segment) {
                end = ext_end;
            }
            HapSegment::new(segment.hap(), start, end)
        })
        .collect()
}

/**
 * Permitted diploid states for one sample, restricted to the edges
 * traversed by the reference haplotypes whose IBS segments cover each
 * marker. Iteration walks the product of the two per-haplotype edge sets
 * and interleaves the swapped pair when the product itself would not yield
 * it, so each ordered pair appears at most once.
 */
pub struct SinglePermittedStates {
    n_markers: usize,
    marker: usize,
    hap_states: Arc<HapStates>,
    n_edges: Vec<usize>,
    tree1: CenteredIntervalTree,
    tree2: CenteredIntervalTree,
    indices1: Vec<usize>,
    indices2: Vec<usize>,
    scratch: Vec<HapSegment>,
    i1: usize,
    i2: usize,
    edge1: usize,
    edge2: usize,
    rev: bool,
}

impl SinglePermittedStates {
    /**
     * @param segments1 IBS segments of the sample's first haplotype
     * @param segments2 IBS segments of the sample's second haplotype
     * @param ibd_extend_cm segment extension length in the units of the
     * DAG position array
     */
    pub fn new(
        dag: &Dag,
        hap_states: Arc<HapStates>,
        segments1: Vec<HapSegment>,
        segments2: Vec<HapSegment>,
        ibd_extend_cm: f64,
    ) -> Result<SinglePermittedStates, HmmError> {
        if hap_states.n_markers() != dag.n_levels() {
            return Err(HmmError::InconsistentInputs {
                msg: "haplotype state table does not match the DAG".to_string(),
            });
        }
        let n_markers = dag.n_levels();
        let pos = dag.pos_array();
        let segments1 = extend_segments(filter_contained(segments1), pos, ibd_extend_cm);
        let segments2 = extend_segments(filter_contained(segments2), pos, ibd_extend_cm);
        debug!(
            "{} and {} IBS segments after containment filtering and extension",
            segments1.len(),
            segments2.len()
        );
        let n_edges = (0..n_markers).map(|m| dag.n_edges(m)).collect();
        Ok(SinglePermittedStates {
            n_markers,
            marker: 0,
            hap_states,
            n_edges,
            tree1: CenteredIntervalTree::new(n_markers, segments1),
            tree2: CenteredIntervalTree::new(n_markers, segments2),
            indices1: Vec::new(),
            indices2: Vec::new(),
            scratch: Vec::new(),
            i1: 0,
            i2: 0,
            edge1: 0,
            edge2: 0,
            rev: false,
        })
    }

    fn covered_edges(&mut self, marker: usize, first: bool) -> Vec<usize> {
        self.scratch.clear();
        if first {
            self.tree1.intersect(marker, &mut self.scratch);
        } else {
            self.tree2.intersect(marker, &mut self.scratch);
        }
        let hap_states = &self.hap_states;
        let edges: Vec<usize> = self
            .scratch
            .iter()
            .filter_map(|s| hap_states.edge(marker, s.hap()))
            .sorted()
            .dedup()
            .collect();
        if edges.is_empty() {
            // no covering segment, fall back to the unrestricted edge set
            trace!("no permitted edges at marker {}; using all edges", marker);
            (0..self.n_edges[marker]).collect()
        } else {
            edges
        }
    }
}

impl DiploidStates for SinglePermittedStates {
    fn n_markers(&self) -> usize {
        self.n_markers
    }

    fn set_marker(&mut self, marker: usize) {
        assert!(marker < self.n_markers, "marker index out of bounds: {}", marker);
        self.marker = marker;
        self.indices1 = self.covered_edges(marker, true);
        self.indices2 = self.covered_edges(marker, false);
        self.i1 = 0;
        self.i2 = 0;
        self.rev = false;
    }

    fn marker(&self) -> usize {
        self.marker
    }

    fn has_next(&self) -> bool {
        self.rev || self.i1 < self.indices1.len()
    }

    fn next(&mut self) {
        assert!(self.has_next(), "permitted-state stream is exhausted");
        if self.rev {
            std::mem::swap(&mut self.edge1, &mut self.edge2);
            self.rev = false;
            return;
        }
        self.edge1 = self.indices1[self.i1];
        self.edge2 = self.indices2[self.i2];
        self.i2 += 1;
        if self.i2 == self.indices2.len() {
            self.i2 = 0;
            self.i1 += 1;
        }
        if self.edge1 != self.edge2
            && !(self.indices2.binary_search(&self.edge1).is_ok()
                && self.indices1.binary_search(&self.edge2).is_ok())
        {
            self.rev = true;
        }
    }

    fn edge1(&self) -> usize {
        self.edge1
    }

    fn edge2(&self) -> usize {
        self.edge2
    }
}
