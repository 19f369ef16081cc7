use std::sync::Mutex;

use crate::model::markers::Markers;

/**
 * Thread-safe store of imputed posterior allele probabilities, one row per
 * target haplotype over the full reference marker list. Rows are written
 * once by the worker that imputed the haplotype.
 */
#[derive(Debug)]
pub struct ImputedAlleleProbs {
    markers: Markers,
    rows: Vec<Mutex<Vec<f32>>>,
}

impl ImputedAlleleProbs {
    pub fn new(markers: Markers, n_haps: usize) -> ImputedAlleleProbs {
        let rows = (0..n_haps).map(|_| Mutex::new(Vec::new())).collect();
        ImputedAlleleProbs { markers, rows }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn n_haps(&self) -> usize {
        self.rows.len()
    }

    pub fn set(&self, hap: usize, probs: Vec<f32>) {
        assert_eq!(
            probs.len(),
            self.markers.sum_alleles(self.markers.n_markers()),
            "allele probability row has wrong length for haplotype {}",
            hap
        );
        let mut row = self.rows[hap].lock().unwrap();
        assert!(row.is_empty(), "allele probabilities already set for haplotype {}", hap);
        *row = probs;
    }

    /**
     * The posterior probability that hap carries allele at marker.
     */
    pub fn al_prob(&self, marker: usize, hap: usize, allele: usize) -> f32 {
        assert!(
            allele < self.markers.marker(marker).n_alleles(),
            "allele index out of bounds at marker {}: {}",
            marker,
            allele
        );
        let row = self.rows[hap].lock().unwrap();
        assert!(!row.is_empty(), "allele probabilities not set for haplotype {}", hap);
        row[self.markers.sum_alleles(marker) + allele]
    }

    /**
     * The most probable allele of hap at marker.
     */
    pub fn best_allele(&self, marker: usize, hap: usize) -> usize {
        let row = self.rows[hap].lock().unwrap();
        assert!(!row.is_empty(), "allele probabilities not set for haplotype {}", hap);
        let start = self.markers.sum_alleles(marker);
        let end = self.markers.sum_alleles(marker + 1);
        let mut best = 0;
        for a in 1..end - start {
            if row[start + a] > row[start + best] {
                best = a;
            }
        }
        best
    }
}
