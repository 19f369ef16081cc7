use std::sync::Mutex;

use crate::model::genotype_index;
use crate::model::markers::Markers;
use crate::model::samples::Samples;

/**
 * Thread-safe accumulator of posterior genotype probabilities. Each sample
 * owns one flattened probability row covering all markers; the row layout
 * follows the genotype prefix sums of the marker list. Updates for distinct
 * samples touch distinct locks and may run concurrently.
 */
#[derive(Debug)]
pub struct GenotypeValues {
    markers: Markers,
    samples: Samples,
    rows: Vec<Mutex<Vec<f32>>>,
}

impl GenotypeValues {
    pub fn new(markers: Markers, samples: Samples) -> GenotypeValues {
        let row_len = markers.sum_genotypes(markers.n_markers());
        let rows = (0..samples.n_samples())
            .map(|_| Mutex::new(vec![0f32; row_len]))
            .collect();
        GenotypeValues {
            markers,
            samples,
            rows,
        }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn n_markers(&self) -> usize {
        self.markers.n_markers()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.n_samples()
    }

    /**
     * Adds gt_probs elementwise into the row for sample. The slice must
     * cover every marker, with the genotype block of marker m located at
     * markers.sum_genotypes(m).
     */
    pub fn add(&self, sample: usize, gt_probs: &[f32]) {
        let mut row = self.rows[sample].lock().unwrap();
        assert_eq!(
            row.len(),
            gt_probs.len(),
            "genotype probability row has wrong length for sample {}",
            sample
        );
        row.iter_mut().zip(gt_probs.iter()).for_each(|(r, p)| *r += p);
    }

    /**
     * The accumulated value for the unordered genotype {a1, a2} of sample
     * at marker.
     */
    pub fn value(&self, marker: usize, sample: usize, allele1: usize, allele2: usize) -> f32 {
        let gt = genotype_index(allele1, allele2);
        assert!(
            gt < self.markers.marker(marker).n_genotypes(),
            "genotype index out of bounds at marker {}: {}",
            marker,
            gt
        );
        let row = self.rows[sample].lock().unwrap();
        row[self.markers.sum_genotypes(marker) + gt]
    }

    /**
     * A copy of the accumulated row for sample, normalized per marker so
     * that each marker's genotype block sums to 1.0 when it has positive
     * mass.
     */
    pub fn normalized_row(&self, sample: usize) -> Vec<f32> {
        let mut row = self.rows[sample].lock().unwrap().clone();
        for m in 0..self.markers.n_markers() {
            let start = self.markers.sum_genotypes(m);
            let end = self.markers.sum_genotypes(m + 1);
            let sum: f32 = row[start..end].iter().sum();
            if sum > 0.0 {
                row[start..end].iter_mut().for_each(|v| *v /= sum);
            }
        }
        row
    }
}
