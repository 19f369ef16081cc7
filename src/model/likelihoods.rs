use crate::errors::HmmError;
use crate::model::genotype_index;
use crate::model::markers::{Marker, Markers};
use crate::model::samples::Samples;

/**
 * Per-sample genotype emission evidence. gl(m, s, a1, a2) is the likelihood
 * of the observed data for sample s at marker m given the unordered
 * genotype {a1, a2}. Values are finite and nonnegative, and for each sample
 * and marker at least one genotype has positive likelihood.
 */
pub trait GenotypeLikelihoods: Send + Sync {
    fn markers(&self) -> &Markers;

    fn samples(&self) -> &Samples;

    fn gl(&self, marker: usize, sample: usize, allele1: usize, allele2: usize) -> f32;

    fn n_markers(&self) -> usize {
        self.markers().n_markers()
    }

    fn marker(&self, marker: usize) -> &Marker {
        self.markers().marker(marker)
    }

    fn n_samples(&self) -> usize {
        self.samples().n_samples()
    }

    /**
     * Checks that every sample has at least one genotype with positive
     * likelihood at every marker.
     */
    fn validate(&self) -> Result<(), HmmError> {
        for m in 0..self.n_markers() {
            let n_alleles = self.marker(m).n_alleles();
            for s in 0..self.n_samples() {
                let mut max_gl = 0f32;
                for a2 in 0..n_alleles {
                    for a1 in 0..=a2 {
                        max_gl = max_gl.max(self.gl(m, s, a1, a2));
                    }
                }
                if max_gl <= 0.0 {
                    return Err(HmmError::NoConsistentState { marker: m, sample: s });
                }
            }
        }
        Ok(())
    }
}

/**
 * Per-haplotype allele emission evidence: al(m, h, a) is the likelihood of
 * the observed data for haplotype h at marker m given allele a.
 */
pub trait AlleleLikelihoods: Send + Sync {
    fn markers(&self) -> &Markers;

    fn n_haps(&self) -> usize;

    fn al(&self, marker: usize, hap: usize, allele: usize) -> f32;

    fn n_markers(&self) -> usize {
        self.markers().n_markers()
    }

    fn marker(&self, marker: usize) -> &Marker {
        self.markers().marker(marker)
    }
}

/**
 * Dense genotype likelihood table. Storage is sample major with the
 * per-marker genotype blocks located through the marker prefix sums.
 */
#[derive(Debug, Clone)]
pub struct TabularLikelihoods {
    markers: Markers,
    samples: Samples,
    values: Vec<f32>,
}

impl TabularLikelihoods {
    pub fn new(markers: Markers, samples: Samples) -> TabularLikelihoods {
        let stride = markers.sum_genotypes(markers.n_markers());
        let values = vec![0f32; stride * samples.n_samples()];
        TabularLikelihoods {
            markers,
            samples,
            values,
        }
    }

    /**
     * Table with every genotype likelihood set to 1.0.
     */
    pub fn uniform(markers: Markers, samples: Samples) -> TabularLikelihoods {
        let mut gl = TabularLikelihoods::new(markers, samples);
        gl.values.iter_mut().for_each(|v| *v = 1.0);
        gl
    }

    fn offset(&self, marker: usize, sample: usize, allele1: usize, allele2: usize) -> usize {
        let n_alleles = self.markers.marker(marker).n_alleles();
        assert!(
            allele1 < n_alleles && allele2 < n_alleles,
            "allele index out of bounds at marker {}: ({}, {})",
            marker,
            allele1,
            allele2
        );
        let stride = self.markers.sum_genotypes(self.markers.n_markers());
        sample * stride + self.markers.sum_genotypes(marker) + genotype_index(allele1, allele2)
    }

    pub fn set(&mut self, marker: usize, sample: usize, allele1: usize, allele2: usize, value: f32) {
        assert!(
            value >= 0.0 && value.is_finite(),
            "genotype likelihood must be finite and nonnegative: {}",
            value
        );
        let offset = self.offset(marker, sample, allele1, allele2);
        self.values[offset] = value;
    }
}

impl GenotypeLikelihoods for TabularLikelihoods {
    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn samples(&self) -> &Samples {
        &self.samples
    }

    fn gl(&self, marker: usize, sample: usize, allele1: usize, allele2: usize) -> f32 {
        self.values[self.offset(marker, sample, allele1, allele2)]
    }
}

/**
 * Dense allele likelihood table, haplotype major.
 */
#[derive(Debug, Clone)]
pub struct TabularAlleleLikelihoods {
    markers: Markers,
    n_haps: usize,
    values: Vec<f32>,
}

impl TabularAlleleLikelihoods {
    pub fn new(markers: Markers, n_haps: usize) -> TabularAlleleLikelihoods {
        let stride = markers.sum_alleles(markers.n_markers());
        let values = vec![0f32; stride * n_haps];
        TabularAlleleLikelihoods {
            markers,
            n_haps,
            values,
        }
    }

    pub fn uniform(markers: Markers, n_haps: usize) -> TabularAlleleLikelihoods {
        let mut al = TabularAlleleLikelihoods::new(markers, n_haps);
        al.values.iter_mut().for_each(|v| *v = 1.0);
        al
    }

    fn offset(&self, marker: usize, hap: usize, allele: usize) -> usize {
        assert!(
            allele < self.markers.marker(marker).n_alleles(),
            "allele index out of bounds at marker {}: {}",
            marker,
            allele
        );
        assert!(hap < self.n_haps, "haplotype index out of bounds: {}", hap);
        let stride = self.markers.sum_alleles(self.markers.n_markers());
        hap * stride + self.markers.sum_alleles(marker) + allele
    }

    pub fn set(&mut self, marker: usize, hap: usize, allele: usize, value: f32) {
        assert!(
            value >= 0.0 && value.is_finite(),
            "allele likelihood must be finite and nonnegative: {}",
            value
        );
        let offset = self.offset(marker, hap, allele);
        self.values[offset] = value;
    }
}

impl AlleleLikelihoods for TabularAlleleLikelihoods {
    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn n_haps(&self) -> usize {
        self.n_haps
    }

    fn al(&self, marker: usize, hap: usize, allele: usize) -> f32 {
        self.values[self.offset(marker, hap, allele)]
    }
}
