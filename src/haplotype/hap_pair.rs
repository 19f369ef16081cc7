use std::sync::Arc;

use bv::{BitVec, Bits, BitsMut};

use crate::errors::HmmError;
use crate::model::markers::Markers;
use crate::model::samples::Samples;

/**
 * An ordered pair of haplotypes for one sample across a marker list.
 */
pub trait HapPair: Send + Sync {
    fn markers(&self) -> &Markers;

    fn allele1(&self, marker: usize) -> usize;

    fn allele2(&self, marker: usize) -> usize;

    /**
     * Index of the sample the haplotype pair belongs to.
     */
    fn id_index(&self) -> usize;

    fn n_markers(&self) -> usize {
        self.markers().n_markers()
    }
}

/**
 * A haplotype pair stored as packed allele bits. The bit span of marker m
 * is located through Markers::sum_haplotype_bits, so markers with different
 * allele counts pack without padding.
 */
#[derive(Debug, Clone)]
pub struct BitHapPair {
    markers: Markers,
    id_index: usize,
    alleles1: Arc<BitVec<u64>>,
    alleles2: Arc<BitVec<u64>>,
}

impl BitHapPair {
    pub fn new(
        markers: Markers,
        id_index: usize,
        alleles1: &[usize],
        alleles2: &[usize],
    ) -> BitHapPair {
        assert_eq!(
            alleles1.len(),
            markers.n_markers(),
            "allele sequence length does not match the marker list"
        );
        assert_eq!(
            alleles2.len(),
            markers.n_markers(),
            "allele sequence length does not match the marker list"
        );
        let alleles1 = Arc::new(Self::pack(&markers, alleles1));
        let alleles2 = Arc::new(Self::pack(&markers, alleles2));
        BitHapPair {
            markers,
            id_index,
            alleles1,
            alleles2,
        }
    }

    fn pack(markers: &Markers, alleles: &[usize]) -> BitVec<u64> {
        let n_bits = markers.sum_haplotype_bits(markers.n_markers());
        let mut bits = BitVec::new_fill(false, n_bits as u64);
        for (m, allele) in alleles.iter().enumerate() {
            assert!(
                *allele < markers.marker(m).n_alleles(),
                "allele index out of bounds at marker {}: {}",
                m,
                allele
            );
            let start = markers.sum_haplotype_bits(m);
            let width = markers.sum_haplotype_bits(m + 1) - start;
            for bit in 0..width {
                if allele & (1 << bit) != 0 {
                    bits.set_bit((start + bit) as u64, true);
                }
            }
        }
        bits
    }

    fn unpack(&self, bits: &BitVec<u64>, marker: usize) -> usize {
        let start = self.markers.sum_haplotype_bits(marker);
        let end = self.markers.sum_haplotype_bits(marker + 1);
        let mut allele = 0usize;
        for (shift, index) in (start..end).enumerate() {
            if bits.get_bit(index as u64) {
                allele |= 1 << shift;
            }
        }
        allele
    }
}

impl HapPair for BitHapPair {
    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn allele1(&self, marker: usize) -> usize {
        self.unpack(&self.alleles1, marker)
    }

    fn allele2(&self, marker: usize) -> usize {
        self.unpack(&self.alleles2, marker)
    }

    fn id_index(&self) -> usize {
        self.id_index
    }
}

/**
 * One haplotype pair per sample over a shared marker list. Haplotype
 * indices interleave the pairs: haplotype 2*s is the first haplotype of
 * sample s and haplotype 2*s + 1 the second.
 */
#[derive(Debug, Clone)]
pub struct SampleHapPairs {
    markers: Markers,
    samples: Samples,
    pairs: Arc<Vec<BitHapPair>>,
}

impl SampleHapPairs {
    pub fn new(
        markers: Markers,
        samples: Samples,
        pairs: Vec<BitHapPair>,
    ) -> Result<SampleHapPairs, HmmError> {
        if pairs.len() != samples.n_samples() {
            return Err(HmmError::InconsistentInputs {
                msg: format!(
                    "{} haplotype pairs for {} samples",
                    pairs.len(),
                    samples.n_samples()
                ),
            });
        }
        for (s, pair) in pairs.iter().enumerate() {
            if pair.markers() != &markers {
                return Err(HmmError::InconsistentInputs {
                    msg: format!("haplotype pair {} has a different marker list", s),
                });
            }
            if pair.id_index() != s {
                return Err(HmmError::InconsistentInputs {
                    msg: format!(
                        "haplotype pair at position {} carries sample index {}",
                        s,
                        pair.id_index()
                    ),
                });
            }
        }
        Ok(SampleHapPairs {
            markers,
            samples,
            pairs: Arc::new(pairs),
        })
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
        self.pairs.len()
    }

    pub fn n_haps(&self) -> usize {
        2 * self.pairs.len()
    }

    pub fn hap_pair(&self, sample: usize) -> &BitHapPair {
        &self.pairs[sample]
    }

    /**
     * The allele carried by haplotype hap at marker.
     */
    pub fn allele(&self, marker: usize, hap: usize) -> usize {
        let pair = &self.pairs[hap / 2];
        if hap % 2 == 0 {
            pair.allele1(marker)
        } else {
            pair.allele2(marker)
        }
    }

    pub fn allele1(&self, marker: usize, sample: usize) -> usize {
        self.pairs[sample].allele1(marker)
    }

    pub fn allele2(&self, marker: usize, sample: usize) -> usize {
        self.pairs[sample].allele2(marker)
    }
}
