use std::sync::Arc;

/**
 * A genomic site with an allele alphabet. The identifier is opaque to the
 * phasing and imputation engines, which only consume the allele count and
 * the derived genotype and storage-bit counts.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    id: u64,
    n_alleles: usize,
}

impl Marker {
    pub fn new(id: u64, n_alleles: usize) -> Marker {
        assert!(n_alleles >= 1, "a marker must have at least one allele");
        Marker { id, n_alleles }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn n_alleles(&self) -> usize {
        self.n_alleles
    }

    /**
     * Number of distinct unordered genotypes at this marker.
     */
    pub fn n_genotypes(&self) -> usize {
        self.n_alleles * (self.n_alleles + 1) / 2
    }

    /**
     * Number of bits required to store one allele of this marker.
     */
    pub fn n_haplotype_bits(&self) -> usize {
        let mut bits = 1;
        while (1usize << bits) < self.n_alleles {
            bits += 1;
        }
        bits
    }
}

#[derive(Debug)]
struct MarkersData {
    markers: Vec<Marker>,
    sum_alleles: Vec<usize>,
    sum_genotypes: Vec<usize>,
    sum_haplotype_bits: Vec<usize>,
}

/**
 * An immutable ordered list of markers with prefix sums of the per-marker
 * allele, genotype, and haplotype-bit counts. Cloning is cheap, the backing
 * data is shared.
 */
#[derive(Debug, Clone)]
pub struct Markers {
    data: Arc<MarkersData>,
}

impl Markers {
    pub fn new(markers: Vec<Marker>) -> Markers {
        let n = markers.len();
        let mut sum_alleles = Vec::with_capacity(n + 1);
        let mut sum_genotypes = Vec::with_capacity(n + 1);
        let mut sum_haplotype_bits = Vec::with_capacity(n + 1);
        sum_alleles.push(0);
        sum_genotypes.push(0);
        sum_haplotype_bits.push(0);
        for marker in markers.iter() {
            sum_alleles.push(sum_alleles.last().unwrap() + marker.n_alleles());
            sum_genotypes.push(sum_genotypes.last().unwrap() + marker.n_genotypes());
            sum_haplotype_bits.push(sum_haplotype_bits.last().unwrap() + marker.n_haplotype_bits());
        }
        Markers {
            data: Arc::new(MarkersData {
                markers,
                sum_alleles,
                sum_genotypes,
                sum_haplotype_bits,
            }),
        }
    }

    pub fn n_markers(&self) -> usize {
        self.data.markers.len()
    }

    pub fn marker(&self, marker: usize) -> &Marker {
        &self.data.markers[marker]
    }

    pub fn markers(&self) -> &[Marker] {
        &self.data.markers
    }

    /**
     * Sum of allele counts for markers with index < marker.
     */
    pub fn sum_alleles(&self, marker: usize) -> usize {
        self.data.sum_alleles[marker]
    }

    /**
     * Sum of genotype counts for markers with index < marker.
     */
    pub fn sum_genotypes(&self, marker: usize) -> usize {
        self.data.sum_genotypes[marker]
    }

    /**
     * Sum of per-allele storage bits for markers with index < marker.
     */
    pub fn sum_haplotype_bits(&self, marker: usize) -> usize {
        self.data.sum_haplotype_bits[marker]
    }

    /**
     * Returns a marker list with the marker order reversed.
     */
    pub fn reverse(&self) -> Markers {
        let mut markers = self.data.markers.clone();
        markers.reverse();
        Markers::new(markers)
    }
}

impl PartialEq for Markers {
    fn eq(&self, other: &Markers) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data.markers == other.data.markers
    }
}

impl Eq for Markers {}
