pub mod genotype_values;
pub mod likelihoods;
pub mod markers;
pub mod samples;

/**
 * Returns the index of the unordered genotype {a1, a2} in the triangular
 * ordering, so that for a marker with n alleles the genotypes (0,0), (0,1),
 * (1,1), (0,2), (1,2), (2,2), ... occupy indices 0 .. n*(n+1)/2.
 */
pub fn genotype_index(a1: usize, a2: usize) -> usize {
    if a1 <= a2 {
        a2 * (a2 + 1) / 2 + a1
    } else {
        a1 * (a1 + 1) / 2 + a2
    }
}
