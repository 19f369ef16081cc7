use std::collections::HashMap;

/**
 * Collapses haplotypes to allele-sequence equivalence classes over a run
 * of positions. Haplotypes receive the same code exactly when they carry
 * identical alleles at every position; codes are compact indices in
 * [0, n_codes) assigned in order of first appearance. Coding ref and
 * target haplotypes jointly makes their codes directly comparable.
 *
 * @param allele_at the allele of haplotype h at the run position p
 * @return the per-haplotype codes and the number of distinct codes
 */
pub fn code_sequences<F>(n_positions: usize, n_haps: usize, allele_at: F) -> (Vec<u32>, usize)
where
    F: Fn(usize, usize) -> usize,
{
    let mut codes = vec![0u32; n_haps];
    if n_haps == 0 {
        return (codes, 0);
    }
    let mut next_codes = vec![0u32; n_haps];
    let mut map: HashMap<(u32, usize), u32> = HashMap::new();
    let mut n_codes = 1usize;
    for p in 0..n_positions {
        map.clear();
        let mut next = 0u32;
        for h in 0..n_haps {
            let key = (codes[h], allele_at(p, h));
            let code = *map.entry(key).or_insert_with(|| {
                let c = next;
                next += 1;
                c
            });
            next_codes[h] = code;
        }
        std::mem::swap(&mut codes, &mut next_codes);
        n_codes = next.max(1) as usize;
    }
    (codes, n_codes)
}
