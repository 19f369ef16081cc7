extern crate currawong;

use currawong::haplotype::hap_pair::{BitHapPair, HapPair, SampleHapPairs};
use currawong::model::markers::{Marker, Markers};
use currawong::model::samples::Samples;
use currawong::model::genotype_index;

fn markers_with_allele_counts(counts: &[usize]) -> Markers {
    Markers::new(
        counts
            .iter()
            .enumerate()
            .map(|(i, n)| Marker::new(i as u64, *n))
            .collect(),
    )
}

#[test]
fn test_genotype_index_is_triangular() {
    assert_eq!(genotype_index(0, 0), 0);
    assert_eq!(genotype_index(0, 1), 1);
    assert_eq!(genotype_index(1, 0), 1);
    assert_eq!(genotype_index(1, 1), 2);
    assert_eq!(genotype_index(0, 2), 3);
    assert_eq!(genotype_index(2, 1), 4);
    assert_eq!(genotype_index(2, 2), 5);
}

#[test]
fn test_prefix_sums() {
    let markers = markers_with_allele_counts(&[2, 3, 2, 5]);
    assert_eq!(markers.n_markers(), 4);
    assert_eq!(markers.sum_alleles(0), 0);
    assert_eq!(markers.sum_alleles(2), 5);
    assert_eq!(markers.sum_alleles(4), 12);
    assert_eq!(markers.sum_genotypes(1), 3);
    assert_eq!(markers.sum_genotypes(2), 9);
    assert_eq!(markers.sum_genotypes(4), 27);
    // 1 bit for 2 alleles, 2 bits for 3, 3 bits for 5
    assert_eq!(markers.sum_haplotype_bits(1), 1);
    assert_eq!(markers.sum_haplotype_bits(2), 3);
    assert_eq!(markers.sum_haplotype_bits(4), 7);
    assert_eq!(markers.marker(3).n_genotypes(), 15);
}

#[test]
fn test_reverse_view() {
    let markers = markers_with_allele_counts(&[2, 3, 4]);
    let reversed = markers.reverse();
    assert_eq!(reversed.n_markers(), 3);
    assert_eq!(reversed.marker(0).n_alleles(), 4);
    assert_eq!(reversed.marker(2).n_alleles(), 2);
    assert_eq!(reversed.sum_alleles(3), markers.sum_alleles(3));
    assert_eq!(reversed.reverse(), markers);
}

#[test]
fn test_bit_hap_pair_round_trip() {
    let markers = markers_with_allele_counts(&[2, 3, 8, 2, 5]);
    let alleles1 = vec![1, 2, 7, 0, 4];
    let alleles2 = vec![0, 0, 5, 1, 3];
    let pair = BitHapPair::new(markers.clone(), 3, &alleles1, &alleles2);
    assert_eq!(pair.id_index(), 3);
    for m in 0..markers.n_markers() {
        assert_eq!(pair.allele1(m), alleles1[m]);
        assert_eq!(pair.allele2(m), alleles2[m]);
    }
}

#[test]
#[should_panic]
fn test_bit_hap_pair_rejects_out_of_range_allele() {
    let markers = markers_with_allele_counts(&[2, 2]);
    BitHapPair::new(markers, 0, &[0, 2], &[0, 0]);
}

#[test]
fn test_sample_hap_pairs_consistency() {
    let markers = markers_with_allele_counts(&[2, 2, 2]);
    let samples = Samples::new(vec!["s0".to_string(), "s1".to_string()]).unwrap();
    let pairs = vec![
        BitHapPair::new(markers.clone(), 0, &[0, 1, 0], &[1, 1, 0]),
        BitHapPair::new(markers.clone(), 1, &[0, 0, 0], &[1, 0, 1]),
    ];
    let hap_pairs = SampleHapPairs::new(markers.clone(), samples.clone(), pairs).unwrap();
    assert_eq!(hap_pairs.n_haps(), 4);
    assert_eq!(hap_pairs.allele(1, 0), 1);
    assert_eq!(hap_pairs.allele(1, 1), 1);
    assert_eq!(hap_pairs.allele(2, 3), 1);
    assert_eq!(hap_pairs.allele1(0, 1), 0);

    // wrong sample order is rejected
    let bad = vec![
        BitHapPair::new(markers.clone(), 1, &[0, 0, 0], &[0, 0, 0]),
        BitHapPair::new(markers.clone(), 0, &[0, 0, 0], &[0, 0, 0]),
    ];
    assert!(SampleHapPairs::new(markers, samples, bad).is_err());
}

#[test]
fn test_samples_reject_duplicates() {
    assert!(Samples::new(vec!["a".to_string(), "a".to_string()]).is_err());
    let samples = Samples::new(vec!["a".to_string(), "b".to_string()]).unwrap();
    assert_eq!(samples.index_of("b"), Some(1));
    assert_eq!(samples.index_of("c"), None);
    assert_eq!(samples.id(0), "a");
}
