extern crate currawong;
#[macro_use]
extern crate approx;

use currawong::baum::duo_baum::DuoBaum;
use currawong::baum::hap_baum::HapBaum;
use currawong::dag::{Dag, DagEdge, DagLevel};
use currawong::haplotype::hap_pair::HapPair;
use currawong::model::likelihoods::{TabularAlleleLikelihoods, TabularLikelihoods};
use currawong::model::markers::{Marker, Markers};
use currawong::model::samples::Samples;

fn biallelic_markers(n_markers: usize) -> Markers {
    Markers::new((0..n_markers).map(|i| Marker::new(i as u64, 2)).collect())
}

fn samples(n_samples: usize) -> Samples {
    Samples::new((0..n_samples).map(|i| format!("sample{}", i)).collect()).unwrap()
}

fn single_level_dag(cond0: f32, cond1: f32) -> Dag {
    Dag::new(
        vec![DagLevel::new(
            vec![1.0],
            vec![DagEdge::new(0, 0, 0, cond0), DagEdge::new(0, 1, 1, cond1)],
        )
        .unwrap()],
        vec![0.0],
    )
    .unwrap()
}

fn ladder_dag(n_levels: usize) -> Dag {
    let mut levels = Vec::with_capacity(n_levels);
    levels.push(
        DagLevel::new(
            vec![1.0],
            vec![DagEdge::new(0, 0, 0, 0.6), DagEdge::new(0, 1, 1, 0.4)],
        )
        .unwrap(),
    );
    for _ in 1..n_levels {
        levels.push(
            DagLevel::new(
                vec![0.6, 0.4],
                vec![
                    DagEdge::new(0, 0, 0, 0.6),
                    DagEdge::new(0, 1, 1, 0.4),
                    DagEdge::new(1, 0, 0, 0.6),
                    DagEdge::new(1, 1, 1, 0.4),
                ],
            )
            .unwrap(),
        );
    }
    let pos = (0..n_levels).map(|m| m as f64 * 0.1).collect();
    Dag::new(levels, pos).unwrap()
}

#[test]
fn test_duo_degenerate_single_marker() {
    let dag = single_level_dag(0.6, 0.4);
    let markers = biallelic_markers(1);
    let mut gl = TabularLikelihoods::new(markers.clone(), samples(2));
    gl.set(0, 0, 0, 0, 1.0);
    gl.set(0, 1, 0, 0, 1.0);

    let mut baum = DuoBaum::new(&dag, &gl, 11, 3, false).unwrap();
    let mut probs_a = vec![0f32; markers.sum_genotypes(1)];
    let mut probs_b = probs_a.clone();
    let (pairs_a, pairs_b) = baum
        .random_sample_probs(0, 1, &mut probs_a, &mut probs_b)
        .unwrap();
    assert_eq!(pairs_a.len(), 3);
    assert_eq!(pairs_b.len(), 3);
    for (a, b) in pairs_a.iter().zip(pairs_b.iter()) {
        assert_eq!(a.id_index(), 0);
        assert_eq!(b.id_index(), 1);
        assert_eq!(a.allele1(0), 0);
        assert_eq!(a.allele2(0), 0);
        // the transmitted haplotype is shared
        assert_eq!(a.allele1(0), b.allele1(0));
        assert_eq!(b.allele2(0), 0);
    }
    assert_abs_diff_eq!(probs_a[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(probs_b[0], 1.0, epsilon = 1e-6);
}

#[test]
fn test_duo_posteriors_sum_to_one() {
    let n_markers = 8;
    let dag = ladder_dag(n_markers);
    let markers = biallelic_markers(n_markers);
    let mut gl = TabularLikelihoods::new(markers.clone(), samples(2));
    for m in 0..n_markers {
        for s in 0..2 {
            for (g, (a1, a2)) in [(0, 0), (0, 1), (1, 1)].iter().enumerate() {
                let value = 1.0 + ((m * 13 + g * 5 + s * 3) % 7) as f32;
                gl.set(m, s, *a1, *a2, value / 8.0);
            }
        }
    }
    let mut baum = DuoBaum::new(&dag, &gl, 23, 2, true).unwrap();
    let mut probs_a = vec![0f32; markers.sum_genotypes(n_markers)];
    let mut probs_b = probs_a.clone();
    baum.random_sample_probs(0, 1, &mut probs_a, &mut probs_b)
        .unwrap();
    for m in 0..n_markers {
        let start = markers.sum_genotypes(m);
        let end = markers.sum_genotypes(m + 1);
        let sum_a: f32 = probs_a[start..end].iter().sum();
        let sum_b: f32 = probs_b[start..end].iter().sum();
        assert_abs_diff_eq!(sum_a, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(sum_b, 1.0, epsilon = 1e-4);
    }
}

#[test]
fn test_duo_transmitted_haplotype_is_shared() {
    let n_markers = 6;
    let dag = ladder_dag(n_markers);
    let markers = biallelic_markers(n_markers);
    let gl = TabularLikelihoods::uniform(markers, samples(2));
    let mut baum = DuoBaum::new(&dag, &gl, 5, 4, false).unwrap();
    let (pairs_a, pairs_b) = baum.random_sample(0, 1).unwrap();
    for (a, b) in pairs_a.iter().zip(pairs_b.iter()) {
        for m in 0..n_markers {
            assert_eq!(a.allele1(m), b.allele1(m));
        }
    }
}

#[test]
fn test_hap_baum_posterior_matches_edge_frequencies() {
    // uniform allele evidence leaves the DAG marginals as the posterior
    let dag = single_level_dag(0.6, 0.4);
    let markers = biallelic_markers(1);
    let al = TabularAlleleLikelihoods::uniform(markers.clone(), 1);
    let mut baum = HapBaum::new(&dag, &al, 3, 2, false).unwrap();
    let mut al_probs = vec![0f32; markers.sum_alleles(1)];
    let sampled = baum.random_sample_probs(0, &mut al_probs).unwrap();
    assert_eq!(sampled.len(), 2);
    assert_abs_diff_eq!(al_probs[0], 0.6, epsilon = 1e-5);
    assert_abs_diff_eq!(al_probs[1], 0.4, epsilon = 1e-5);
}

#[test]
fn test_hap_baum_pins_observed_allele() {
    let n_markers = 5;
    let dag = ladder_dag(n_markers);
    let markers = biallelic_markers(n_markers);
    let mut al = TabularAlleleLikelihoods::new(markers.clone(), 1);
    for m in 0..n_markers {
        al.set(m, 0, 1, 1.0);
    }
    let mut baum = HapBaum::new(&dag, &al, 77, 3, true).unwrap();
    let mut al_probs = vec![0f32; markers.sum_alleles(n_markers)];
    let sampled = baum.random_sample_probs(0, &mut al_probs).unwrap();
    for alleles in sampled.iter() {
        assert!(alleles.iter().all(|a| *a == 1));
    }
    for m in 0..n_markers {
        let start = markers.sum_alleles(m);
        assert_abs_diff_eq!(al_probs[start], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(al_probs[start + 1], 1.0, epsilon = 1e-6);
    }
}
