extern crate currawong;
#[macro_use]
extern crate approx;

use currawong::dag::{level_recomb_probs, Dag, DagEdge, DagLevel};
use currawong::haplotype::hap_pair::{BitHapPair, HapPair, SampleHapPairs};
use currawong::imputation::ref_clusters::RefClusters;
use currawong::model::genotype_values::GenotypeValues;
use currawong::model::likelihoods::{GenotypeLikelihoods, TabularLikelihoods};
use currawong::model::markers::{Marker, Markers};
use currawong::model::samples::Samples;
use currawong::ibd::hap_segment::HapSegment;
use currawong::ibd::permitted_states::HapStates;
use currawong::processing::imputation_engine::ImputationEngine;
use currawong::processing::phasing_engine::{IbsSegmentProvider, PhasingEngine};
use currawong::processing::{PhaseConfig, POISON};

use std::sync::Arc;

fn biallelic_markers(n_markers: usize) -> Markers {
    Markers::new((0..n_markers).map(|i| Marker::new(i as u64, 2)).collect())
}

fn samples(n_samples: usize) -> Samples {
    Samples::new((0..n_samples).map(|i| format!("sample{}", i)).collect()).unwrap()
}

fn ladder_dag(n_levels: usize) -> Dag {
    let mut levels = Vec::with_capacity(n_levels);
    levels.push(
        DagLevel::new(
            vec![1.0],
            vec![DagEdge::new(0, 0, 0, 0.5), DagEdge::new(0, 1, 1, 0.5)],
        )
        .unwrap(),
    );
    for _ in 1..n_levels {
        levels.push(
            DagLevel::new(
                vec![0.5, 0.5],
                vec![
                    DagEdge::new(0, 0, 0, 0.5),
                    DagEdge::new(0, 1, 1, 0.5),
                    DagEdge::new(1, 0, 0, 0.5),
                    DagEdge::new(1, 1, 1, 0.5),
                ],
            )
            .unwrap(),
        );
    }
    let pos = (0..n_levels).map(|m| m as f64 * 0.3).collect();
    Dag::new(levels, pos).unwrap()
}

fn patterned_gl(n_markers: usize, n_samples: usize) -> TabularLikelihoods {
    let markers = biallelic_markers(n_markers);
    let mut gl = TabularLikelihoods::new(markers, samples(n_samples));
    for m in 0..n_markers {
        for s in 0..n_samples {
            for (g, (a1, a2)) in [(0, 0), (0, 1), (1, 1)].iter().enumerate() {
                let value = 1.0 + ((m * 29 + g * 11 + s * 13) % 9) as f32;
                gl.set(m, s, *a1, *a2, value / 10.0);
            }
        }
    }
    gl
}

fn config(n_threads: usize, k: usize) -> PhaseConfig {
    PhaseConfig {
        n_samples_per_individual: k,
        seed: 987,
        low_mem: true,
        n_threads,
        ..PhaseConfig::default()
    }
}

fn alleles(pairs: &[BitHapPair], n_markers: usize) -> Vec<(usize, Vec<usize>, Vec<usize>)> {
    pairs
        .iter()
        .map(|p| {
            (
                p.id_index(),
                (0..n_markers).map(|m| p.allele1(m)).collect(),
                (0..n_markers).map(|m| p.allele2(m)).collect(),
            )
        })
        .collect()
}

#[test]
fn test_poison_is_a_reserved_negative_item() {
    assert!(POISON < 0);
}

#[test]
fn test_output_is_invariant_under_worker_count() {
    let n_markers = 14;
    let n_samples = 5;
    let dag = ladder_dag(n_markers);
    let gl = patterned_gl(n_markers, n_samples);

    let serial = PhasingEngine::new(&dag, &gl, config(1, 2)).unwrap();
    let parallel = PhasingEngine::new(&dag, &gl, config(4, 2)).unwrap();
    let pairs_serial = serial.sample_haplotypes(None).unwrap();
    let pairs_parallel = parallel.sample_haplotypes(None).unwrap();
    assert_eq!(pairs_serial.len(), n_samples * 2);
    assert_eq!(
        alleles(&pairs_serial, n_markers),
        alleles(&pairs_parallel, n_markers)
    );
}

#[test]
fn test_recomb_engine_with_posteriors() {
    let n_markers = 10;
    let n_samples = 3;
    let dag = ladder_dag(n_markers);
    let gl = patterned_gl(n_markers, n_samples);
    let p_recomb = level_recomb_probs(&dag, 20_000.0, 60, 1.0, 1.0);
    let markers = gl.markers().clone();
    let engine = PhasingEngine::new(&dag, &gl, config(3, 1)).unwrap();

    let gv = GenotypeValues::new(markers.clone(), gl.samples().clone());
    let pairs = engine.sample_haplotypes_recomb(&p_recomb, Some(&gv)).unwrap();
    assert_eq!(pairs.len(), n_samples);
    // one aggregated posterior per sample, each marker block sums to one
    for s in 0..n_samples {
        let row = gv.normalized_row(s);
        for m in 0..n_markers {
            let start = markers.sum_genotypes(m);
            let end = markers.sum_genotypes(m + 1);
            let sum: f32 = row[start..end].iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_sampled_pairs_are_grouped_by_sample() {
    let n_markers = 8;
    let n_samples = 4;
    let dag = ladder_dag(n_markers);
    let gl = patterned_gl(n_markers, n_samples);
    let engine = PhasingEngine::new(&dag, &gl, config(2, 3)).unwrap();
    let pairs = engine.sample_haplotypes(None).unwrap();
    assert_eq!(pairs.len(), n_samples * 3);
    for (i, pair) in pairs.iter().enumerate() {
        assert_eq!(pair.id_index(), i / 3);
    }
}

#[test]
fn test_engine_rejects_inconsistent_inputs() {
    let dag = ladder_dag(3);
    let gl = patterned_gl(4, 1);
    assert!(PhasingEngine::new(&dag, &gl, config(1, 1)).is_err());

    let gl = patterned_gl(3, 1);
    let mut bad = config(1, 1);
    bad.n_samples_per_individual = 0;
    assert!(PhasingEngine::new(&dag, &gl, bad).is_err());
}

struct FullSpanSegments {
    n_markers: usize,
    ref_hap: usize,
}

impl IbsSegmentProvider for FullSpanSegments {
    fn segments(&self, _sample: usize, _target_hap: usize) -> Vec<HapSegment> {
        vec![HapSegment::new(self.ref_hap, 0, self.n_markers - 1)]
    }
}

#[test]
fn test_restricted_engine_follows_covering_haplotype() {
    let n_markers = 7;
    let n_samples = 2;
    let dag = ladder_dag(n_markers);
    let markers = biallelic_markers(n_markers);
    let gl = TabularLikelihoods::uniform(markers.clone(), samples(n_samples));
    let p_recomb = level_recomb_probs(&dag, 10_000.0, 80, 1.0, 1.0);

    let ref_samples = Samples::new(vec!["r0".to_string()]).unwrap();
    let ref_pair = BitHapPair::new(
        markers.clone(),
        0,
        &vec![0; n_markers],
        &vec![1; n_markers],
    );
    let refs = SampleHapPairs::new(markers, ref_samples, vec![ref_pair]).unwrap();
    let hap_states = Arc::new(HapStates::new(&dag, &refs).unwrap());
    let provider = FullSpanSegments {
        n_markers,
        ref_hap: 1,
    };

    let engine = PhasingEngine::new(&dag, &gl, config(2, 2)).unwrap();
    let pairs = engine
        .sample_haplotypes_restricted(&p_recomb, &hap_states, &provider, None)
        .unwrap();
    assert_eq!(pairs.len(), n_samples * 2);
    for pair in pairs.iter() {
        for m in 0..n_markers {
            assert_eq!(pair.allele1(m), 1);
            assert_eq!(pair.allele2(m), 1);
        }
    }
}

#[test]
fn test_imputation_engine_matches_serial_runs() {
    let n_ref = 16;
    let n_targ = 8;
    let ref_markers = biallelic_markers(n_ref);
    let targ_markers = biallelic_markers(n_targ);
    let ref_samples = Samples::new(vec!["r0".to_string(), "r1".to_string()]).unwrap();
    let ref_pairs = vec![
        BitHapPair::new(
            ref_markers.clone(),
            0,
            &(0..n_ref).map(|m| m % 2).collect::<Vec<usize>>(),
            &vec![0; n_ref],
        ),
        BitHapPair::new(
            ref_markers.clone(),
            1,
            &(0..n_ref).map(|m| (m / 4) % 2).collect::<Vec<usize>>(),
            &vec![1; n_ref],
        ),
    ];
    let refs = SampleHapPairs::new(ref_markers.clone(), ref_samples, ref_pairs).unwrap();
    let targ_to_ref: Vec<usize> = (0..n_targ).map(|t| 2 * t).collect();
    let targ_samples = Samples::new(vec!["t0".to_string()]).unwrap();
    let targ_pairs = vec![BitHapPair::new(
        targ_markers.clone(),
        0,
        &targ_to_ref.iter().map(|r| r % 2).collect::<Vec<usize>>(),
        &vec![0; n_targ],
    )];
    let targs = SampleHapPairs::new(targ_markers, targ_samples, targ_pairs).unwrap();
    let gen_pos: Vec<f64> = (0..n_ref).map(|m| m as f64 * 0.25).collect();
    let data =
        RefClusters::new(&refs, &targs, &targ_to_ref, &gen_pos, 0.01, 9_000.0, 0.0).unwrap();

    let serial = ImputationEngine::new(&data, 1, false).unwrap();
    let parallel = ImputationEngine::new(&data, 3, true).unwrap();
    let probs_serial = serial.impute_all().unwrap();
    let probs_parallel = parallel.impute_all().unwrap();
    assert_eq!(probs_serial.n_haps(), 2);
    for hap in 0..2 {
        for m in 0..n_ref {
            for a in 0..2 {
                assert_abs_diff_eq!(
                    probs_serial.al_prob(m, hap, a),
                    probs_parallel.al_prob(m, hap, a),
                    epsilon = 1e-5
                );
            }
            let total: f32 = (0..2).map(|a| probs_serial.al_prob(m, hap, a)).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-4);
        }
    }
}
