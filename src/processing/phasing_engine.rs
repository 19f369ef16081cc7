use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver};
use scoped_threadpool::Pool;

use crate::baum::recomb_single_baum::RecombSingleBaum;
use crate::baum::single_baum::{check_dag_and_gl, SingleBaum};
use crate::dag::Dag;
use crate::errors::HmmError;
use crate::haplotype::hap_pair::{BitHapPair, HapPair};
use crate::ibd::hap_segment::HapSegment;
use crate::ibd::permitted_states::{HapStates, SinglePermittedStates};
use crate::model::genotype_values::GenotypeValues;
use crate::model::likelihoods::GenotypeLikelihoods;
use crate::processing::{PhaseConfig, POISON};

/**
 * Supplies the IBS segments shared between a target haplotype and the
 * reference haplotypes; target_hap selects the first or second haplotype
 * of the sample's pair.
 */
pub trait IbsSegmentProvider: Sync {
    fn segments(&self, sample: usize, target_hap: usize) -> Vec<HapSegment>;
}

/**
 * Dispatches per-sample haplotype sampling over a pool of worker threads.
 * Work items travel through a bounded queue; each worker owns one
 * thread-confined sampler and appends its results to shared sinks, and a
 * poison item enqueued once per worker ends the run. Sampled output is
 * invariant under the thread count because every sampler re-derives its
 * random stream per sample.
 */
pub struct PhasingEngine<'a, G: GenotypeLikelihoods> {
    dag: &'a Dag,
    gl: &'a G,
    config: PhaseConfig,
}

impl<'a, G: GenotypeLikelihoods> PhasingEngine<'a, G> {
    pub fn new(dag: &'a Dag, gl: &'a G, config: PhaseConfig) -> Result<PhasingEngine<'a, G>, HmmError> {
        config.validate()?;
        check_dag_and_gl(dag, gl)?;
        gl.validate()?;
        Ok(PhasingEngine { dag, gl, config })
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /**
     * Samples haplotype pairs for every sample with the no-recombination
     * transition model. Returns the pairs grouped by sample, each sample
     * contributing n_samples_per_individual pairs; gv, when present,
     * accumulates the posterior genotype probabilities once per sample.
     */
    pub fn sample_haplotypes(
        &self,
        gv: Option<&GenotypeValues>,
    ) -> Result<Vec<BitHapPair>, HmmError> {
        self.check_gv(gv)?;
        self.run(|queue, sink, failure| {
            let mut baum = match SingleBaum::new(
                self.dag,
                self.gl,
                self.config.seed,
                self.config.n_samples_per_individual,
                self.config.low_mem,
            ) {
                Ok(baum) => baum,
                Err(e) => {
                    record_failure(failure, e);
                    drain(queue);
                    return;
                }
            };
            let mut gt_probs = self.gt_probs_buffer(gv);
            while let Some(sample) = next_item(queue) {
                let result = match gt_probs.as_deref_mut() {
                    Some(buf) => baum.random_sample_probs(sample, buf),
                    None => baum.random_sample(sample),
                };
                self.collect(sample, result, gt_probs.as_deref(), gv, sink, failure);
            }
        })
    }

    /**
     * Samples haplotype pairs with the recombination-augmented transition
     * model.
     */
    pub fn sample_haplotypes_recomb(
        &self,
        p_recomb: &[f32],
        gv: Option<&GenotypeValues>,
    ) -> Result<Vec<BitHapPair>, HmmError> {
        self.check_gv(gv)?;
        self.run(|queue, sink, failure| {
            let mut baum = match RecombSingleBaum::new(
                self.dag,
                self.gl,
                self.config.seed,
                self.config.n_samples_per_individual,
                self.config.low_mem,
                p_recomb.to_vec(),
            ) {
                Ok(baum) => baum,
                Err(e) => {
                    record_failure(failure, e);
                    drain(queue);
                    return;
                }
            };
            let mut gt_probs = self.gt_probs_buffer(gv);
            while let Some(sample) = next_item(queue) {
                let result = match gt_probs.as_deref_mut() {
                    Some(buf) => baum.random_sample_probs(sample, buf),
                    None => baum.random_sample(sample),
                };
                self.collect(sample, result, gt_probs.as_deref(), gv, sink, failure);
            }
        })
    }

    /**
     * Samples haplotype pairs with the recombination-augmented transition
     * model, restricting each sample's diploid state space to the edges
     * reachable through its IBS segments.
     */
    pub fn sample_haplotypes_restricted(
        &self,
        p_recomb: &[f32],
        hap_states: &Arc<HapStates>,
        segments: &dyn IbsSegmentProvider,
        gv: Option<&GenotypeValues>,
    ) -> Result<Vec<BitHapPair>, HmmError> {
        self.check_gv(gv)?;
        self.run(|queue, sink, failure| {
            let mut baum = match RecombSingleBaum::new(
                self.dag,
                self.gl,
                self.config.seed,
                self.config.n_samples_per_individual,
                self.config.low_mem,
                p_recomb.to_vec(),
            ) {
                Ok(baum) => baum,
                Err(e) => {
                    record_failure(failure, e);
                    drain(queue);
                    return;
                }
            };
            let mut gt_probs = self.gt_probs_buffer(gv);
            while let Some(sample) = next_item(queue) {
                let states = SinglePermittedStates::new(
                    self.dag,
                    Arc::clone(hap_states),
                    segments.segments(sample, 0),
                    segments.segments(sample, 1),
                    self.config.ibd_extend_cm,
                );
                let result = states.and_then(|mut states| {
                    baum.random_restricted_sample(sample, &mut states, gt_probs.as_deref_mut())
                });
                self.collect(sample, result, gt_probs.as_deref(), gv, sink, failure);
            }
        })
    }

    fn check_gv(&self, gv: Option<&GenotypeValues>) -> Result<(), HmmError> {
        if let Some(gv) = gv {
            if gv.markers() != self.gl.markers() || gv.samples() != self.gl.samples() {
                return Err(HmmError::InconsistentInputs {
                    msg: "posterior aggregator does not match the likelihood data".to_string(),
                });
            }
        }
        Ok(())
    }

    fn gt_probs_buffer(&self, gv: Option<&GenotypeValues>) -> Option<Vec<f32>> {
        gv.map(|_| {
            let markers = self.gl.markers();
            vec![0f32; markers.sum_genotypes(markers.n_markers())]
        })
    }

    fn collect(
        &self,
        sample: usize,
        result: Result<Vec<BitHapPair>, HmmError>,
        gt_probs: Option<&[f32]>,
        gv: Option<&GenotypeValues>,
        sink: &Mutex<Vec<BitHapPair>>,
        failure: &Mutex<Option<HmmError>>,
    ) {
        match result {
            Ok(pairs) => {
                if let (Some(gv), Some(probs)) = (gv, gt_probs) {
                    gv.add(sample, probs);
                }
                sink.lock().unwrap().extend(pairs);
            }
            Err(e) => {
                warn!("sampling failed for sample {}: {}", sample, e);
                record_failure(failure, e);
            }
        }
    }

    fn run<W>(&self, worker: W) -> Result<Vec<BitHapPair>, HmmError>
    where
        W: Fn(&Receiver<i64>, &Mutex<Vec<BitHapPair>>, &Mutex<Option<HmmError>>) + Sync,
    {
        let n_samples = self.gl.n_samples();
        let n_threads = self.config.n_threads;
        let (tx, rx) = bounded::<i64>(4 * n_threads);
        let sink: Mutex<Vec<BitHapPair>> = Mutex::new(Vec::with_capacity(
            n_samples * self.config.n_samples_per_individual,
        ));
        let failure: Mutex<Option<HmmError>> = Mutex::new(None);

        let mut pool = Pool::new(n_threads as u32);
        pool.scoped(|scope| {
            for _ in 0..n_threads {
                let rx = rx.clone();
                let sink = &sink;
                let failure = &failure;
                let worker = &worker;
                scope.execute(move || worker(&rx, sink, failure));
            }
            for sample in 0..n_samples {
                tx.send(sample as i64).expect("work queue disconnected");
            }
            for _ in 0..n_threads {
                tx.send(POISON).expect("work queue disconnected");
            }
        });

        if let Some(e) = failure.into_inner().unwrap() {
            return Err(e);
        }
        let mut pairs = sink.into_inner().unwrap();
        pairs.sort_by_key(|p| p.id_index());
        Ok(pairs)
    }
}

fn next_item(queue: &Receiver<i64>) -> Option<usize> {
    match queue.recv() {
        Ok(item) if item == POISON => {
            debug!("worker observed poison");
            None
        }
        Ok(item) => Some(item as usize),
        Err(_) => None,
    }
}

fn drain(queue: &Receiver<i64>) {
    while next_item(queue).is_some() {}
}

fn record_failure(failure: &Mutex<Option<HmmError>>, e: HmmError) {
    let mut slot = failure.lock().unwrap();
    if slot.is_none() {
        *slot = Some(e);
    }
}
