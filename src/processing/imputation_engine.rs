use std::sync::Mutex;

use crossbeam_channel::bounded;
use scoped_threadpool::Pool;

use crate::errors::HmmError;
use crate::imputation::allele_probs::ImputedAlleleProbs;
use crate::imputation::ls_hap_baum::LsHapBaum;
use crate::imputation::ref_clusters::RefClusters;
use crate::processing::POISON;

/**
 * Dispatches per-haplotype imputation over a pool of worker threads. Each
 * worker owns one thread-confined Li-Stephens HMM and writes the imputed
 * allele probabilities of the haplotypes it processes into the shared
 * result store.
 */
pub struct ImputationEngine<'a> {
    data: &'a RefClusters,
    n_threads: usize,
    low_mem: bool,
}

impl<'a> ImputationEngine<'a> {
    pub fn new(
        data: &'a RefClusters,
        n_threads: usize,
        low_mem: bool,
    ) -> Result<ImputationEngine<'a>, HmmError> {
        if n_threads == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "at least one worker thread is required".to_string(),
            });
        }
        Ok(ImputationEngine {
            data,
            n_threads,
            low_mem,
        })
    }

    /**
     * Imputes allele probabilities at every reference marker for every
     * target haplotype.
     */
    pub fn impute_all(&self) -> Result<ImputedAlleleProbs, HmmError> {
        let n_haps = self.data.n_targ_haps();
        let results = ImputedAlleleProbs::new(self.data.ref_markers().clone(), n_haps);
        let failure: Mutex<Option<HmmError>> = Mutex::new(None);
        let (tx, rx) = bounded::<i64>(4 * self.n_threads);

        let mut pool = Pool::new(self.n_threads as u32);
        pool.scoped(|scope| {
            for _ in 0..self.n_threads {
                let rx = rx.clone();
                let results = &results;
                let failure = &failure;
                scope.execute(move || {
                    let mut baum = LsHapBaum::new(self.data, self.low_mem);
                    loop {
                        let hap = match rx.recv() {
                            Ok(item) if item == POISON => {
                                debug!("worker observed poison");
                                break;
                            }
                            Ok(item) => item as usize,
                            Err(_) => break,
                        };
                        match baum.impute(hap) {
                            Ok(probs) => results.set(hap, probs),
                            Err(e) => {
                                warn!("imputation failed for haplotype {}: {}", hap, e);
                                let mut slot = failure.lock().unwrap();
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                            }
                        }
                    }
                });
            }
            for hap in 0..n_haps {
                tx.send(hap as i64).expect("work queue disconnected");
            }
            for _ in 0..self.n_threads {
                tx.send(POISON).expect("work queue disconnected");
            }
        });

        if let Some(e) = failure.into_inner().unwrap() {
            return Err(e);
        }
        Ok(results)
    }
}
