pub mod imputation_engine;
pub mod phasing_engine;

use crate::errors::HmmError;

/**
 * Reserved work item that terminates a worker. One poison per worker is
 * enqueued after the real items.
 */
pub const POISON: i64 = -37;

/**
 * Run configuration of the phasing and imputation engines.
 */
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    /// number of independent phasings sampled per individual
    pub n_samples_per_individual: usize,
    /// RNG seed; identical seed and inputs give identical output
    pub seed: i64,
    /// store O(sqrt(L)) checkpointed levels instead of all L levels
    pub low_mem: bool,
    /// worker thread count
    pub n_threads: usize,
    /// per-allele emission error of the imputation HMM
    pub err: f32,
    /// effective population size of the recombination model
    pub ne: f64,
    /// scale factor applied to genetic map distances
    pub map_scale: f64,
    /// scale factor applied inside the DAG jump probability
    pub model_scale: f64,
    /// minimum IBS segment length in cM
    pub ibd_length_cm: f64,
    /// IBS segment extension length in cM
    pub ibd_extend_cm: f64,
    /// maximum genetic span of one imputation marker cluster in cM
    pub cluster_cm: f64,
}

impl Default for PhaseConfig {
    fn default() -> PhaseConfig {
        PhaseConfig {
            n_samples_per_individual: 4,
            seed: -99999,
            low_mem: false,
            n_threads: 1,
            err: 0.0001,
            ne: 1_000_000.0,
            map_scale: 1.0,
            model_scale: 0.8,
            ibd_length_cm: 3.0,
            ibd_extend_cm: 0.2,
            cluster_cm: 0.005,
        }
    }
}

impl PhaseConfig {
    pub fn validate(&self) -> Result<(), HmmError> {
        if self.n_samples_per_individual == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "at least one phasing must be sampled per individual".to_string(),
            });
        }
        if self.n_threads == 0 {
            return Err(HmmError::InconsistentInputs {
                msg: "at least one worker thread is required".to_string(),
            });
        }
        if !(self.err > 0.0 && self.err <= 0.5) {
            return Err(HmmError::InconsistentInputs {
                msg: format!("allele error probability {} outside (0, 0.5]", self.err),
            });
        }
        if self.ne <= 0.0 {
            return Err(HmmError::InconsistentInputs {
                msg: "effective population size must be positive".to_string(),
            });
        }
        if self.map_scale <= 0.0 || self.model_scale <= 0.0 {
            return Err(HmmError::InconsistentInputs {
                msg: "map and model scale factors must be positive".to_string(),
            });
        }
        if self.ibd_length_cm < 0.0 || self.ibd_extend_cm < 0.0 || self.cluster_cm < 0.0 {
            return Err(HmmError::InconsistentInputs {
                msg: "segment and cluster lengths must be nonnegative".to_string(),
            });
        }
        Ok(())
    }
}
