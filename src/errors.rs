use thiserror::Error;

/// Errors surfaced by the phasing and imputation engines. Precondition
/// violations on individual queries (out of range genotype or haplotype
/// indices, non-positive frontier updates) are programmer errors and panic
/// instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HmmError {
    #[error("inconsistent inputs: {msg}")]
    InconsistentInputs { msg: String },
    #[error(
        "no state with positive emission probability at marker {marker} for sample {sample}"
    )]
    NoConsistentState { marker: usize, sample: usize },
    #[error("normalization sum is not positive at marker {marker}")]
    NumericUnderflow { marker: usize },
    #[error("node map cannot grow beyond {capacity} slots")]
    HashOverflow { capacity: usize },
    #[error("work loop observed the poison item and stopped")]
    Cancelled,
}
