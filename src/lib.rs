#[macro_use]
extern crate log;

pub mod baum;
pub mod dag;
pub mod errors;
pub mod haplotype;
pub mod ibd;
pub mod imputation;
pub mod model;
pub mod processing;
