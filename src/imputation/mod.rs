pub mod allele_probs;
pub mod hap_coder;
pub mod ls_hap_baum;
pub mod ref_clusters;
