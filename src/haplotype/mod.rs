pub mod hap_pair;
