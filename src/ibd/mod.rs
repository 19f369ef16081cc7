pub mod hap_segment;
pub mod interval_tree;
pub mod permitted_states;
