pub mod ref_store;
