pub mod errors;
pub mod index_types;
pub mod tree;
