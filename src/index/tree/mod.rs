pub mod btree;
pub mod codec;
pub mod iterator;
pub mod node;
pub mod tree_page_layout;
