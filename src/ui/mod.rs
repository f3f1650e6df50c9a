pub mod filter_input;
pub mod panels;
pub mod table;
