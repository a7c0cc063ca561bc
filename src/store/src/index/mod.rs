pub mod table;
pub mod writer;
