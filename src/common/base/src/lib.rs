pub mod order;
pub mod rating;
pub mod source;
