pub mod raw;
pub mod matrix;
