//! Configuration file parsers

pub mod gated;
