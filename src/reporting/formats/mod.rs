//! Report output formats

pub mod csv;
pub mod json;
pub mod txt;
