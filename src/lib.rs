//! Bitmask pre-filters for per-sample variant indices.

pub mod cli;
pub mod common;
pub mod err;
pub mod index;
