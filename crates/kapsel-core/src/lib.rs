#![forbid(unsafe_code)]

//! Core types shared by every kapsel crate: the error taxonomy, algorithm
//! identifiers with their families, and XML namespace constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use algorithm::AlgorithmFamily;
pub use error::{Error, Result};
