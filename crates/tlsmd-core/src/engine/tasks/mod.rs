//! Computational units of the segment search.
//!
//! [`segment_fit`] turns one window of residues into a scored candidate;
//! [`acceptance`] runs once every candidate of a chain is known and keeps the
//! local optima.

pub mod acceptance;
pub mod segment_fit;
