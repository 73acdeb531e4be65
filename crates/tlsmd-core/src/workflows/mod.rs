//! # Workflows Module
//!
//! End-to-end procedures built on the engine.
//!
//! - **Segment Search** ([`search`]) - fits every residue window of every chain and keeps
//!   the locally optimal rigid segments
//! - **Group Analysis** ([`analyze`]) - binds existing TLS group descriptions to a structure,
//!   optionally refits them, reports their center-of-reaction decomposition and renders
//!   model-predicted ADPs

pub mod analyze;
pub mod search;
