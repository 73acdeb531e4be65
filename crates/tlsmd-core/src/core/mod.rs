//! # Core Module
//!
//! Fundamental building blocks for TLS analysis.
//!
//! - **Structure Representation** ([`models`]) - Atoms, residues, chains and bonds with
//!   their positions and displacement parameters
//! - **TLS Mathematics** ([`tls`]) - Tensors, fitting, center of reaction and metrics
//! - **File I/O** ([`io`]) - PDB coordinates and the two TLS description formats
//! - **Utilities** ([`utils`]) - Geometry helpers and unit conversions

pub mod io;
pub mod models;
pub mod tls;
pub mod utils;
