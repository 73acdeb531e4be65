//! TLS rigid-body model of atomic displacement.
//!
//! - [`tensors`] - T/L/S storage, the forward model and origin transforms
//! - [`fit`] - least-squares fitting of T, L and S to observed ADPs
//! - [`cor`] - center-of-reaction decomposition and screw axes
//! - [`metrics`] - goodness-of-fit statistics
//! - [`group`] - a group of atoms with its fitted model
//! - [`description`] - the file-level description of a group

pub mod cor;
pub mod description;
pub mod fit;
pub mod group;
pub mod metrics;
pub mod tensors;
