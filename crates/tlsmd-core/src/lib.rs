//! # TLSMD Core Library
//!
//! Rigid-body (TLS) analysis of crystallographic atomic displacement parameters.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`), the TLS tensor
//!   mathematics (least-squares fitting, the forward model, center-of-reaction
//!   decomposition and goodness-of-fit metrics) and file I/O.
//!
//! - **[`engine`]: The Logic Core.** Configuration, atom selection policy, per-window
//!   fitting tasks, the acceptance pass of the segment search and the scoped ADP
//!   overlay used when rendering model-predicted displacements.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures: the sliding-window
//!   segment search over every chain and the analysis of existing TLS group
//!   descriptions.

pub mod core;
pub mod engine;
pub mod workflows;
