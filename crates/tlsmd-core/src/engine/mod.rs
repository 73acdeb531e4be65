//! # Engine Module
//!
//! Machinery behind the sliding-window segment search: configuration, the
//! atom-selection policy, per-window candidate fitting and the acceptance pass
//! that keeps locally optimal windows.
//!
//! - **Configuration** ([`config`]) - window width, DP2 threshold and atom-selection switches
//! - **Candidates** ([`candidate`]) - owned per-window results and their status
//! - **Progress Monitoring** ([`progress`]) - callback-based progress reporting
//! - **Error Handling** ([`error`]) - engine-level error type
//! - **ADP Overlay** ([`overlay`]) - temporary replacement of atomic ADPs with model predictions

pub mod candidate;
pub mod config;
pub mod error;
pub mod filter;
pub mod overlay;
pub mod progress;
pub(crate) mod tasks;
