pub mod analyze;
pub mod anisou;
pub mod search;
