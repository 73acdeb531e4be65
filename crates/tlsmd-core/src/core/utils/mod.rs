pub mod geometry;
pub mod units;
