//! Unit conversion constants shared by the tensor math and the file formats.
//!
//! In memory, L is stored in rad² and S in rad·Å. Both exchange formats carry
//! L in deg² and S in deg·Å.

use std::f64::consts::PI;

pub const DEG2RAD: f64 = PI / 180.0;
pub const RAD2DEG: f64 = 180.0 / PI;
pub const DEG2RAD2: f64 = DEG2RAD * DEG2RAD;
pub const RAD2DEG2: f64 = RAD2DEG * RAD2DEG;

/// Isotropic B factor (Å²) per mean-square displacement U (Å²).
pub const U2B: f64 = 8.0 * PI * PI;
pub const B2U: f64 = 1.0 / U2B;

#[inline]
pub fn b_to_u(b: f64) -> f64 {
    b * B2U
}

#[inline]
pub fn u_to_b(u: f64) -> f64 {
    u * U2B
}
