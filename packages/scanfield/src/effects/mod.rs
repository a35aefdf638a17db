//! Concrete effect passes.
//!
//! Each pass owns its parameters, its clock and a `#[repr(C)]` uniform block
//! whose layout matches the corresponding WGSL struct.

pub mod ascii;
pub mod fxaa;
pub mod light_scattering;
pub mod output;
pub mod ripple;
pub mod scan;
pub mod scene;

use anyhow::{bail, Result};

/// Fail unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(pass: &str, name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{} pass: {} must be positive, got {}", pass, name, value);
    }
    Ok(())
}
