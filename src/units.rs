//! Size-string parsing for `--memory` and `--disk-size`.
//!
//! Both accept a number with an optional `M`/`MB` or `G`/`GB` suffix.
//! A bare number is megabytes for memory and gigabytes for disk.

use crate::error::PlanError;

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// Parse a memory size to bytes. Bare numbers are megabytes.
pub fn parse_memory(input: &str) -> Result<u64, PlanError> {
    parse_size(input, "memory", MIB)
}

/// Parse a disk size to bytes. Bare numbers are gigabytes.
pub fn parse_disk(input: &str) -> Result<u64, PlanError> {
    parse_size(input, "disk", GIB)
}

fn parse_size(input: &str, kind: &'static str, default_unit: u64) -> Result<u64, PlanError> {
    let invalid = || PlanError::InvalidSize {
        kind,
        value: input.to_string(),
    };

    let s = input.trim().to_uppercase();
    let (magnitude, unit) = if let Some(m) = s.strip_suffix("GB").or_else(|| s.strip_suffix('G')) {
        (m, GIB)
    } else if let Some(m) = s.strip_suffix("MB").or_else(|| s.strip_suffix('M')) {
        (m, MIB)
    } else {
        (s.as_str(), default_unit)
    };

    let value: f64 = magnitude.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid());
    }

    Ok((value * unit as f64) as u64)
}
