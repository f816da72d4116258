//! # Constants and type definitions for skycombine
//!
//! This module centralizes the **conversion factors**, **sentinel values**, and **common type
//! definitions** used throughout the crate.
//!
//! ## Overview
//!
//! - Unit conversions (degrees ↔ arcseconds, days ↔ Julian years, mas/yr)
//! - Sentinels written in place of missing values at the serialization boundary
//! - Core type aliases used across the crate
//! - The fast hash map alias shared by the cross-matcher and the ledger
//!
//! Inside the crate, missing values are always carried as `Option<f64>`; the sentinels below
//! only appear when a catalog is written to disk (see [`or_sentinel`]).

use ahash::RandomState;
use std::collections::{HashMap, HashSet};

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds per degree
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Milliarcseconds per degree
pub const MAS_PER_DEG: f64 = ARCSEC_PER_DEG * 1000.0;

/// Days per Julian year, used to turn deg/day slopes into yearly rates
pub const DAYS_PER_YEAR: f64 = 365.2425;

/// Conversion factor between Julian Date and Modified Julian Date
pub const JDTOMJD: f64 = 2400000.5;

// -------------------------------------------------------------------------------------------------
// Combination defaults
// -------------------------------------------------------------------------------------------------

/// Default cross-match radius, in arcseconds
pub const MATCH_RADIUS_ARCSEC: f64 = 0.5;

/// Magnitudes at or above this ceiling flag "no valid photometry"
pub const MAG_VALID_LIMIT: f64 = 50.0;

/// `10^0.4`: turns a magnitude into the flux-like proxy averaged per band
pub const FLUX_BASE: f64 = 2.511_886_4;

// -------------------------------------------------------------------------------------------------
// Sentinels (serialization boundary only)
// -------------------------------------------------------------------------------------------------

/// Generic "undefined / insufficient data" value
pub const SENTINEL: f64 = 999_999.0;

/// Magnitude written for a band without valid photometry
pub const MAG_SENTINEL: f64 = 99.99;

/// Magnitude error written for a band without valid photometry
pub const MAGERR_SENTINEL: f64 = 9.99;

/// Replace a missing value by the generic sentinel.
#[inline]
pub fn or_sentinel(value: Option<f64>) -> f64 {
    value.unwrap_or(SENTINEL)
}

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Angle in radians
pub type Radian = f64;
/// Modified Julian Date (days)
pub type MJD = f64;
/// HEALPix pixel index
pub type PixelIndex = u64;

/// `HashMap` using the `ahash` hasher.
pub type FastHashMap<K, V> = HashMap<K, V, RandomState>;

/// `HashSet` using the `ahash` hasher.
pub type FastHashSet<K> = HashSet<K, RandomState>;

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_flux_base_is_ten_to_the_point_four() {
        assert!((FLUX_BASE.log10() - 0.4).abs() < 1e-8);
    }

    #[test]
    fn test_or_sentinel() {
        assert_eq!(or_sentinel(None), SENTINEL);
        assert_eq!(or_sentinel(Some(1.5)), 1.5);
    }
}
