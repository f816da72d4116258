//! # Combination parameters
//!
//! This module defines the [`CombineParams`] configuration struct and its builder, which
//! control how a HEALPix pixel is combined: the sky tessellation, the cross-match tolerance,
//! the buffer zone around the pixel, photometric validity, and container growth.
//!
//! ## Pipeline overview
//!
//! 1. **Footprint**
//!    The pixel boundary is sampled with `boundary_step` points per edge at resolution
//!    `nside`, then expanded in the tangent plane so that it reaches `buffer_arcsec` beyond
//!    the boundary (scaled by `buffer_expansion`).
//!
//! 2. **Cross-match & accumulation**
//!    Detections closer than `match_radius_arcsec` to an existing object are folded into it.
//!    Magnitudes at or above `mag_valid_limit` are treated as "no photometry". The object
//!    store starts at `initial_capacity` and grows by `growth_increment`.
//!
//! 3. **Finalization**
//!    Proper motions are only fitted when the weighted time variance exceeds
//!    `min_time_variance` (days²).
//!
//! ## Example
//!
//! ```rust
//! use skycombine::params::CombineParams;
//!
//! let params = CombineParams::builder()
//!     .nside(256)
//!     .match_radius_arcsec(0.7)
//!     .buffer_arcsec(15.0)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.nside, 256);
//! ```
use crate::combine_errors::CombineError;
use crate::constants::{ArcSec, MAG_VALID_LIMIT, MATCH_RADIUS_ARCSEC};
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

/// Configuration for one pixel combination run.
///
/// Default values:
///
/// * `nside`: 128
/// * `match_radius_arcsec`: 0.5″
/// * `buffer_arcsec`: 10″
/// * `buffer_expansion`: 1.5
/// * `mag_valid_limit`: 50.0
/// * `initial_capacity`: 50 000 objects
/// * `growth_increment`: 50 000 objects
/// * `ledger_initial_capacity`: 100 000 entries
/// * `min_time_variance`: 1e-10 day²
/// * `boundary_step`: 100
/// * `batch_size`: 8192 rows
/// * `redo`: false
#[derive(Debug, Clone)]
pub struct CombineParams {
    // --- Tessellation / footprint ---
    /// HEALPix resolution parameter (power of two).
    pub nside: u64,
    /// Width of the buffer zone around the pixel boundary.
    pub buffer_arcsec: ArcSec,
    /// Safety factor applied to the buffer when expanding the boundary polygon.
    pub buffer_expansion: f64,
    /// Number of samples per pixel edge when tracing the boundary.
    pub boundary_step: usize,

    // --- Matching / accumulation ---
    /// Cross-match tolerance.
    pub match_radius_arcsec: ArcSec,
    /// Magnitudes at or above this limit carry no photometry.
    pub mag_valid_limit: f64,
    /// Objects preallocated before the first exposure.
    pub initial_capacity: usize,
    /// Objects added each time the store runs out of capacity.
    pub growth_increment: usize,
    /// Ledger entries preallocated before the first exposure.
    pub ledger_initial_capacity: usize,

    // --- Finalization ---
    /// Smallest weighted variance of epochs (day²) accepted for a proper-motion fit.
    pub min_time_variance: f64,

    // --- I/O ---
    /// Parquet reader batch size.
    pub batch_size: usize,
    /// Recompute a pixel even when its outputs already exist.
    pub redo: bool,
}

impl CombineParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`CombineParamsBuilder`] initialized with the defaults.
    pub fn builder() -> CombineParamsBuilder {
        CombineParamsBuilder::new()
    }

    /// Cross-match tolerance in degrees.
    #[inline]
    pub fn match_radius_deg(&self) -> f64 {
        self.match_radius_arcsec / 3600.0
    }
}

impl Default for CombineParams {
    fn default() -> Self {
        CombineParams {
            nside: 128,
            buffer_arcsec: 10.0,
            buffer_expansion: 1.5,
            boundary_step: 100,

            match_radius_arcsec: MATCH_RADIUS_ARCSEC,
            mag_valid_limit: MAG_VALID_LIMIT,
            initial_capacity: 50_000,
            growth_increment: 50_000,
            ledger_initial_capacity: 100_000,

            min_time_variance: 1e-10,

            batch_size: 8192,
            redo: false,
        }
    }
}

/// Builder for [`CombineParams`], with validation.
#[derive(Debug, Clone)]
pub struct CombineParamsBuilder {
    params: CombineParams,
}

impl Default for CombineParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CombineParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: CombineParams::default(),
        }
    }

    // --- Tessellation / footprint ---
    pub fn nside(mut self, v: u64) -> Self {
        self.params.nside = v;
        self
    }
    pub fn buffer_arcsec(mut self, v: ArcSec) -> Self {
        self.params.buffer_arcsec = v;
        self
    }
    pub fn buffer_expansion(mut self, v: f64) -> Self {
        self.params.buffer_expansion = v;
        self
    }
    pub fn boundary_step(mut self, v: usize) -> Self {
        self.params.boundary_step = v;
        self
    }

    // --- Matching / accumulation ---
    pub fn match_radius_arcsec(mut self, v: ArcSec) -> Self {
        self.params.match_radius_arcsec = v;
        self
    }
    pub fn mag_valid_limit(mut self, v: f64) -> Self {
        self.params.mag_valid_limit = v;
        self
    }
    pub fn initial_capacity(mut self, v: usize) -> Self {
        self.params.initial_capacity = v;
        self
    }
    pub fn growth_increment(mut self, v: usize) -> Self {
        self.params.growth_increment = v;
        self
    }
    pub fn ledger_initial_capacity(mut self, v: usize) -> Self {
        self.params.ledger_initial_capacity = v;
        self
    }

    // --- Finalization ---
    pub fn min_time_variance(mut self, v: f64) -> Self {
        self.params.min_time_variance = v;
        self
    }

    // --- I/O ---
    pub fn batch_size(mut self, v: usize) -> Self {
        self.params.batch_size = v;
        self
    }
    pub fn redo(mut self, v: bool) -> Self {
        self.params.redo = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Finalize the builder and produce a [`CombineParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `nside` is a power of two in `[1, 2^29]`.
    /// * `match_radius_arcsec > 0`, `mag_valid_limit > 0`, `min_time_variance > 0`.
    /// * `buffer_arcsec >= 0`, `buffer_expansion >= 0`.
    /// * `boundary_step >= 1`, `growth_increment >= 1`, `batch_size >= 1`.
    ///
    /// Return
    /// ----------
    /// * `Ok(CombineParams)` if every rule holds, otherwise
    ///   [`CombineError::InvalidCombineParameter`].
    pub fn build(self) -> Result<CombineParams, CombineError> {
        let p = &self.params;

        if !p.nside.is_power_of_two() || p.nside > (1 << 29) {
            return Err(CombineError::InvalidCombineParameter(
                "nside must be a power of two in [1, 2^29]".into(),
            ));
        }
        if !Self::gt0(p.match_radius_arcsec) {
            return Err(CombineError::InvalidCombineParameter(
                "match_radius_arcsec must be > 0".into(),
            ));
        }
        if !Self::gt0(p.mag_valid_limit) {
            return Err(CombineError::InvalidCombineParameter(
                "mag_valid_limit must be > 0".into(),
            ));
        }
        if !Self::gt0(p.min_time_variance) {
            return Err(CombineError::InvalidCombineParameter(
                "min_time_variance must be > 0".into(),
            ));
        }
        if !Self::ge0(p.buffer_arcsec) || !Self::ge0(p.buffer_expansion) {
            return Err(CombineError::InvalidCombineParameter(
                "buffer parameters must be non-negative".into(),
            ));
        }
        if p.boundary_step == 0 {
            return Err(CombineError::InvalidCombineParameter(
                "boundary_step must be >= 1".into(),
            ));
        }
        if p.growth_increment == 0 {
            return Err(CombineError::InvalidCombineParameter(
                "growth_increment must be >= 1".into(),
            ));
        }
        if p.batch_size == 0 {
            return Err(CombineError::InvalidCombineParameter(
                "batch_size must be >= 1".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for CombineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 46;
            writeln!(f, "Pixel Combination Parameters")?;
            writeln!(f, "----------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Tessellation / footprint]")?;
            line!("nside                   = {}", self.nside, "HEALPix resolution")?;
            line!(
                "buffer_arcsec           = {:.2}\"",
                self.buffer_arcsec,
                "Buffer zone width"
            )?;
            line!(
                "buffer_expansion        = {:.2}",
                self.buffer_expansion,
                "Safety factor on the buffer"
            )?;
            line!(
                "boundary_step           = {}",
                self.boundary_step,
                "Samples per pixel edge"
            )?;

            writeln!(f, "\n[Matching / accumulation]")?;
            line!(
                "match_radius_arcsec     = {:.3}\"",
                self.match_radius_arcsec,
                "Cross-match tolerance"
            )?;
            line!(
                "mag_valid_limit         = {:.2}",
                self.mag_valid_limit,
                "Photometry validity ceiling"
            )?;
            line!(
                "initial_capacity        = {}",
                self.initial_capacity,
                "Preallocated objects"
            )?;
            line!(
                "growth_increment        = {}",
                self.growth_increment,
                "Objects added per growth"
            )?;
            line!(
                "ledger_initial_capacity = {}",
                self.ledger_initial_capacity,
                "Preallocated ledger entries"
            )?;

            writeln!(f, "\n[Finalization / I/O]")?;
            line!(
                "min_time_variance       = {:.1e} d²",
                self.min_time_variance,
                "Floor for proper-motion fits"
            )?;
            line!(
                "batch_size              = {}",
                self.batch_size,
                "Parquet reader batch size"
            )?;
            line!("redo                    = {}", self.redo, "Overwrite outputs")?;

            Ok(())
        } else {
            write!(
                f,
                "CombineParams(nside={}, radius={:.2}\", buffer={:.1}\", mag_limit={:.1}, capacity={}+{})",
                self.nside,
                self.match_radius_arcsec,
                self.buffer_arcsec,
                self.mag_valid_limit,
                self.initial_capacity,
                self.growth_increment,
            )
        }
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = CombineParams::builder().build().unwrap();
        assert_eq!(params.nside, 128);
        assert_eq!(params.match_radius_arcsec, 0.5);
        assert!((params.match_radius_deg() - 0.5 / 3600.0).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_non_power_of_two_nside() {
        let err = CombineParams::builder().nside(100).build().unwrap_err();
        assert_eq!(
            err,
            CombineError::InvalidCombineParameter(
                "nside must be a power of two in [1, 2^29]".into()
            )
        );
    }

    #[test]
    fn test_rejects_nan_radius() {
        assert!(CombineParams::builder()
            .match_radius_arcsec(f64::NAN)
            .build()
            .is_err());
        assert!(CombineParams::builder()
            .match_radius_arcsec(0.0)
            .build()
            .is_err());
    }

    #[test]
    fn test_rejects_zero_growth() {
        assert!(CombineParams::builder()
            .growth_increment(0)
            .build()
            .is_err());
    }

    #[test]
    fn test_display_forms() {
        let params = CombineParams::default();
        let short = format!("{params}");
        assert!(short.starts_with("CombineParams(nside=128"));
        let long = format!("{params:#}");
        assert!(long.contains("[Matching / accumulation]"));
        assert!(long.contains("match_radius_arcsec"));
    }
}
