//! Interstellar reddening lookup.
//!
//! The combiner asks a [`ReddeningMap`] for `E(B-V)` once per finalized object. Any dust map
//! can be plugged in by implementing the trait, or by passing a closure:
//!
//! ```rust
//! use skycombine::reddening::ReddeningMap;
//!
//! let flat = |_ra: f64, _dec: f64| Some(0.03);
//! assert_eq!(flat.ebv(10.0, -20.0), Some(0.03));
//! ```
use crate::constants::Degree;

pub trait ReddeningMap {
    /// `E(B-V)` at the position, or `None` where the map has no value.
    fn ebv(&self, ra: Degree, dec: Degree) -> Option<f64>;
}

impl<F> ReddeningMap for F
where
    F: Fn(Degree, Degree) -> Option<f64>,
{
    fn ebv(&self, ra: Degree, dec: Degree) -> Option<f64> {
        self(ra, dec)
    }
}

/// Map without any value; every object gets the missing-value sentinel on output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReddening;

impl ReddeningMap for NoReddening {
    fn ebv(&self, _ra: Degree, _dec: Degree) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod reddening_test {
    use super::*;

    #[test]
    fn test_no_reddening() {
        assert_eq!(NoReddening.ebv(0.0, 0.0), None);
    }

    #[test]
    fn test_closure_map() {
        let gradient = |_ra: f64, dec: f64| Some(dec.abs() / 100.0);
        let map: &dyn ReddeningMap = &gradient;
        assert_eq!(map.ebv(5.0, -30.0), Some(0.3));
    }
}
