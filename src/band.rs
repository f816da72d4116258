//! Photometric bands carried by the combined catalog.
//!
//! Exposure headers describe their filter with free text such as
//! `"g DECam SDSS c0001 4720.0 1520.0"` or `"VR DECam c0007 6300.0 2600.0"`. Only the leading
//! token matters; it is matched case-insensitively against the seven supported bands.

use std::fmt;
use std::str::FromStr;

use crate::combine_errors::CombineError;

/// Number of photometric bands tracked per object.
pub const NBANDS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
    Y,
    VR,
}

impl Band {
    /// All bands, in catalog column order.
    pub const ALL: [Band; NBANDS] = [
        Band::U,
        Band::G,
        Band::R,
        Band::I,
        Band::Z,
        Band::Y,
        Band::VR,
    ];

    /// Position of the band in per-object band arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lower-case prefix used to name per-band catalog columns (`gmag`, `ndetvr`, ...).
    pub fn column_prefix(self) -> &'static str {
        match self {
            Band::U => "u",
            Band::G => "g",
            Band::R => "r",
            Band::I => "i",
            Band::Z => "z",
            Band::Y => "y",
            Band::VR => "vr",
        }
    }

    /// Parse the band out of an exposure filter description.
    ///
    /// Arguments
    /// -----------------
    /// * `filter`: the exposure filter string, e.g. `"r DECam SDSS c0002 6415.0 1480.0"`.
    ///
    /// Return
    /// ----------
    /// * The matching [`Band`], or [`CombineError::UnknownBand`] when the leading token is not
    ///   one of `u, g, r, i, z, Y, VR`.
    pub fn from_filter(filter: &str) -> Result<Band, CombineError> {
        let token = filter
            .split_whitespace()
            .next()
            .ok_or_else(|| CombineError::UnknownBand(filter.to_string()))?;

        match token.to_ascii_lowercase().as_str() {
            "u" => Ok(Band::U),
            "g" => Ok(Band::G),
            "r" => Ok(Band::R),
            "i" => Ok(Band::I),
            "z" => Ok(Band::Z),
            "y" => Ok(Band::Y),
            "vr" => Ok(Band::VR),
            _ => Err(CombineError::UnknownBand(filter.to_string())),
        }
    }
}

impl FromStr for Band {
    type Err = CombineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::from_filter(s)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Band::Y => "Y",
            Band::VR => "VR",
            other => other.column_prefix(),
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod band_test {
    use super::*;

    #[test]
    fn test_from_decam_filter_strings() {
        assert_eq!(
            Band::from_filter("g DECam SDSS c0001 4720.0 1520.0").unwrap(),
            Band::G
        );
        assert_eq!(
            Band::from_filter("VR DECam c0007 6300.0 2600.0").unwrap(),
            Band::VR
        );
        assert_eq!(
            Band::from_filter("Y DECam c0005 10095.0 1130.0").unwrap(),
            Band::Y
        );
        assert_eq!(Band::from_filter("  i  ").unwrap(), Band::I);
    }

    #[test]
    fn test_unknown_filter() {
        assert_eq!(
            Band::from_filter("N964 DECam c0008 9645.0 94.0"),
            Err(CombineError::UnknownBand(
                "N964 DECam c0008 9645.0 94.0".into()
            ))
        );
        assert!(Band::from_filter("").is_err());
    }

    #[test]
    fn test_index_matches_column_order() {
        for (i, band) in Band::ALL.iter().enumerate() {
            assert_eq!(band.index(), i);
        }
        assert_eq!(Band::VR.column_prefix(), "vr");
        assert_eq!(Band::VR.to_string(), "VR");
        assert_eq!(Band::G.to_string(), "g");
    }
}
