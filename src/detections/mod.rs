//! # Detections and exposure metadata
//!
//! Input records of the combination: one [`Detection`] per source measured on a chip, grouped
//! by exposure, with the exposure-wide quantities (band, epoch, identifiers) held once in an
//! [`ExposureMeta`].
//!
//! ## Units & Conventions
//! -----------------
//! - **Positions:** `ra`, `dec` in **degrees**.
//! - **Astrometric uncertainties:** `raerr`, `decerr` in **arcseconds**; they become
//!   inverse-variance weights `1/err²` during accumulation.
//! - **Photometry:** `mag_auto` / `magerr_auto` in magnitudes; a magnitude at or above the
//!   validity ceiling (50 by default) marks a detection without usable photometry.
//! - **Epochs:** `mjd` is the exposure Modified Julian Date (UTC).
//!
//! Submodules load these records from Parquet tables:
//! - `parquet_reader` – typed, column-projected readers for the three table kinds,
//! - [`exposure_loader`] – per-exposure assembly (chip selection, footprint cut).
pub mod exposure_loader;
pub(crate) mod parquet_reader;

use crate::band::Band;
use crate::constants::{ArcSec, Degree, MJD};

/// One source measured on one chip of one exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Unique measurement identifier.
    pub measid: String,
    pub ra: Degree,
    pub dec: Degree,
    pub raerr: ArcSec,
    pub decerr: ArcSec,
    pub mag_auto: f64,
    pub magerr_auto: f64,
    pub asemi: f64,
    pub asemierr: f64,
    pub bsemi: f64,
    pub bsemierr: f64,
    pub theta: f64,
    pub thetaerr: f64,
    /// Full width at half maximum, arcseconds.
    pub fwhm: ArcSec,
    /// Quality bitmask.
    pub flags: i64,
    /// Star/galaxy classifier score.
    pub class_star: f64,
}

impl Detection {
    /// Minimal detection at a position, with round unit morphology and no flags.
    ///
    /// Arguments
    /// -----------------
    /// * `measid`: unique measurement identifier.
    /// * `ra`, `dec`: position in degrees.
    /// * `pos_err`: uncertainty on both axes, arcseconds.
    /// * `mag`, `magerr`: photometry.
    pub fn new(
        measid: impl Into<String>,
        ra: Degree,
        dec: Degree,
        pos_err: ArcSec,
        mag: f64,
        magerr: f64,
    ) -> Self {
        Detection {
            measid: measid.into(),
            ra,
            dec,
            raerr: pos_err,
            decerr: pos_err,
            mag_auto: mag,
            magerr_auto: magerr,
            asemi: 1.0,
            asemierr: 0.1,
            bsemi: 1.0,
            bsemierr: 0.1,
            theta: 0.0,
            thetaerr: 1.0,
            fwhm: 1.0,
            flags: 0,
            class_star: 1.0,
        }
    }

    /// Positional uncertainties are finite and strictly positive, so weights exist.
    pub fn has_valid_astrometry(&self) -> bool {
        self.raerr.is_finite()
            && self.decerr.is_finite()
            && self.raerr > 0.0
            && self.decerr > 0.0
            && self.ra.is_finite()
            && self.dec.is_finite()
    }

    /// The magnitude is below the validity ceiling and its error can be turned into a weight.
    pub fn has_valid_photometry(&self, mag_valid_limit: f64) -> bool {
        self.mag_auto < mag_valid_limit && self.magerr_auto.is_finite() && self.magerr_auto > 0.0
    }
}

/// Exposure-wide metadata shared by every detection of the exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureMeta {
    /// Source file of the metadata table.
    pub file: String,
    /// Exposure name, used as the exposure identifier in the ledger.
    pub base: String,
    pub expnum: i64,
    /// Pointing centre.
    pub ra: Degree,
    pub dec: Degree,
    /// ISO-8601 UTC start of exposure.
    pub dateobs: String,
    pub mjd: MJD,
    /// Raw filter description.
    pub filter: String,
    pub band: Band,
    pub exptime: f64,
    pub airmass: f64,
    pub nsources: i64,
    pub fwhm: f64,
    pub nchips: i64,
    pub rarms: f64,
    pub decrms: f64,
    pub ebv: f64,
    pub zpterm: f64,
    pub zptermerr: f64,
}

impl ExposureMeta {
    /// Metadata carrying only the fields the combination needs; the remaining ones are zero.
    pub fn new(base: impl Into<String>, expnum: i64, band: Band, mjd: MJD) -> Self {
        ExposureMeta {
            file: String::new(),
            base: base.into(),
            expnum,
            ra: 0.0,
            dec: 0.0,
            dateobs: String::new(),
            mjd,
            filter: band.to_string(),
            band,
            exptime: 0.0,
            airmass: 0.0,
            nsources: 0,
            fwhm: 0.0,
            nchips: 0,
            rarms: 0.0,
            decrms: 0.0,
            ebv: 0.0,
            zpterm: 0.0,
            zptermerr: 0.0,
        }
    }
}

/// Per-chip metadata: footprint vertices and astrometric calibration status.
#[derive(Debug, Clone, PartialEq)]
pub struct ChipMeta {
    pub ccdnum: i64,
    pub nsources: i64,
    /// Number of Gaia stars used in the chip astrometric solution.
    pub ngaiamatch: i64,
    /// Chip corner right ascensions, degrees.
    pub vra: [Degree; 4],
    /// Chip corner declinations, degrees.
    pub vdec: [Degree; 4],
}
