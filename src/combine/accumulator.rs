//! # Running aggregation of detections into objects
//!
//! An [`ObjectAccum`] holds every running sum needed to compute, at the end of the run, the
//! averaged position, the proper motion, the per-band photometry and the morphology of one
//! object. Detections are folded one at a time with [`ObjectAccum::fold`]; nothing is ever
//! subtracted, so the accumulator is always consistent with the exact set of detections folded
//! so far.
//!
//! ## Anchoring
//! -----------------
//! Positions are accumulated as offsets from the object's *first* detection and times as
//! offsets from the first detection's MJD:
//!
//! ```text
//! x_ra  = wrap(ra - ra₀)       with wrap(·) ∈ (-180, 180]
//! x_dec = dec - dec₀
//! t     = mjd - mjd₀
//! ```
//!
//! The weighted means and the regression slopes are invariant under such shifts, while the
//! sums `Σw·t·x` and `Σw·t²` no longer carry the ~10⁵ day magnitude of raw MJDs. Wrapping the
//! RA offset makes objects straddling RA = 0 average correctly.
//!
//! ## Weights
//! -----------------
//! * Astrometry: `w_ra = 1/raerr²`, `w_dec = 1/decerr²` (arcsec⁻²), one weight per axis.
//! * Photometry: `w_m = 1/magerr²`, only for detections with `mag_auto` below the validity
//!   ceiling. The flux-like proxy `FLUX_BASE^m · w_m` is summed alongside.
use crate::band::{Band, NBANDS};
use crate::constants::{Degree, FLUX_BASE, MJD};
use crate::detections::{Detection, ExposureMeta};

/// Sums over the morphology measurements of a set of detections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphologySums {
    pub count: u32,
    pub asemi: f64,
    pub asemierr2: f64,
    pub bsemi: f64,
    pub bsemierr2: f64,
    pub theta: f64,
    pub thetaerr2: f64,
    pub fwhm: f64,
    pub class_star: f64,
}

impl MorphologySums {
    fn add(&mut self, det: &Detection) {
        self.count += 1;
        self.asemi += det.asemi;
        self.asemierr2 += det.asemierr * det.asemierr;
        self.bsemi += det.bsemi;
        self.bsemierr2 += det.bsemierr * det.bsemierr;
        self.theta += det.theta;
        self.thetaerr2 += det.thetaerr * det.thetaerr;
        self.fwhm += det.fwhm;
        self.class_star += det.class_star;
    }
}

/// Per-band running sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandAccum {
    /// Detections in this band, with or without valid photometry.
    pub ndet: u32,
    /// Detections in this band with valid photometry.
    pub nphot: u32,
    /// Σ FLUX_BASE^m · w_m
    pub sum_flux_w: f64,
    /// Σ w_m
    pub sum_w: f64,
    /// Σ m
    pub sum_mag: f64,
    /// Σ m²
    pub sum_mag2: f64,
    pub morphology: MorphologySums,
}

/// Weighted sums along one sky axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisSums {
    /// Σw
    pub w: f64,
    /// Σw·x
    pub wx: f64,
    /// Σw·t
    pub wt: f64,
    /// Σw·t²
    pub wt2: f64,
    /// Σw·t·x
    pub wtx: f64,
}

impl AxisSums {
    #[inline]
    fn add(&mut self, w: f64, x: f64, t: f64) {
        self.w += w;
        self.wx += w * x;
        self.wt += w * t;
        self.wt2 += w * t * t;
        self.wtx += w * t * x;
    }
}

/// Running state of one object during the combination.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectAccum {
    /// `"<pix>.<seq>"`
    pub id: String,
    /// Position of the first detection.
    pub anchor_ra: Degree,
    pub anchor_dec: Degree,
    /// Epoch of the first detection.
    pub anchor_mjd: MJD,
    pub ndet: u32,
    pub ra: AxisSums,
    pub dec: AxisSums,
    /// Σ t, with t the time offset from `anchor_mjd`.
    pub sum_dt: f64,
    pub min_dt: f64,
    pub max_dt: f64,
    pub flags: i64,
    pub bands: [BandAccum; NBANDS],
    pub morphology: MorphologySums,
}

/// Difference `ra - ref_ra` brought into (-180, 180].
#[inline]
pub fn wrap_ra_offset(ra: Degree, ref_ra: Degree) -> Degree {
    let d = (ra - ref_ra).rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

impl ObjectAccum {
    /// Empty accumulator anchored on the first detection of the object.
    ///
    /// The detection itself is *not* folded; call [`ObjectAccum::fold`] right after.
    pub fn new(id: String, first: &Detection, exposure: &ExposureMeta) -> Self {
        ObjectAccum {
            id,
            anchor_ra: first.ra,
            anchor_dec: first.dec,
            anchor_mjd: exposure.mjd,
            ndet: 0,
            ra: AxisSums::default(),
            dec: AxisSums::default(),
            sum_dt: 0.0,
            min_dt: f64::INFINITY,
            max_dt: f64::NEG_INFINITY,
            flags: 0,
            bands: Default::default(),
            morphology: MorphologySums::default(),
        }
    }

    /// Fold one detection into the running sums.
    ///
    /// Must be called exactly once per detection; the provenance ledger is what guarantees
    /// it in [`crate::combine::PixelCombiner`].
    ///
    /// Arguments
    /// -----------------
    /// * `det`: the detection, with valid (finite, positive) positional uncertainties.
    /// * `exposure`: metadata of the exposure the detection belongs to (band and epoch).
    /// * `mag_valid_limit`: magnitudes at or above it carry no photometry.
    pub fn fold(&mut self, det: &Detection, exposure: &ExposureMeta, mag_valid_limit: f64) {
        let band = exposure.band;
        let t = exposure.mjd - self.anchor_mjd;

        self.ndet += 1;

        let w_ra = 1.0 / (det.raerr * det.raerr);
        let w_dec = 1.0 / (det.decerr * det.decerr);
        self.ra.add(w_ra, wrap_ra_offset(det.ra, self.anchor_ra), t);
        self.dec.add(w_dec, det.dec - self.anchor_dec, t);

        self.sum_dt += t;
        self.min_dt = self.min_dt.min(t);
        self.max_dt = self.max_dt.max(t);

        self.flags |= det.flags;
        self.morphology.add(det);

        let band_acc = &mut self.bands[band.index()];
        band_acc.ndet += 1;
        band_acc.morphology.add(det);

        if det.has_valid_photometry(mag_valid_limit) {
            let w_m = 1.0 / (det.magerr_auto * det.magerr_auto);
            band_acc.nphot += 1;
            band_acc.sum_flux_w += FLUX_BASE.powf(det.mag_auto) * w_m;
            band_acc.sum_w += w_m;
            band_acc.sum_mag += det.mag_auto;
            band_acc.sum_mag2 += det.mag_auto * det.mag_auto;
        }
    }

    /// Current inverse-variance weighted mean position, in degrees.
    ///
    /// Used by the cross-matcher, so that an object drifting over the run is matched against
    /// its mean position rather than its first sighting.
    pub fn mean_position(&self) -> (Degree, Degree) {
        if self.ndet == 0 || self.ra.w <= 0.0 || self.dec.w <= 0.0 {
            return (self.anchor_ra, self.anchor_dec);
        }
        let ra = (self.anchor_ra + self.ra.wx / self.ra.w).rem_euclid(360.0);
        let dec = self.anchor_dec + self.dec.wx / self.dec.w;
        (ra, dec)
    }

    pub fn band(&self, band: Band) -> &BandAccum {
        &self.bands[band.index()]
    }

    /// Total number of detections with valid photometry, all bands.
    pub fn nphot(&self) -> u32 {
        self.bands.iter().map(|b| b.nphot).sum()
    }
}
