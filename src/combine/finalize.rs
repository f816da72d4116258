//! # Closed-form reduction of the running sums
//!
//! [`finalize`] turns one [`ObjectAccum`] into a [`CombinedObject`]. It runs once per object,
//! after every exposure has been folded.
//!
//! ## Formulas
//! -----------------
//! With `w` the per-axis inverse-variance weights (arcsec⁻²), `x` the position offsets and `t`
//! the time offsets of the accumulator:
//!
//! ```text
//! ⟨x⟩      = Σw·x / Σw                          position = anchor + ⟨x⟩
//! σ(⟨x⟩)   = sqrt(1 / Σw)                        arcsec
//! var_t    = Σw·t² / Σw − ⟨t⟩²
//! slope    = (Σw·t·x / Σw − ⟨t⟩⟨x⟩) / var_t      deg/day
//! σ(slope) = 1 / sqrt(Σw·t² − ⟨t⟩² Σw)           arcsec/day
//! ```
//!
//! Slopes are converted to mas/yr, the RA component multiplied by `cos(dec)` to give a true
//! angular rate. The weights are in arcsec⁻², so the slope error is already a true angle in
//! arcsec/day on both axes.
//!
//! Per band, with `N = nphot`:
//!
//! ```text
//! mag = 2.5 · log10(Σ(FLUX_BASE^m · w) / Σw)      err = sqrt(1 / Σw)
//! rms = sqrt(max(0, Σm²/N − 2·mag·Σm/N + mag²))    only for N > 1
//! ```
//!
//! ## Missing values
//! -----------------
//! Anything that cannot be computed is `None`: proper motions of objects with fewer than two
//! detections or a time variance at or below `min_time_variance`, magnitudes of bands without
//! valid photometry, RMS with fewer than two photometric points, morphology of bands without
//! detections. The writer substitutes the sentinels.
use crate::band::NBANDS;
use crate::combine::accumulator::{AxisSums, BandAccum, MorphologySums, ObjectAccum};
use crate::constants::{ArcSec, Degree, DAYS_PER_YEAR, MAS_PER_DEG, MJD, RADEG};

/// Final photometry and morphology of one object in one band.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandSummary {
    pub ndet: u32,
    pub nphot: u32,
    pub mag: Option<f64>,
    pub err: Option<f64>,
    pub rms: Option<f64>,
    pub asemi: Option<f64>,
    pub bsemi: Option<f64>,
    pub theta: Option<f64>,
}

/// Morphology averaged over all detections of an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Morphology {
    pub asemi: Option<f64>,
    pub asemierr: Option<f64>,
    pub bsemi: Option<f64>,
    pub bsemierr: Option<f64>,
    pub theta: Option<f64>,
    pub thetaerr: Option<f64>,
    pub fwhm: Option<f64>,
    pub class_star: Option<f64>,
}

/// One finalized object.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedObject {
    pub id: String,
    pub ra: Degree,
    pub dec: Degree,
    pub raerr: ArcSec,
    pub decerr: ArcSec,
    /// mas/yr, true angle.
    pub pmra: Option<f64>,
    pub pmraerr: Option<f64>,
    /// mas/yr.
    pub pmdec: Option<f64>,
    pub pmdecerr: Option<f64>,
    /// Mean epoch of the detections.
    pub mjd: MJD,
    /// Time span between first and last epoch, days.
    pub deltamjd: f64,
    pub ndet: u32,
    pub nphot: u32,
    pub bands: [BandSummary; NBANDS],
    pub morphology: Morphology,
    pub flags: i64,
    /// Filled from the reddening map after finalization.
    pub ebv: Option<f64>,
}

/// Deg/day → mas/yr
const PM_FACTOR: f64 = MAS_PER_DEG * DAYS_PER_YEAR;

/// Arcsec/day → mas/yr
const PM_ERR_FACTOR: f64 = 1000.0 * DAYS_PER_YEAR;

#[inline]
fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// Slope and slope uncertainty of one axis, `None` when the time baseline is degenerate.
fn axis_motion(sums: &AxisSums, min_time_variance: f64) -> Option<(f64, f64)> {
    if sums.w <= 0.0 {
        return None;
    }
    let mean_t = sums.wt / sums.w;
    let mean_x = sums.wx / sums.w;
    let var_t = sums.wt2 / sums.w - mean_t * mean_t;
    if var_t.is_nan() || var_t <= min_time_variance {
        return None;
    }
    let slope = (sums.wtx / sums.w - mean_t * mean_x) / var_t;
    let slope_err = 1.0 / (sums.w * var_t).sqrt();
    Some((finite(slope)?, finite(slope_err)?))
}

fn band_summary(acc: &BandAccum) -> BandSummary {
    let (mag, err) = if acc.nphot > 0 && acc.sum_w > 0.0 {
        let mag = 2.5 * (acc.sum_flux_w / acc.sum_w).log10();
        let err = (1.0 / acc.sum_w).sqrt();
        match (finite(mag), finite(err)) {
            (Some(m), Some(e)) => (Some(m), Some(e)),
            _ => (None, None),
        }
    } else {
        (None, None)
    };

    let rms = match mag {
        Some(m) if acc.nphot > 1 => {
            let n = acc.nphot as f64;
            let radicand = acc.sum_mag2 / n - 2.0 * m * acc.sum_mag / n + m * m;
            Some(radicand.max(0.0).sqrt())
        }
        _ => None,
    };

    let mean = |sum: f64| mean_of(sum, acc.morphology.count);
    BandSummary {
        ndet: acc.ndet,
        nphot: acc.nphot,
        mag,
        err,
        rms,
        asemi: mean(acc.morphology.asemi),
        bsemi: mean(acc.morphology.bsemi),
        theta: mean(acc.morphology.theta),
    }
}

#[inline]
fn mean_of(sum: f64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

#[inline]
fn quadrature_mean(sum_sq: f64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum_sq.sqrt() / count as f64)
}

fn morphology(sums: &MorphologySums) -> Morphology {
    let n = sums.count;
    Morphology {
        asemi: mean_of(sums.asemi, n),
        asemierr: quadrature_mean(sums.asemierr2, n),
        bsemi: mean_of(sums.bsemi, n),
        bsemierr: quadrature_mean(sums.bsemierr2, n),
        theta: mean_of(sums.theta, n),
        thetaerr: quadrature_mean(sums.thetaerr2, n),
        fwhm: mean_of(sums.fwhm, n),
        class_star: mean_of(sums.class_star, n),
    }
}

/// Reduce the running sums of one object to its final quantities.
///
/// Arguments
/// -----------------
/// * `acc`: accumulator with at least one folded detection.
/// * `min_time_variance`: weighted time variance (day²) at or below which the proper motion is
///   left undefined.
///
/// Return
/// ----------
/// * The [`CombinedObject`], with `ebv` left to `None`.
pub fn finalize(acc: &ObjectAccum, min_time_variance: f64) -> CombinedObject {
    let (ra, dec) = acc.mean_position();
    let raerr = (1.0 / acc.ra.w).sqrt();
    let decerr = (1.0 / acc.dec.w).sqrt();

    let motion = if acc.ndet >= 2 {
        axis_motion(&acc.ra, min_time_variance).zip(axis_motion(&acc.dec, min_time_variance))
    } else {
        None
    };
    let (pmra, pmraerr, pmdec, pmdecerr) = match motion {
        Some(((sra, sra_err), (sdec, sdec_err))) => (
            Some(sra * PM_FACTOR * (dec * RADEG).cos()),
            Some(sra_err * PM_ERR_FACTOR),
            Some(sdec * PM_FACTOR),
            Some(sdec_err * PM_ERR_FACTOR),
        ),
        None => (None, None, None, None),
    };

    let ndet = acc.ndet.max(1) as f64;

    CombinedObject {
        id: acc.id.clone(),
        ra,
        dec,
        raerr,
        decerr,
        pmra,
        pmraerr,
        pmdec,
        pmdecerr,
        mjd: acc.anchor_mjd + acc.sum_dt / ndet,
        deltamjd: if acc.ndet > 0 {
            acc.max_dt - acc.min_dt
        } else {
            0.0
        },
        ndet: acc.ndet,
        nphot: acc.nphot(),
        bands: std::array::from_fn(|i| band_summary(&acc.bands[i])),
        morphology: morphology(&acc.morphology),
        flags: acc.flags,
        ebv: None,
    }
}

#[cfg(test)]
mod finalize_test {
    use super::*;
    use crate::band::Band;
    use crate::constants::FLUX_BASE;
    use crate::detections::{Detection, ExposureMeta};
    use approx::assert_relative_eq;

    fn fold_all(dets: &[(Detection, ExposureMeta)]) -> ObjectAccum {
        let (first, exp) = &dets[0];
        let mut acc = ObjectAccum::new("9.1".into(), first, exp);
        for (d, e) in dets {
            acc.fold(d, e, 50.0);
        }
        acc
    }

    #[test]
    fn test_single_detection() {
        let det = Detection::new("m1", 30.0, 10.0, 0.1, 18.0, 0.05);
        let exp = ExposureMeta::new("e1", 1, Band::G, 57_000.0);
        let obj = finalize(&fold_all(&[(det, exp)]), 1e-10);

        assert_relative_eq!(obj.ra, 30.0, epsilon = 1e-12);
        assert_relative_eq!(obj.raerr, 0.1, epsilon = 1e-12);
        assert_relative_eq!(obj.mjd, 57_000.0);
        assert_eq!(obj.deltamjd, 0.0);
        assert!(obj.pmra.is_none() && obj.pmdecerr.is_none());

        let g = &obj.bands[Band::G.index()];
        assert_relative_eq!(g.mag.unwrap(), 18.0, epsilon = 1e-6);
        assert_relative_eq!(g.err.unwrap(), 0.05, epsilon = 1e-12);
        assert!(g.rms.is_none());
        assert_eq!(g.asemi, Some(1.0));

        let r = &obj.bands[Band::R.index()];
        assert!(r.mag.is_none() && r.err.is_none() && r.asemi.is_none());
        assert_eq!(obj.morphology.fwhm, Some(1.0));
    }

    #[test]
    fn test_weighted_magnitude_and_rms() {
        let e1 = ExposureMeta::new("e1", 1, Band::G, 57_000.0);
        let e2 = ExposureMeta::new("e2", 2, Band::G, 57_001.0);
        let d1 = Detection::new("m1", 30.0, 10.0, 0.1, 18.0, 0.1);
        let d2 = Detection::new("m2", 30.0, 10.0, 0.1, 18.2, 0.1);
        let obj = finalize(&fold_all(&[(d1, e1), (d2, e2)]), 1e-10);

        let g = &obj.bands[Band::G.index()];
        // equal weights: flux-averaged magnitude
        let expected = 2.5 * ((FLUX_BASE.powf(18.0) + FLUX_BASE.powf(18.2)) / 2.0).log10();
        assert_relative_eq!(g.mag.unwrap(), expected, epsilon = 1e-9);
        assert_relative_eq!(g.err.unwrap(), (1.0_f64 / 200.0).sqrt(), epsilon = 1e-12);
        let rms = g.rms.unwrap();
        assert!(rms > 0.09 && rms < 0.11);
        assert_eq!(obj.nphot, 2);
    }

    #[test]
    fn test_proper_motion_recovery() {
        // 100 mas/yr in dec, 50 mas/yr (true angle) in ra at dec = 60
        let dec0: f64 = 60.0;
        let pm_dec = 100.0 / PM_FACTOR;
        let pm_ra = 50.0 / PM_FACTOR / (dec0 * RADEG).cos();

        let dets: Vec<(Detection, ExposureMeta)> = (0..6)
            .map(|k| {
                let dt = 200.0 * k as f64;
                let det = Detection::new(
                    format!("m{k}"),
                    120.0 + pm_ra * dt,
                    dec0 + pm_dec * dt,
                    0.02,
                    19.0,
                    0.05,
                );
                (det, ExposureMeta::new(format!("e{k}"), k, Band::R, 56_000.0 + dt))
            })
            .collect();
        let obj = finalize(&fold_all(&dets), 1e-10);

        assert_relative_eq!(obj.pmdec.unwrap(), 100.0, epsilon = 1e-4);
        assert_relative_eq!(obj.pmra.unwrap(), 50.0, epsilon = 1e-2);
        assert!(obj.pmraerr.unwrap() > 0.0);
        assert_relative_eq!(obj.deltamjd, 1000.0);
        assert_relative_eq!(obj.mjd, 56_500.0, epsilon = 1e-9);

        // error: 1/sqrt(Σw·var_t) arcsec/day
        let w = 1.0 / (0.02 * 0.02);
        let ts: Vec<f64> = (0..6).map(|k| 200.0 * k as f64).collect();
        let mean_t = ts.iter().sum::<f64>() / 6.0;
        let var_t = ts.iter().map(|t| (t - mean_t).powi(2)).sum::<f64>() / 6.0;
        let expected_err = 1.0 / (6.0 * w * var_t).sqrt() * PM_ERR_FACTOR;
        assert_relative_eq!(obj.pmdecerr.unwrap(), expected_err, epsilon = 1e-9);
    }

    #[test]
    fn test_same_epoch_gives_no_proper_motion() {
        let e = ExposureMeta::new("e1", 1, Band::I, 57_000.0);
        let d1 = Detection::new("m1", 30.0, 10.0, 0.1, 18.0, 0.1);
        let d2 = Detection::new("m2", 30.00001, 10.0, 0.1, 18.0, 0.1);
        let obj = finalize(&fold_all(&[(d1, e.clone()), (d2, e)]), 1e-10);
        assert_eq!(obj.ndet, 2);
        assert!(obj.pmra.is_none());
        assert!(obj.pmdec.is_none());
        assert!(obj.pmraerr.is_none());
        assert!(obj.pmdecerr.is_none());
    }

    #[test]
    fn test_rms_never_negative() {
        // identical magnitudes: the radicand is zero up to rounding
        let dets: Vec<(Detection, ExposureMeta)> = (0..5)
            .map(|k| {
                (
                    Detection::new(format!("m{k}"), 1.0, 1.0, 0.1, 21.3, 0.2),
                    ExposureMeta::new(format!("e{k}"), k, Band::Z, 57_000.0 + k as f64),
                )
            })
            .collect();
        let obj = finalize(&fold_all(&dets), 1e-10);
        let rms = obj.bands[Band::Z.index()].rms.unwrap();
        assert!(rms.is_finite());
        assert!(rms >= 0.0);
        assert!(rms < 1e-6);
    }

    #[test]
    fn test_morphology_errors_in_quadrature() {
        let e1 = ExposureMeta::new("e1", 1, Band::G, 57_000.0);
        let e2 = ExposureMeta::new("e2", 2, Band::R, 57_001.0);
        let mut d1 = Detection::new("m1", 30.0, 10.0, 0.1, 18.0, 0.1);
        let mut d2 = Detection::new("m2", 30.0, 10.0, 0.1, 18.0, 0.1);
        d1.asemi = 2.0;
        d1.asemierr = 0.3;
        d2.asemi = 4.0;
        d2.asemierr = 0.4;
        let obj = finalize(&fold_all(&[(d1, e1), (d2, e2)]), 1e-10);

        assert_relative_eq!(obj.morphology.asemi.unwrap(), 3.0);
        assert_relative_eq!(obj.morphology.asemierr.unwrap(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(obj.bands[Band::G.index()].asemi.unwrap(), 2.0);
        assert_relative_eq!(obj.bands[Band::R.index()].asemi.unwrap(), 4.0);
    }
}
