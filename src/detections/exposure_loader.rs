//! # Per-exposure loading
//!
//! Assemble the detections of one exposure that fall in the buffered footprint of a pixel.
//!
//! ## Overview
//! -----------------
//! Starting from the metadata table `<dir>/<base>_meta.parquet`:
//!
//! 1. read the exposure metadata and recompute `mjd` from `dateobs` (UTC),
//! 2. read the chip table `<dir>/<base>_chips.parquet`,
//! 3. keep the chips with an astrometric solution (`ngaiamatch > 1`) whose corner polygon
//!    overlaps the buffered footprint,
//! 4. read `<dir>/<base>_<ccdnum>_meas.parquet` for each of them; a missing or malformed chip
//!    table only costs that chip,
//! 5. keep the detections inside the buffered footprint.
//!
//! An exposure left with no detection is reported as [`CombineError::NoOverlap`].
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use hifitime::Epoch;
use tracing::{debug, warn};

use crate::combine_errors::CombineError;
use crate::constants::MJD;
use crate::detections::parquet_reader::{read_chips, read_detections, read_exposure_meta};
use crate::detections::{ChipMeta, Detection, ExposureMeta};
use crate::sky::footprint::PixelFootprint;

/// Detections of one exposure restricted to a pixel footprint.
#[derive(Debug, Clone)]
pub struct LoadedExposure {
    pub meta: ExposureMeta,
    pub detections: Vec<Detection>,
    /// Chips whose detections were read.
    pub chips_used: usize,
}

/// `<dir>/<base>_chips.parquet`
pub fn chips_path(dir: &Utf8Path, base: &str) -> Utf8PathBuf {
    dir.join(format!("{base}_chips.parquet"))
}

/// `<dir>/<base>_<ccdnum>_meas.parquet`
pub fn meas_path(dir: &Utf8Path, base: &str, ccdnum: i64) -> Utf8PathBuf {
    dir.join(format!("{base}_{ccdnum}_meas.parquet"))
}

/// `<dir>/<base>_meta.parquet`
pub fn meta_path(dir: &Utf8Path, base: &str) -> Utf8PathBuf {
    dir.join(format!("{base}_meta.parquet"))
}

/// Modified Julian Date (UTC) of an ISO-8601 timestamp.
pub fn mjd_from_dateobs(dateobs: &str) -> Result<MJD, CombineError> {
    let epoch = Epoch::from_str(dateobs.trim())
        .map_err(|e| CombineError::InvalidDate(format!("{dateobs}: {e}")))?;
    Ok(epoch.to_mjd_utc_days())
}

fn chip_is_usable(chip: &ChipMeta, footprint: &PixelFootprint) -> bool {
    if chip.ngaiamatch <= 1 {
        debug!(ccdnum = chip.ccdnum, ngaiamatch = chip.ngaiamatch, "chip without astrometric solution");
        return false;
    }
    footprint.overlaps(&chip.vra, &chip.vdec)
}

/// Load the detections of one exposure inside the buffered footprint.
///
/// Arguments
/// -----------------
/// * `meta_file`: path to the `<base>_meta.parquet` table; the chip and detection tables are
///   looked up in the same directory.
/// * `footprint`: buffered footprint of the pixel being combined.
/// * `batch_size`: Parquet reader batch size.
///
/// Return
/// ----------
/// * The [`LoadedExposure`], or
/// * [`CombineError::MissingInput`] when the metadata or chip table is absent,
/// * [`CombineError::UnknownBand`] for an unsupported filter,
/// * [`CombineError::NoOverlap`] when no detection survives the selection.
pub fn load_exposure(
    meta_file: &Utf8Path,
    footprint: &PixelFootprint,
    batch_size: usize,
) -> Result<LoadedExposure, CombineError> {
    let mut meta = read_exposure_meta(meta_file, batch_size)?;
    match mjd_from_dateobs(&meta.dateobs) {
        Ok(mjd) => meta.mjd = mjd,
        Err(err) => warn!(exposure = %meta.base, %err, "keeping the stored mjd"),
    }

    let dir = meta_file.parent().unwrap_or(Utf8Path::new("."));
    let chips = read_chips(&chips_path(dir, &meta.base), batch_size)?;

    let mut detections = Vec::new();
    let mut chips_used = 0;
    for chip in chips.iter().filter(|c| chip_is_usable(c, footprint)) {
        let path = meas_path(dir, &meta.base, chip.ccdnum);
        let chip_dets = match read_detections(&path, batch_size) {
            Ok(dets) => dets,
            Err(err) if err.is_recoverable() => {
                warn!(exposure = %meta.base, ccdnum = chip.ccdnum, %err, "chip skipped");
                continue;
            }
            Err(err) => return Err(err),
        };
        chips_used += 1;
        detections.extend(
            chip_dets
                .into_iter()
                .filter(|d| footprint.contains(d.ra, d.dec)),
        );
    }

    if detections.is_empty() {
        return Err(CombineError::NoOverlap(meta.base));
    }

    debug!(
        exposure = %meta.base,
        band = %meta.band,
        chips_used,
        ndet = detections.len(),
        "exposure loaded"
    );

    Ok(LoadedExposure {
        meta,
        detections,
        chips_used,
    })
}
