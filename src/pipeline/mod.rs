//! # Pixel pipeline
//!
//! End-to-end combination of one HEALPix pixel, from the exposure listing to the output tables.
//!
//! ## Overview
//! -----------------
//! [`combine_pixel`] runs the following steps:
//!
//! 1. skip the pixel if its outputs exist and `redo` is off,
//! 2. build the buffered [`PixelFootprint`],
//! 3. select the exposures listed for the pixel or one of its neighbours
//!    ([`exposures_for_pixel`]), each file once,
//! 4. load and fold each exposure in listing order ([`PixelCombiner::add_exposure`]),
//! 5. finalize and filter ([`PixelCombiner::finish`]),
//! 6. write the summary, object and provenance tables.
//!
//! Exposures that cannot be used (missing tables, unknown band, no detection in the
//! footprint, ...) are logged and skipped; only I/O failures on the outputs and an empty final
//! catalog abort the pixel.
//!
//! ## Exposure listing
//! -----------------
//! A CSV file with a header and (at least) the columns `pix` and `file`: the RING pixel an
//! exposure overlaps and the path to its `<base>_meta.parquet` table. An exposure overlapping
//! several pixels appears on several rows.
//!
//! ```text
//! pix,file
//! 40123,/data/c4d_130901_031805_ooi_g_v1/c4d_130901_031805_ooi_g_v1_meta.parquet
//! 40124,/data/c4d_130901_031805_ooi_g_v1/c4d_130901_031805_ooi_g_v1_meta.parquet
//! ```
//!
//! ## Progress UI (feature: `progress`)
//! -----------------
//! With the `progress` feature the exposure loop renders an `indicatif` progress bar with the
//! exposure rate, the ETA and the number of objects accumulated so far.

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use serde::Deserialize;
use tracing::{info, warn};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress")]
use std::time::Duration;

use crate::combine::{CombinedCatalog, PixelCombiner};
use crate::combine_errors::CombineError;
use crate::constants::{FastHashSet, PixelIndex};
use crate::detections::exposure_loader::load_exposure;
use crate::output::parquet_writer::{write_catalog, OutputPaths};
use crate::params::CombineParams;
use crate::reddening::ReddeningMap;
use crate::sky::footprint::PixelFootprint;
use crate::sky::healpix::neighbours;

/// One row of the exposure listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListingRow {
    pub pix: PixelIndex,
    pub file: String,
}

/// Read the exposure listing CSV.
pub fn read_listing(path: &Utf8Path) -> Result<Vec<ListingRow>, CombineError> {
    if !path.exists() {
        return Err(CombineError::MissingInput(path.to_string()));
    }
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    reader
        .deserialize::<ListingRow>()
        .map(|row| row.map_err(CombineError::from))
        .collect()
}

/// Metadata files of the exposures overlapping `pix` or one of its neighbours.
///
/// Return
/// ----------
/// * The files, each once, in listing order.
pub fn exposures_for_pixel(rows: &[ListingRow], nside: u64, pix: PixelIndex) -> Vec<Utf8PathBuf> {
    let mut wanted: FastHashSet<PixelIndex> = neighbours(nside, pix).into_iter().collect();
    wanted.insert(pix);

    rows.iter()
        .filter(|row| wanted.contains(&row.pix))
        .map(|row| row.file.as_str())
        .unique()
        .map(Utf8PathBuf::from)
        .collect()
}

/// Fold every exposure into the combiner, skipping the unusable ones.
#[cfg(not(feature = "progress"))]
fn fold_exposures(
    combiner: &mut PixelCombiner,
    files: &[Utf8PathBuf],
    footprint: &PixelFootprint,
    batch_size: usize,
) -> Result<usize, CombineError> {
    let mut used = 0;
    for file in files {
        if fold_one(combiner, file, footprint, batch_size)? {
            used += 1;
        }
    }
    Ok(used)
}

/// Fold every exposure into the combiner, skipping the unusable ones.
#[cfg(feature = "progress")]
fn fold_exposures(
    combiner: &mut PixelCombiner,
    files: &[Utf8PathBuf],
    footprint: &PixelFootprint,
    batch_size: usize,
) -> Result<usize, CombineError> {
    let pb = ProgressBar::new((files.len() as u64).max(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
    ) {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(200));

    let mut used = 0;
    for file in files {
        pb.set_message(file.file_name().unwrap_or(file.as_str()).to_string());

        let folded = fold_one(combiner, file, footprint, batch_size);
        pb.inc(1);
        pb.set_message(format!("{} objects", combiner.nobjects()));
        if folded? {
            used += 1;
        }
    }

    pb.disable_steady_tick();
    pb.finish_and_clear();
    Ok(used)
}

/// Load and fold one exposure. `Ok(false)` when it was skipped.
fn fold_one(
    combiner: &mut PixelCombiner,
    file: &Utf8Path,
    footprint: &PixelFootprint,
    batch_size: usize,
) -> Result<bool, CombineError> {
    match load_exposure(file, footprint, batch_size) {
        Ok(loaded) => {
            let outcome = combiner.add_exposure(&loaded.meta, &loaded.detections);
            info!(
                exposure = %loaded.meta.base,
                band = %loaded.meta.band,
                chips = loaded.chips_used,
                matched = outcome.matched,
                created = outcome.created,
                skipped = outcome.skipped,
                nobjects = combiner.nobjects(),
                "exposure combined"
            );
            Ok(outcome.used() > 0)
        }
        Err(err) if err.is_recoverable() => {
            warn!(file = %file, %err, "exposure skipped");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Combine a list of exposures for `pix` without writing anything.
///
/// Arguments
/// -----------------
/// * `pix`: RING pixel index at `params.nside`.
/// * `files`: `<base>_meta.parquet` tables, folded in this order.
/// * `params`: combination parameters.
/// * `reddening`: dust map for `ebv`.
///
/// Return
/// ----------
/// * The [`CombinedCatalog`], or [`CombineError::EmptyResult`] if nothing survives.
pub fn combine_exposures<R: ReddeningMap + ?Sized>(
    pix: PixelIndex,
    files: &[Utf8PathBuf],
    params: &CombineParams,
    reddening: &R,
) -> Result<CombinedCatalog, CombineError> {
    let footprint = PixelFootprint::new(params, pix)?;
    let mut combiner = PixelCombiner::new(pix, params.clone())?;

    let used = fold_exposures(&mut combiner, files, &footprint, params.batch_size)?;
    info!(pix, nexposures = files.len(), used, nobjects = combiner.nobjects(), "all exposures folded");

    combiner.finish(reddening)
}

/// Combine pixel `pix` and write its output tables.
///
/// Arguments
/// -----------------
/// * `pix`: RING pixel index at `params.nside`.
/// * `listing`: exposure listing CSV (`pix,file`).
/// * `outdir`: root output directory.
/// * `params`: combination parameters.
/// * `reddening`: dust map for `ebv`.
///
/// Return
/// ----------
/// * `Ok(None)` when the outputs already exist and `params.redo` is off,
/// * `Ok(Some(catalog))` once the tables are written,
/// * [`CombineError::EmptyResult`] when no exposure overlaps the pixel or no object lies in it.
pub fn combine_pixel<R: ReddeningMap + ?Sized>(
    pix: PixelIndex,
    listing: &Utf8Path,
    outdir: &Utf8Path,
    params: &CombineParams,
    reddening: &R,
) -> Result<Option<CombinedCatalog>, CombineError> {
    let paths = OutputPaths::new(outdir, pix);
    if paths.all_exist() && !params.redo {
        info!(pix, objects = %paths.objects, "outputs exist and redo is off, nothing to do");
        return Ok(None);
    }

    info!(pix, nside = params.nside, "combining pixel");
    let rows = read_listing(listing)?;
    let files = exposures_for_pixel(&rows, params.nside, pix);
    if files.is_empty() {
        return Err(CombineError::EmptyResult(format!(
            "no exposure overlaps pixel {pix}"
        )));
    }
    info!(pix, nexposures = files.len(), "overlapping exposures");

    let catalog = combine_exposures(pix, &files, params, reddening)?;

    write_catalog(&catalog, &paths)?;
    info!(
        pix,
        nobjects = catalog.objects.len(),
        ndetections = catalog.ledger.len(),
        objects = %paths.objects,
        "pixel written"
    );
    Ok(Some(catalog))
}
