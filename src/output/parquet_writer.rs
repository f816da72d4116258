//! # Parquet output of a combined pixel
//!
//! Three tables per pixel, written under `<outdir>/<pix / 1000>/`:
//!
//! * `<pix>_summary.parquet`: one row per contributing exposure (metadata, `nobjects`,
//!   `healpix`),
//! * `<pix>_objects.parquet`: one row per object, tagged with `pix`, per-band quantities flattened into
//!   `<band>mag`, `<band>err`, `<band>rms`, `ndet<band>`, ... columns,
//! * `<pix>_idstr.parquet`: the provenance ledger.
//!
//! This is where missing values become sentinels: `99.99` for magnitudes, `9.99` for
//! magnitude errors and `999999` for every other undefined quantity.
use std::fs::{self, File};
use std::sync::Arc;

use arrow_array::array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow_array::RecordBatch;
use camino::{Utf8Path, Utf8PathBuf};
use parquet::arrow::ArrowWriter;
use parquet::errors::ParquetError;

use crate::band::Band;
use crate::combine::finalize::CombinedObject;
use crate::combine::ledger::ProvenanceEntry;
use crate::combine::summary::ExposureSummary;
use crate::combine::CombinedCatalog;
use crate::combine_errors::CombineError;
use crate::constants::{or_sentinel, PixelIndex, MAGERR_SENTINEL, MAG_SENTINEL};

/// Locations of the three output tables of a pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: Utf8PathBuf,
    pub summary: Utf8PathBuf,
    pub objects: Utf8PathBuf,
    pub idstr: Utf8PathBuf,
}

impl OutputPaths {
    pub fn new(outdir: &Utf8Path, pix: PixelIndex) -> Self {
        let dir = outdir.join((pix / 1000).to_string());
        OutputPaths {
            summary: dir.join(format!("{pix}_summary.parquet")),
            objects: dir.join(format!("{pix}_objects.parquet")),
            idstr: dir.join(format!("{pix}_idstr.parquet")),
            dir,
        }
    }

    /// All three tables are already on disk.
    pub fn all_exist(&self) -> bool {
        self.summary.exists() && self.objects.exists() && self.idstr.exists()
    }
}

fn f64_col(values: impl Iterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(values))
}

fn i64_col(values: impl Iterator<Item = i64>) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(values))
}

fn str_col<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(values))
}

fn write_batch(path: &Utf8Path, batch: &RecordBatch) -> Result<(), CombineError> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

pub(crate) fn summary_batch(rows: &[ExposureSummary]) -> Result<RecordBatch, CombineError> {
    let m = |f: fn(&ExposureSummary) -> f64| f64_col(rows.iter().map(f));
    let columns: Vec<(&str, ArrayRef)> = vec![
        ("file", str_col(rows.iter().map(|r| r.meta.file.as_str()))),
        ("base", str_col(rows.iter().map(|r| r.meta.base.as_str()))),
        ("expnum", i64_col(rows.iter().map(|r| r.meta.expnum))),
        ("ra", m(|r| r.meta.ra)),
        ("dec", m(|r| r.meta.dec)),
        ("dateobs", str_col(rows.iter().map(|r| r.meta.dateobs.as_str()))),
        ("mjd", m(|r| r.meta.mjd)),
        ("filter", str_col(rows.iter().map(|r| r.meta.filter.as_str()))),
        ("exptime", m(|r| r.meta.exptime)),
        ("airmass", m(|r| r.meta.airmass)),
        ("nsources", i64_col(rows.iter().map(|r| r.meta.nsources))),
        ("fwhm", m(|r| r.meta.fwhm)),
        ("nchips", i64_col(rows.iter().map(|r| r.meta.nchips))),
        ("rarms", m(|r| r.meta.rarms)),
        ("decrms", m(|r| r.meta.decrms)),
        ("ebv", m(|r| r.meta.ebv)),
        ("zpterm", m(|r| r.meta.zpterm)),
        ("zptermerr", m(|r| r.meta.zptermerr)),
        ("nobjects", i64_col(rows.iter().map(|r| r.nobjects as i64))),
        (
            "healpix",
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.healpix))) as ArrayRef,
        ),
    ];
    Ok(RecordBatch::try_from_iter(columns).map_err(ParquetError::from)?)
}

pub(crate) fn objects_batch(
    objects: &[CombinedObject],
    pix: PixelIndex,
) -> Result<RecordBatch, CombineError> {
    let opt = |f: fn(&CombinedObject) -> Option<f64>| {
        f64_col(objects.iter().map(move |o| or_sentinel(f(o))))
    };
    let val = |f: fn(&CombinedObject) -> f64| f64_col(objects.iter().map(f));

    let mut columns: Vec<(String, ArrayRef)> = vec![
        ("objectid".into(), str_col(objects.iter().map(|o| o.id.as_str()))),
        (
            "pix".into(),
            Arc::new(UInt64Array::from_iter_values(objects.iter().map(|_| pix))) as ArrayRef,
        ),
        ("ra".into(), val(|o| o.ra)),
        ("raerr".into(), val(|o| o.raerr)),
        ("dec".into(), val(|o| o.dec)),
        ("decerr".into(), val(|o| o.decerr)),
        ("pmra".into(), opt(|o| o.pmra)),
        ("pmraerr".into(), opt(|o| o.pmraerr)),
        ("pmdec".into(), opt(|o| o.pmdec)),
        ("pmdecerr".into(), opt(|o| o.pmdecerr)),
        ("mjd".into(), val(|o| o.mjd)),
        ("deltamjd".into(), val(|o| o.deltamjd)),
        ("ndet".into(), i64_col(objects.iter().map(|o| o.ndet as i64))),
        ("nphot".into(), i64_col(objects.iter().map(|o| o.nphot as i64))),
    ];

    for band in Band::ALL {
        let b = band.index();
        let p = band.column_prefix();
        let bands = || objects.iter().map(move |o| &o.bands[b]);
        columns.extend([
            (format!("ndet{p}"), i64_col(bands().map(|s| s.ndet as i64))),
            (format!("nphot{p}"), i64_col(bands().map(|s| s.nphot as i64))),
            (
                format!("{p}mag"),
                f64_col(bands().map(|s| s.mag.unwrap_or(MAG_SENTINEL))),
            ),
            (
                format!("{p}err"),
                f64_col(bands().map(|s| s.err.unwrap_or(MAGERR_SENTINEL))),
            ),
            (format!("{p}rms"), f64_col(bands().map(|s| or_sentinel(s.rms)))),
            (format!("{p}asemi"), f64_col(bands().map(|s| or_sentinel(s.asemi)))),
            (format!("{p}bsemi"), f64_col(bands().map(|s| or_sentinel(s.bsemi)))),
            (format!("{p}theta"), f64_col(bands().map(|s| or_sentinel(s.theta)))),
        ]);
    }

    columns.extend([
        ("asemi".into(), opt(|o| o.morphology.asemi)),
        ("asemierr".into(), opt(|o| o.morphology.asemierr)),
        ("bsemi".into(), opt(|o| o.morphology.bsemi)),
        ("bsemierr".into(), opt(|o| o.morphology.bsemierr)),
        ("theta".into(), opt(|o| o.morphology.theta)),
        ("thetaerr".into(), opt(|o| o.morphology.thetaerr)),
        ("fwhm".into(), opt(|o| o.morphology.fwhm)),
        ("flags".into(), i64_col(objects.iter().map(|o| o.flags))),
        ("class_star".into(), opt(|o| o.morphology.class_star)),
        ("ebv".into(), opt(|o| o.ebv)),
    ]);

    Ok(RecordBatch::try_from_iter(columns).map_err(ParquetError::from)?)
}

pub(crate) fn idstr_batch(entries: &[ProvenanceEntry]) -> Result<RecordBatch, CombineError> {
    let columns: Vec<(&str, ArrayRef)> = vec![
        ("measid", str_col(entries.iter().map(|e| e.measid.as_str()))),
        ("exposure", str_col(entries.iter().map(|e| e.exposure.as_str()))),
        ("expnum", i64_col(entries.iter().map(|e| e.expnum))),
        ("objectid", str_col(entries.iter().map(|e| e.object_id.as_str()))),
        (
            "objectindex",
            i64_col(entries.iter().map(|e| e.object_index as i64)),
        ),
    ];
    Ok(RecordBatch::try_from_iter(columns).map_err(ParquetError::from)?)
}

/// Write the summary, object and provenance tables of a combined pixel.
///
/// Existing files are overwritten.
///
/// Arguments
/// -----------------
/// * `catalog`: the combined pixel.
/// * `paths`: output locations, see [`OutputPaths::new`].
pub fn write_catalog(catalog: &CombinedCatalog, paths: &OutputPaths) -> Result<(), CombineError> {
    fs::create_dir_all(&paths.dir)?;

    write_batch(&paths.summary, &summary_batch(&catalog.summary)?)?;
    write_batch(&paths.objects, &objects_batch(&catalog.objects, catalog.pix)?)?;
    write_batch(&paths.idstr, &idstr_batch(&catalog.ledger)?)?;
    Ok(())
}
