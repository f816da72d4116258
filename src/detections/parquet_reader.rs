//! # Parquet readers for exposure tables
//!
//! Column-projected ingestion of the three per-exposure tables:
//!
//! | file                          | content                                   |
//! |-------------------------------|-------------------------------------------|
//! | `<base>_meta.parquet`         | one row of exposure metadata              |
//! | `<base>_chips.parquet`        | one row per chip: calibration + corners   |
//! | `<base>_<ccdnum>_meas.parquet`| one row per detection                     |
//!
//! ## Overview
//! -----------------
//! Every reader follows the same path:
//! - **Projection first**: only the required leaf columns are materialized.
//! - **Typed downcast once per batch**: columns are resolved by name and downcast to their
//!   concrete Arrow array type before the row loop.
//! - **Null check once per batch**: rows are inspected individually only when a column carries
//!   a null buffer; rows with a null in any required column are dropped.
//!
//! ## Error Handling
//! -----------------
//! - A missing file yields [`CombineError::MissingInput`].
//! - A missing column or a column of the wrong Arrow type yields
//!   [`CombineError::SchemaMismatch`]; callers treat the table as empty.
//! - Decoding failures surface as [`CombineError::ParquetError`].
use std::fs::File;

use arrow_array::array::{Array, Float64Array, Int64Array, StringArray};
use arrow_array::RecordBatch;
use camino::Utf8Path;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;

use crate::band::Band;
use crate::combine_errors::CombineError;
use crate::detections::{ChipMeta, Detection, ExposureMeta};

/// Columns of the detection table.
pub(crate) const DETECTION_COLUMNS: [&str; 16] = [
    "measid",
    "ra",
    "dec",
    "raerr",
    "decerr",
    "mag_auto",
    "magerr_auto",
    "asemi",
    "asemierr",
    "bsemi",
    "bsemierr",
    "theta",
    "thetaerr",
    "fwhm",
    "flags",
    "class_star",
];

/// Columns of the chip table.
pub(crate) const CHIP_COLUMNS: [&str; 11] = [
    "ccdnum",
    "nsources",
    "ngaiamatch",
    "vra1",
    "vra2",
    "vra3",
    "vra4",
    "vdec1",
    "vdec2",
    "vdec3",
    "vdec4",
];

/// Columns of the exposure metadata table.
pub(crate) const META_COLUMNS: [&str; 17] = [
    "base",
    "expnum",
    "ra",
    "dec",
    "dateobs",
    "mjd",
    "filter",
    "exptime",
    "airmass",
    "nsources",
    "fwhm",
    "nchips",
    "rarms",
    "decrms",
    "ebv",
    "zpterm",
    "zptermerr",
];

fn schema_error(path: &Utf8Path, reason: impl Into<String>) -> CombineError {
    CombineError::SchemaMismatch {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Open a Parquet file and project it on `columns`.
fn open_projected(
    path: &Utf8Path,
    columns: &[&str],
    batch_size: usize,
) -> Result<ParquetRecordBatchReader, CombineError> {
    if !path.exists() {
        return Err(CombineError::MissingInput(path.to_string()));
    }
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let schema_descr = builder.metadata().file_metadata().schema_descr();
    let all_fields = schema_descr.columns();
    let projection_indices: Vec<usize> = columns
        .iter()
        .map(|name| {
            all_fields
                .iter()
                .position(|f| f.name() == *name)
                .ok_or_else(|| schema_error(path, format!("column '{name}' not found")))
        })
        .collect::<Result<_, _>>()?;
    let mask = ProjectionMask::leaves(schema_descr, projection_indices);

    Ok(builder
        .with_projection(mask)
        .with_batch_size(batch_size)
        .build()?)
}

/// Typed view of a named column of a batch.
fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
    path: &Utf8Path,
) -> Result<&'a T, CombineError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| schema_error(path, format!("column '{name}' not found")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| {
            schema_error(
                path,
                format!("column '{name}' must be {}", std::any::type_name::<T>()),
            )
        })
}

/// Resolve several Float64 columns of a batch at once.
fn f64_columns<'a, const N: usize>(
    batch: &'a RecordBatch,
    names: [&str; N],
    path: &Utf8Path,
) -> Result<[&'a Float64Array; N], CombineError> {
    let mut out: Vec<&Float64Array> = Vec::with_capacity(N);
    for name in names {
        out.push(column::<Float64Array>(batch, name, path)?);
    }
    out.try_into()
        .map_err(|_| schema_error(path, "unexpected column count"))
}

/// Read every detection of a `<base>_<ccdnum>_meas.parquet` table.
///
/// Rows with a null in any required column are skipped.
///
/// Arguments
/// -----------------
/// * `path`: detection table.
/// * `batch_size`: Arrow reader batch size.
///
/// Return
/// ----------
/// * The detections, in file order.
pub(crate) fn read_detections(
    path: &Utf8Path,
    batch_size: usize,
) -> Result<Vec<Detection>, CombineError> {
    let reader = open_projected(path, &DETECTION_COLUMNS, batch_size)?;
    let mut detections = Vec::new();

    for maybe_batch in reader {
        let batch = maybe_batch.map_err(ParquetError::from)?;
        let len = batch.num_rows();

        let measid = column::<StringArray>(&batch, "measid", path)?;
        let flags = column::<Int64Array>(&batch, "flags", path)?;
        let [ra, dec, raerr, decerr, mag, magerr, asemi, asemierr, bsemi, bsemierr, theta, thetaerr, fwhm, class_star] =
            f64_columns(
                &batch,
                [
                    "ra",
                    "dec",
                    "raerr",
                    "decerr",
                    "mag_auto",
                    "magerr_auto",
                    "asemi",
                    "asemierr",
                    "bsemi",
                    "bsemierr",
                    "theta",
                    "thetaerr",
                    "fwhm",
                    "class_star",
                ],
                path,
            )?;
        let floats = [
            ra, dec, raerr, decerr, mag, magerr, asemi, asemierr, bsemi, bsemierr, theta,
            thetaerr, fwhm, class_star,
        ];

        let no_nulls = measid.nulls().is_none()
            && flags.nulls().is_none()
            && floats.iter().all(|a| a.nulls().is_none());

        detections.reserve(len);
        for i in 0..len {
            if !no_nulls
                && (measid.is_null(i) || flags.is_null(i) || floats.iter().any(|a| a.is_null(i)))
            {
                continue;
            }
            detections.push(Detection {
                measid: measid.value(i).to_string(),
                ra: ra.value(i),
                dec: dec.value(i),
                raerr: raerr.value(i),
                decerr: decerr.value(i),
                mag_auto: mag.value(i),
                magerr_auto: magerr.value(i),
                asemi: asemi.value(i),
                asemierr: asemierr.value(i),
                bsemi: bsemi.value(i),
                bsemierr: bsemierr.value(i),
                theta: theta.value(i),
                thetaerr: thetaerr.value(i),
                fwhm: fwhm.value(i),
                flags: flags.value(i),
                class_star: class_star.value(i),
            });
        }
    }

    Ok(detections)
}

/// Read the chip table of an exposure.
pub(crate) fn read_chips(path: &Utf8Path, batch_size: usize) -> Result<Vec<ChipMeta>, CombineError> {
    let reader = open_projected(path, &CHIP_COLUMNS, batch_size)?;
    let mut chips = Vec::new();

    for maybe_batch in reader {
        let batch = maybe_batch.map_err(ParquetError::from)?;

        let ccdnum = column::<Int64Array>(&batch, "ccdnum", path)?;
        let nsources = column::<Int64Array>(&batch, "nsources", path)?;
        let ngaiamatch = column::<Int64Array>(&batch, "ngaiamatch", path)?;
        let vra = f64_columns(&batch, ["vra1", "vra2", "vra3", "vra4"], path)?;
        let vdec = f64_columns(&batch, ["vdec1", "vdec2", "vdec3", "vdec4"], path)?;

        for i in 0..batch.num_rows() {
            if ccdnum.is_null(i)
                || ngaiamatch.is_null(i)
                || vra.iter().chain(vdec.iter()).any(|a| a.is_null(i))
            {
                continue;
            }
            chips.push(ChipMeta {
                ccdnum: ccdnum.value(i),
                nsources: if nsources.is_null(i) {
                    0
                } else {
                    nsources.value(i)
                },
                ngaiamatch: ngaiamatch.value(i),
                vra: vra.map(|a| a.value(i)),
                vdec: vdec.map(|a| a.value(i)),
            });
        }
    }

    Ok(chips)
}

/// Read the one-row metadata table of an exposure.
///
/// The band is parsed from the `filter` column; `file` is set to `path`.
///
/// Return
/// ----------
/// * The metadata of the first row, [`CombineError::SchemaMismatch`] for an empty table,
///   or [`CombineError::UnknownBand`] for an unsupported filter.
pub(crate) fn read_exposure_meta(
    path: &Utf8Path,
    batch_size: usize,
) -> Result<ExposureMeta, CombineError> {
    let reader = open_projected(path, &META_COLUMNS, batch_size)?;

    for maybe_batch in reader {
        let batch = maybe_batch.map_err(ParquetError::from)?;
        if batch.num_rows() == 0 {
            continue;
        }

        let base = column::<StringArray>(&batch, "base", path)?;
        let dateobs = column::<StringArray>(&batch, "dateobs", path)?;
        let filter = column::<StringArray>(&batch, "filter", path)?;
        let expnum = column::<Int64Array>(&batch, "expnum", path)?;
        let nsources = column::<Int64Array>(&batch, "nsources", path)?;
        let nchips = column::<Int64Array>(&batch, "nchips", path)?;
        let [ra, dec, mjd, exptime, airmass, fwhm, rarms, decrms, ebv, zpterm, zptermerr] =
            f64_columns(
                &batch,
                [
                    "ra",
                    "dec",
                    "mjd",
                    "exptime",
                    "airmass",
                    "fwhm",
                    "rarms",
                    "decrms",
                    "ebv",
                    "zpterm",
                    "zptermerr",
                ],
                path,
            )?;

        let filter_str = filter.value(0).to_string();
        let band = Band::from_filter(&filter_str)?;

        return Ok(ExposureMeta {
            file: path.to_string(),
            base: base.value(0).to_string(),
            expnum: expnum.value(0),
            ra: ra.value(0),
            dec: dec.value(0),
            dateobs: dateobs.value(0).to_string(),
            mjd: mjd.value(0),
            filter: filter_str,
            band,
            exptime: exptime.value(0),
            airmass: airmass.value(0),
            nsources: nsources.value(0),
            fwhm: fwhm.value(0),
            nchips: nchips.value(0),
            rarms: rarms.value(0),
            decrms: decrms.value(0),
            ebv: ebv.value(0),
            zpterm: zpterm.value(0),
            zptermerr: zptermerr.value(0),
        });
    }

    Err(schema_error(path, "metadata table is empty"))
}
