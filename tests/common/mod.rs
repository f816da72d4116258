#![allow(dead_code)]

use std::fs::File;
use std::sync::Arc;

use arrow_array::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow_array::RecordBatch;
use camino::{Utf8Path, Utf8PathBuf};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::Rng;

use skycombine::detections::Detection;
use skycombine::sky::healpix::{ang2pix_ring, pix_center};
use skycombine::sky::tangent_plane::{angular_separation_deg, TangentPlane};

pub const ARCSEC: f64 = 1.0 / 3600.0;

/// A synthetic source: true position and magnitude.
#[derive(Debug, Clone, Copy)]
pub struct Star {
    pub ra: f64,
    pub dec: f64,
    pub mag: f64,
}

/// Pixel containing (`ra`, `dec`) at `nside`, with its centre.
pub fn pixel_at(nside: u64, ra: f64, dec: f64) -> (u64, f64, f64) {
    let pix = ang2pix_ring(nside, ra, dec);
    let (cra, cdec) = pix_center(nside, pix);
    (pix, cra, cdec)
}

/// `n` stars within `radius` degrees of the centre, at least `min_sep` degrees apart.
pub fn random_stars(
    rng: &mut StdRng,
    center: (f64, f64),
    radius: f64,
    n: usize,
    min_sep: f64,
) -> Vec<Star> {
    let plane = TangentPlane::new(center.0, center.1);
    let mut stars: Vec<Star> = Vec::with_capacity(n);
    while stars.len() < n {
        let xi = rng.random_range(-radius..radius);
        let eta = rng.random_range(-radius..radius);
        if xi.hypot(eta) > radius {
            continue;
        }
        let (ra, dec) = plane.deproject(xi, eta);
        if stars
            .iter()
            .any(|s| angular_separation_deg(s.ra, s.dec, ra, dec) < min_sep)
        {
            continue;
        }
        stars.push(Star {
            ra,
            dec,
            mag: rng.random_range(16.0..22.0),
        });
    }
    stars
}

/// One observation of every star, with positional jitter up to `jitter` degrees per axis and a
/// magnitude scatter up to `mag_scatter`.
pub fn observe(
    rng: &mut StdRng,
    stars: &[Star],
    exposure: &str,
    jitter: f64,
    mag_scatter: f64,
) -> Vec<Detection> {
    stars
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let dra = rng.random_range(-jitter..=jitter) / s.dec.to_radians().cos();
            let ddec = rng.random_range(-jitter..=jitter);
            let dmag = if mag_scatter > 0.0 {
                rng.random_range(-mag_scatter..=mag_scatter)
            } else {
                0.0
            };
            let mut det = Detection::new(
                format!("{exposure}.{i}"),
                (s.ra + dra).rem_euclid(360.0),
                s.dec + ddec,
                rng.random_range(0.02..0.1),
                s.mag + dmag,
                rng.random_range(0.01..0.05),
            );
            det.flags = (i % 3) as i64;
            det
        })
        .collect()
}

// -------------------------------------------------------------------------------------------------
// Parquet fixtures
// -------------------------------------------------------------------------------------------------

fn write_batch(path: &Utf8Path, batch: &RecordBatch) {
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

fn f64s(v: impl IntoIterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(v))
}

fn i64s(v: impl IntoIterator<Item = i64>) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(v))
}

fn strs<'a>(v: impl IntoIterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(v))
}

/// One chip of a synthetic exposure.
pub struct ChipFixture {
    pub ccdnum: i64,
    pub ngaiamatch: i64,
    /// Corners (RA, Dec) in degrees.
    pub corners: [(f64, f64); 4],
    pub detections: Vec<Detection>,
    /// Write the detection table (false simulates a missing chip file).
    pub write_meas: bool,
}

impl ChipFixture {
    /// Square chip of half-size `half` degrees centred on (`ra`, `dec`).
    pub fn square(ccdnum: i64, ra: f64, dec: f64, half: f64, detections: Vec<Detection>) -> Self {
        ChipFixture {
            ccdnum,
            ngaiamatch: 50,
            corners: [
                (ra - half, dec - half),
                (ra + half, dec - half),
                (ra + half, dec + half),
                (ra - half, dec + half),
            ],
            detections,
            write_meas: true,
        }
    }
}

/// Write `<dir>/<base>_meta.parquet`, `<dir>/<base>_chips.parquet` and the chip detection
/// tables. Returns the metadata path.
pub fn write_exposure(
    dir: &Utf8Path,
    base: &str,
    expnum: i64,
    filter: &str,
    dateobs: &str,
    chips: &[ChipFixture],
) -> Utf8PathBuf {
    let meta_path = dir.join(format!("{base}_meta.parquet"));
    let meta = RecordBatch::try_from_iter(vec![
        ("base", strs([base])),
        ("expnum", i64s([expnum])),
        ("ra", f64s([0.0])),
        ("dec", f64s([0.0])),
        ("dateobs", strs([dateobs])),
        ("mjd", f64s([0.0])),
        ("filter", strs([filter])),
        ("exptime", f64s([90.0])),
        ("airmass", f64s([1.2])),
        ("nsources", i64s([chips.iter().map(|c| c.detections.len() as i64).sum()])),
        ("fwhm", f64s([1.1])),
        ("nchips", i64s([chips.len() as i64])),
        ("rarms", f64s([0.02])),
        ("decrms", f64s([0.02])),
        ("ebv", f64s([0.03])),
        ("zpterm", f64s([25.0])),
        ("zptermerr", f64s([0.01])),
    ])
    .unwrap();
    write_batch(&meta_path, &meta);

    let corner = |k: usize, lat: bool| {
        f64s(chips.iter().map(move |c| {
            if lat {
                c.corners[k].1
            } else {
                c.corners[k].0
            }
        }))
    };
    let chip_batch = RecordBatch::try_from_iter(vec![
        ("ccdnum", i64s(chips.iter().map(|c| c.ccdnum))),
        ("nsources", i64s(chips.iter().map(|c| c.detections.len() as i64))),
        ("ngaiamatch", i64s(chips.iter().map(|c| c.ngaiamatch))),
        ("vra1", corner(0, false)),
        ("vra2", corner(1, false)),
        ("vra3", corner(2, false)),
        ("vra4", corner(3, false)),
        ("vdec1", corner(0, true)),
        ("vdec2", corner(1, true)),
        ("vdec3", corner(2, true)),
        ("vdec4", corner(3, true)),
    ])
    .unwrap();
    write_batch(&dir.join(format!("{base}_chips.parquet")), &chip_batch);

    for chip in chips.iter().filter(|c| c.write_meas) {
        let d = &chip.detections;
        let batch = RecordBatch::try_from_iter(vec![
            ("measid", strs(d.iter().map(|x| x.measid.as_str()))),
            ("ra", f64s(d.iter().map(|x| x.ra))),
            ("dec", f64s(d.iter().map(|x| x.dec))),
            ("raerr", f64s(d.iter().map(|x| x.raerr))),
            ("decerr", f64s(d.iter().map(|x| x.decerr))),
            ("mag_auto", f64s(d.iter().map(|x| x.mag_auto))),
            ("magerr_auto", f64s(d.iter().map(|x| x.magerr_auto))),
            ("asemi", f64s(d.iter().map(|x| x.asemi))),
            ("asemierr", f64s(d.iter().map(|x| x.asemierr))),
            ("bsemi", f64s(d.iter().map(|x| x.bsemi))),
            ("bsemierr", f64s(d.iter().map(|x| x.bsemierr))),
            ("theta", f64s(d.iter().map(|x| x.theta))),
            ("thetaerr", f64s(d.iter().map(|x| x.thetaerr))),
            ("fwhm", f64s(d.iter().map(|x| x.fwhm))),
            ("flags", i64s(d.iter().map(|x| x.flags))),
            ("class_star", f64s(d.iter().map(|x| x.class_star))),
        ])
        .unwrap();
        write_batch(
            &dir.join(format!("{base}_{}_meas.parquet", chip.ccdnum)),
            &batch,
        );
    }

    meta_path
}

/// Write a `pix,file` listing.
pub fn write_listing(path: &Utf8Path, rows: &[(u64, &Utf8Path)]) {
    let mut content = String::from("pix,file\n");
    for (pix, file) in rows {
        content.push_str(&format!("{pix},{file}\n"));
    }
    std::fs::write(path, content).unwrap();
}

fn read_batches(path: &Utf8Path) -> Vec<RecordBatch> {
    let file = File::open(path).unwrap();
    ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap()
        .map(|b| b.unwrap())
        .collect()
}

/// All values of a Float64 column of a Parquet file.
pub fn read_f64_column(path: &Utf8Path, name: &str) -> Vec<f64> {
    read_batches(path)
        .iter()
        .flat_map(|b| {
            let arr = b
                .column_by_name(name)
                .unwrap()
                .as_any()
                .downcast_ref::<Float64Array>()
                .unwrap();
            (0..arr.len()).map(|i| arr.value(i)).collect::<Vec<_>>()
        })
        .collect()
}

/// All values of a Utf8 column of a Parquet file.
pub fn read_str_column(path: &Utf8Path, name: &str) -> Vec<String> {
    read_batches(path)
        .iter()
        .flat_map(|b| {
            let arr = b
                .column_by_name(name)
                .unwrap()
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap();
            (0..arr.len())
                .map(|i| arr.value(i).to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// All values of an Int64 column of a Parquet file.
pub fn read_i64_column(path: &Utf8Path, name: &str) -> Vec<i64> {
    read_batches(path)
        .iter()
        .flat_map(|b| {
            let arr = b
                .column_by_name(name)
                .unwrap()
                .as_any()
                .downcast_ref::<Int64Array>()
                .unwrap();
            (0..arr.len()).map(|i| arr.value(i)).collect::<Vec<_>>()
        })
        .collect()
}

/// All values of a UInt64 column of a Parquet file.
pub fn read_u64_column(path: &Utf8Path, name: &str) -> Vec<u64> {
    read_batches(path)
        .iter()
        .flat_map(|b| {
            let arr = b
                .column_by_name(name)
                .unwrap()
                .as_any()
                .downcast_ref::<UInt64Array>()
                .unwrap();
            (0..arr.len()).map(|i| arr.value(i)).collect::<Vec<_>>()
        })
        .collect()
}
