//! HEALPix RING-scheme utilities.
//!
//! Conversions between sky coordinates and RING pixel indices, plus the per-pixel geometry
//! needed to build a pixel footprint: face coordinates, centre, sampled boundary and
//! neighbouring pixels.
//!
//! Pixel geometry follows Górski et al. (2005). Internally a pixel is described by its base
//! face (0..12) and integer position `(ix, iy)` inside that face; continuous positions inside a
//! face (`x, y ∈ [0, 1]`) are mapped back to the sphere with [`xyf_to_radec`].

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::combine_errors::CombineError;
use crate::constants::{Degree, PixelIndex, RADEG};
use crate::sky::tangent_plane::TangentPlane;

/// Ring index (in units of nside) of the southernmost corner of each base face.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// Longitude index (in units of π/4) of the southernmost corner of each base face.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Number of pixels on the sphere at resolution `nside`.
#[inline]
pub fn npix(nside: u64) -> u64 {
    12 * nside * nside
}

/// Check that `pix` exists at resolution `nside`.
pub fn check_pixel(nside: u64, pix: PixelIndex) -> Result<(), CombineError> {
    if nside == 0 || pix >= npix(nside) {
        return Err(CombineError::InvalidPixel { pix, nside });
    }
    Ok(())
}

fn isqrt(v: i64) -> i64 {
    let mut r = (v as f64).sqrt() as i64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

/// Convert (RA, Dec) in degrees to a RING-scheme pixel index.
///
/// Arguments
/// -----------------
/// * `nside`: HEALPix resolution parameter.
/// * `ra`: right ascension in degrees (any value, wrapped to `[0, 360)`).
/// * `dec`: declination in degrees, in `[-90, 90]`.
///
/// Return
/// ----------
/// * The RING pixel index in `[0, 12·nside²)`.
pub fn ang2pix_ring(nside: u64, ra: Degree, dec: Degree) -> PixelIndex {
    let n = nside as i64;
    let npix = 12 * n * n;
    let ncap = 2 * n * (n - 1);

    let dec_rad = dec * RADEG;
    let z = dec_rad.sin();
    let za = z.abs();

    let phi = (ra * RADEG).rem_euclid(std::f64::consts::TAU);
    let mut tt = (phi / FRAC_PI_2).rem_euclid(4.0);
    if tt >= 4.0 {
        tt = 0.0;
    }

    if za <= 2.0 / 3.0 {
        // Equatorial belt
        let nl4 = 4 * n;
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        let jp = (temp1 - temp2) as i64; // ascending edge line
        let jm = (temp1 + temp2) as i64; // descending edge line

        let ir = n + 1 + jp - jm; // ring counted from z = 2/3, in [1, 2n+1]
        let kshift = 1 - (ir & 1);

        let t1 = jp + jm - n + kshift + 1 + nl4 + nl4;
        let ip = (t1 >> 1) % nl4;

        (ncap + (ir - 1) * nl4 + ip) as PixelIndex
    } else {
        // Polar caps; sqrt(3(1 - |z|)) written with cos(dec) to stay accurate near the poles
        let tp = tt - tt.floor();
        let tmp = nside as f64 * dec_rad.cos() * (3.0 / (1.0 + za)).sqrt();

        let jp = (tp * tmp) as i64;
        let jm = ((1.0 - tp) * tmp) as i64;

        let ir = jp + jm + 1; // ring counted from the closest pole
        let ip = ((tt * ir as f64) as i64).min(4 * ir - 1);

        let pix = if z > 0.0 {
            2 * ir * (ir - 1) + ip
        } else {
            npix - 2 * ir * (ir + 1) + ip
        };
        pix as PixelIndex
    }
}

/// Decompose a RING pixel into its base face and integer face coordinates.
///
/// Return
/// ----------
/// * `(ix, iy, face)` with `ix, iy ∈ [0, nside)` and `face ∈ [0, 12)`.
pub fn pix2xyf_ring(nside: u64, pix: PixelIndex) -> (i64, i64, usize) {
    let n = nside as i64;
    let npix = 12 * n * n;
    let ncap = 2 * n * (n - 1);
    let nl2 = 2 * n;
    let pix = pix as i64;

    let (iring, iphi, kshift, nr, face) = if pix < ncap {
        // North polar cap
        let iring = (1 + isqrt(1 + 2 * pix)) >> 1;
        let iphi = (pix + 1) - 2 * iring * (iring - 1);
        let face = (iphi - 1) / iring;
        (iring, iphi, 0, iring, face)
    } else if pix < npix - ncap {
        // Equatorial region
        let ip = pix - ncap;
        let tmp = ip / (4 * n);
        let iring = tmp + n;
        let iphi = ip - tmp * 4 * n + 1;
        let kshift = (iring + n) & 1;
        let ire = tmp + 1;
        let irm = nl2 + 1 - tmp;
        let ifm = (iphi - (ire >> 1) + n - 1) / n;
        let ifp = (iphi - (irm >> 1) + n - 1) / n;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        (iring, iphi, kshift, n, face)
    } else {
        // South polar cap
        let ip = npix - pix;
        let iring = (1 + isqrt(2 * ip - 1)) >> 1;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        let face = (iphi - 1) / iring + 8;
        (2 * nl2 - iring, iphi, 0, iring, face)
    };

    let f = face as usize;
    let irt = iring - (JRLL[f] * n) + 1;
    let mut ipt = 2 * iphi - JPLL[f] * nr - kshift - 1;
    if ipt >= nl2 {
        ipt -= 8 * n;
    }

    let ix = (ipt - irt) >> 1;
    let iy = (-ipt - irt) >> 1;
    (ix, iy, f)
}

/// Map a continuous position inside a base face to (RA, Dec) in degrees.
///
/// Arguments
/// -----------------
/// * `x`, `y`: coordinates inside the face, `[0, 1]` spans the face.
/// * `face`: base face index in `[0, 12)`.
pub fn xyf_to_radec(x: f64, y: f64, face: usize) -> (Degree, Degree) {
    let jr = JRLL[face] as f64 - x - y;

    let (nr, z, sth) = if jr < 1.0 {
        let nr = jr;
        let tmp = nr * nr / 3.0;
        (nr, 1.0 - tmp, (tmp * (2.0 - tmp)).sqrt())
    } else if jr > 3.0 {
        let nr = 4.0 - jr;
        let tmp = nr * nr / 3.0;
        (nr, tmp - 1.0, (tmp * (2.0 - tmp)).sqrt())
    } else {
        let z = (2.0 - jr) * 2.0 / 3.0;
        (1.0, z, (1.0 - z * z).sqrt())
    };

    let mut tmp = JPLL[face] as f64 * nr + x - y;
    if tmp < 0.0 {
        tmp += 8.0;
    }
    if tmp >= 8.0 {
        tmp -= 8.0;
    }
    let phi = if nr < 1e-15 {
        0.0
    } else {
        FRAC_PI_4 * tmp / nr
    };

    let ra = phi.to_degrees().rem_euclid(360.0);
    let dec = z.atan2(sth).to_degrees();
    (ra, dec)
}

/// Centre of a RING pixel, as (RA, Dec) in degrees.
pub fn pix_center(nside: u64, pix: PixelIndex) -> (Degree, Degree) {
    let (ix, iy, face) = pix2xyf_ring(nside, pix);
    let n = nside as f64;
    xyf_to_radec((ix as f64 + 0.5) / n, (iy as f64 + 0.5) / n, face)
}

/// Sample the boundary of a RING pixel.
///
/// The four edges are walked counter-clockwise starting from the northern corner, with `step`
/// points per edge, giving `4·step` vertices.
///
/// Arguments
/// -----------------
/// * `nside`: HEALPix resolution parameter.
/// * `pix`: RING pixel index.
/// * `step`: number of samples per edge (`>= 1`).
///
/// Return
/// ----------
/// * The boundary vertices as (RA, Dec) pairs in degrees.
pub fn pix_boundaries(nside: u64, pix: PixelIndex, step: usize) -> Vec<(Degree, Degree)> {
    let (ix, iy, face) = pix2xyf_ring(nside, pix);
    let n = nside as f64;
    let dc = 0.5 / n;
    let xc = (ix as f64 + 0.5) / n;
    let yc = (iy as f64 + 0.5) / n;
    let d = 1.0 / (step as f64 * n);

    let mut out = vec![(0.0, 0.0); 4 * step];
    for i in 0..step {
        let fi = i as f64;
        out[i] = xyf_to_radec(xc + dc - fi * d, yc + dc, face);
        out[i + step] = xyf_to_radec(xc - dc, yc + dc - fi * d, face);
        out[i + 2 * step] = xyf_to_radec(xc - dc + fi * d, yc - dc, face);
        out[i + 3 * step] = xyf_to_radec(xc + dc, yc - dc + fi * d, face);
    }
    out
}

/// Pixels sharing an edge or a corner with `pix`.
///
/// The boundary is sampled, pushed outward by a quarter of its distance to the pixel centre
/// in the tangent plane, and every pixel hit by those probes is collected.
///
/// Return
/// ----------
/// * The sorted, deduplicated neighbour indices (never containing `pix` itself).
pub fn neighbours(nside: u64, pix: PixelIndex) -> Vec<PixelIndex> {
    let (cra, cdec) = pix_center(nside, pix);
    let plane = TangentPlane::new(cra, cdec);

    let mut found: Vec<PixelIndex> = pix_boundaries(nside, pix, 16)
        .into_iter()
        .filter_map(|(ra, dec)| plane.project(ra, dec))
        .map(|(xi, eta)| plane.deproject(xi * 1.25, eta * 1.25))
        .map(|(ra, dec)| ang2pix_ring(nside, ra, dec))
        .filter(|&p| p != pix)
        .collect();

    found.sort_unstable();
    found.dedup();
    found
}
