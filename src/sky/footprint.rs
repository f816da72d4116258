//! # Pixel footprint: boundary plus buffer zone
//!
//! A [`PixelFootprint`] is the region inside which detections are collected for one HEALPix
//! pixel. It is the pixel boundary, sampled and projected onto the plane tangent at the pixel
//! centre, then scaled outward so that it extends roughly `buffer_arcsec` beyond the exact
//! boundary.
//!
//! ## Why a buffer
//! -----------------
//! Objects straddling the pixel edge must see all of their detections, including those that
//! fall just outside the pixel; otherwise their mean position would be biased towards the
//! inside. The buffer only widens the *collection* area. Membership is decided later from the
//! final mean position (see [`crate::combine::membership`]).
//!
//! ## Expansion rule
//! -----------------
//! With `r_i` the distance of each boundary vertex to the centre in the tangent plane, every
//! vertex is scaled by
//!
//! ```text
//! frac = 1 + buffer_expansion · max_i(buffer / r_i)
//! ```
//!
//! This is not an exact offset curve, but it always contains one.

use crate::combine_errors::CombineError;
use crate::constants::{Degree, PixelIndex};
use crate::params::CombineParams;
use crate::sky::healpix::{check_pixel, pix_boundaries, pix_center};
use crate::sky::tangent_plane::TangentPlane;

/// Closed polygon in tangent-plane coordinates (degrees). The last vertex connects to the first.
pub type PlanePolygon = Vec<(f64, f64)>;

/// Boundary and buffered boundary of one HEALPix pixel.
#[derive(Debug, Clone)]
pub struct PixelFootprint {
    pix: PixelIndex,
    nside: u64,
    plane: TangentPlane,
    boundary: PlanePolygon,
    buffered: PlanePolygon,
}

impl PixelFootprint {
    /// Build the footprint of `pix` at the resolution and buffer set in `params`.
    ///
    /// Arguments
    /// -----------------
    /// * `params`: combination parameters (`nside`, `boundary_step`, `buffer_arcsec`,
    ///   `buffer_expansion`).
    /// * `pix`: RING pixel index.
    ///
    /// Return
    /// ----------
    /// * The footprint, or [`CombineError::InvalidPixel`] if `pix` does not exist.
    pub fn new(params: &CombineParams, pix: PixelIndex) -> Result<Self, CombineError> {
        check_pixel(params.nside, pix)?;

        let (cra, cdec) = pix_center(params.nside, pix);
        let plane = TangentPlane::new(cra, cdec);

        let boundary: PlanePolygon = pix_boundaries(params.nside, pix, params.boundary_step)
            .into_iter()
            .filter_map(|(ra, dec)| plane.project(ra, dec))
            .collect();

        let buffer_deg = params.buffer_arcsec / 3600.0;
        let max_ratio = boundary
            .iter()
            .map(|(x, y)| x.hypot(*y))
            .filter(|r| *r > 0.0)
            .map(|r| buffer_deg / r)
            .fold(0.0_f64, f64::max);
        let frac = 1.0 + params.buffer_expansion * max_ratio;

        let buffered = boundary.iter().map(|(x, y)| (x * frac, y * frac)).collect();

        Ok(PixelFootprint {
            pix,
            nside: params.nside,
            plane,
            boundary,
            buffered,
        })
    }

    pub fn pix(&self) -> PixelIndex {
        self.pix
    }

    pub fn nside(&self) -> u64 {
        self.nside
    }

    /// Projection centred on the pixel, shared with the cross-matcher.
    pub fn plane(&self) -> &TangentPlane {
        &self.plane
    }

    /// Centre of the pixel, in degrees.
    pub fn center(&self) -> (Degree, Degree) {
        self.plane.center()
    }

    /// Exact pixel boundary in the tangent plane.
    pub fn boundary(&self) -> &PlanePolygon {
        &self.boundary
    }

    /// Buffered boundary in the tangent plane.
    pub fn buffered(&self) -> &PlanePolygon {
        &self.buffered
    }

    /// Buffered boundary converted back to (RA, Dec).
    pub fn buffered_radec(&self) -> Vec<(Degree, Degree)> {
        self.buffered
            .iter()
            .map(|(xi, eta)| self.plane.deproject(*xi, *eta))
            .collect()
    }

    /// Is the position inside the buffered footprint?
    pub fn contains(&self, ra: Degree, dec: Degree) -> bool {
        match self.plane.project(ra, dec) {
            Some((x, y)) => point_in_polygon(x, y, &self.buffered),
            None => false,
        }
    }

    /// Does the polygon with the given (RA, Dec) vertices overlap the buffered footprint?
    ///
    /// Vertices are projected on the pixel tangent plane, so chips crossing RA = 0 need no
    /// special treatment. Vertices on the far hemisphere are ignored.
    pub fn overlaps(&self, ra: &[Degree], dec: &[Degree]) -> bool {
        let polygon: PlanePolygon = ra
            .iter()
            .zip(dec)
            .filter_map(|(r, d)| self.plane.project(*r, *d))
            .collect();
        if polygon.is_empty() {
            return false;
        }
        polygons_overlap(&self.buffered, &polygon)
    }
}

/// Even-odd ray casting test.
pub fn point_in_polygon(x: f64, y: f64, polygon: &[(f64, f64)]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn orientation(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn on_segment(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
    r.0 <= p.0.max(q.0) && r.0 >= p.0.min(q.0) && r.1 <= p.1.max(q.1) && r.1 >= p.1.min(q.1)
}

fn segments_intersect(p1: (f64, f64), p2: (f64, f64), q1: (f64, f64), q2: (f64, f64)) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// Two polygons overlap when a vertex of one lies inside the other or two edges cross.
pub fn polygons_overlap(a: &[(f64, f64)], b: &[(f64, f64)]) -> bool {
    if a.iter().any(|&(x, y)| point_in_polygon(x, y, b))
        || b.iter().any(|&(x, y)| point_in_polygon(x, y, a))
    {
        return true;
    }

    let edges = |poly: &[(f64, f64)]| {
        let n = poly.len();
        (0..n)
            .map(|i| (poly[i], poly[(i + 1) % n]))
            .collect::<Vec<_>>()
    };
    let (ea, eb) = (edges(a), edges(b));
    ea.iter()
        .any(|&(p1, p2)| eb.iter().any(|&(q1, q2)| segments_intersect(p1, p2, q1, q2)))
}
