//! # Spatial cross-match
//!
//! Nearest-neighbour association of detections with known objects under a fixed angular
//! tolerance.
//!
//! ## Overview
//! -----------------
//! Object positions are projected on the tangent plane of the pixel and bucketed on a square
//! grid whose cell is twice the match radius. A detection is compared only with the objects of
//! the 3×3 block of cells around its own, and the decision is taken on the exact great-circle
//! separation:
//!
//! ```text
//! matched  ⇔  sep(object, detection) <= radius
//! ```
//!
//! The gnomonic projection never shrinks distances, and near the pixel it stretches them by a
//! negligible amount, so the 3×3 block always contains every object within the radius.
//!
//! ## Determinism
//! -----------------
//! * The nearest object wins; ties go to the lowest object index.
//! * The matcher itself lets two detections claim the same object. [`resolve_claims`] keeps the
//!   closest claim per object (ties to the lowest detection index) and returns the rest.
use ordered_float::OrderedFloat;
use smallvec::SmallVec;

use crate::constants::{Degree, FastHashMap};
use crate::sky::tangent_plane::{angular_separation_deg, TangentPlane};

/// One accepted association.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPair {
    pub object: usize,
    pub detection: usize,
    /// Great-circle separation, degrees.
    pub separation: Degree,
}

type Cell = (i64, i64);

/// Grid index over a fixed set of object positions.
#[derive(Debug, Clone)]
pub struct CrossMatcher<'a> {
    plane: &'a TangentPlane,
    radius: Degree,
    cell_size: f64,
    positions: &'a [(Degree, Degree)],
    grid: FastHashMap<Cell, SmallVec<[usize; 4]>>,
}

impl<'a> CrossMatcher<'a> {
    /// Index `positions` (RA, Dec in degrees) for matching within `radius` degrees.
    pub fn new(
        plane: &'a TangentPlane,
        positions: &'a [(Degree, Degree)],
        radius: Degree,
    ) -> Self {
        let cell_size = 2.0 * radius;
        let mut grid: FastHashMap<Cell, SmallVec<[usize; 4]>> =
            FastHashMap::with_capacity_and_hasher(positions.len(), Default::default());

        for (idx, &(ra, dec)) in positions.iter().enumerate() {
            if let Some(xy) = plane.project(ra, dec) {
                grid.entry(cell_of(xy, cell_size)).or_default().push(idx);
            }
        }

        CrossMatcher {
            plane,
            radius,
            cell_size,
            positions,
            grid,
        }
    }

    /// Nearest indexed object within the radius of (`ra`, `dec`).
    ///
    /// Return
    /// ----------
    /// * `Some((object index, separation in degrees))`, or `None` when nothing lies within the
    ///   radius or the position cannot be projected.
    pub fn nearest(&self, ra: Degree, dec: Degree) -> Option<(usize, Degree)> {
        let (cx, cy) = cell_of(self.plane.project(ra, dec)?, self.cell_size);

        (cx - 1..=cx + 1)
            .flat_map(|x| (cy - 1..=cy + 1).map(move |y| (x, y)))
            .filter_map(|cell| self.grid.get(&cell))
            .flatten()
            .map(|&idx| {
                let (ora, odec) = self.positions[idx];
                (idx, angular_separation_deg(ra, dec, ora, odec))
            })
            .filter(|&(_, sep)| sep <= self.radius)
            .min_by_key(|&(idx, sep)| (OrderedFloat(sep), idx))
    }

    /// Match every detection position against the indexed objects.
    ///
    /// Return
    /// ----------
    /// * One [`MatchPair`] per matched detection, in detection order. Several pairs may share
    ///   the same object.
    pub fn match_all(&self, detections: &[(Degree, Degree)]) -> Vec<MatchPair> {
        detections
            .iter()
            .enumerate()
            .filter_map(|(d, &(ra, dec))| {
                self.nearest(ra, dec).map(|(object, separation)| MatchPair {
                    object,
                    detection: d,
                    separation,
                })
            })
            .collect()
    }
}

#[inline]
fn cell_of((x, y): (f64, f64), cell_size: f64) -> Cell {
    ((x / cell_size).floor() as i64, (y / cell_size).floor() as i64)
}

/// Keep one claim per object, the closest one.
///
/// Return
/// ----------
/// * `(winners, losers)`: winning pairs sorted by detection index, and the detection indices
///   whose claim was dropped, sorted.
pub fn resolve_claims(mut pairs: Vec<MatchPair>) -> (Vec<MatchPair>, Vec<usize>) {
    pairs.sort_by_key(|p| (p.object, OrderedFloat(p.separation), p.detection));

    let mut winners: Vec<MatchPair> = Vec::with_capacity(pairs.len());
    let mut losers = Vec::new();
    for pair in pairs {
        match winners.last() {
            Some(last) if last.object == pair.object => losers.push(pair.detection),
            _ => winners.push(pair),
        }
    }

    winners.sort_by_key(|p| p.detection);
    losers.sort_unstable();
    (winners, losers)
}
