//! # Object combination engine
//!
//! Streaming merge of per-exposure detection catalogs into a catalog of unique objects for one
//! HEALPix pixel.
//!
//! ## Overview
//! -----------------
//! A [`PixelCombiner`] is fed exposures one at a time with [`PixelCombiner::add_exposure`]:
//!
//! 1. detections with unusable astrometry or an already recorded `measid` are skipped,
//! 2. the others are cross-matched against the current mean positions of the known objects
//!    ([`crossmatch`]),
//! 3. when several detections claim the same object, the closest one wins,
//! 4. winners are recorded in the [`ledger`] and folded into their object ([`accumulator`]),
//! 5. every other detection starts a new object in the [`object_store`].
//!
//! Detections are never matched against objects created from the same exposure.
//!
//! [`PixelCombiner::finish`] then reduces the running sums ([`finalize`]), looks up the
//! reddening, keeps the objects whose mean position lies inside the pixel ([`membership`]) and
//! builds the per-exposure [`summary`].
//!
//! ## Example
//! -----------------
//! ```rust
//! use skycombine::band::Band;
//! use skycombine::combine::PixelCombiner;
//! use skycombine::detections::{Detection, ExposureMeta};
//! use skycombine::params::CombineParams;
//! use skycombine::reddening::NoReddening;
//! use skycombine::sky::healpix::{ang2pix_ring, pix_center};
//!
//! let params = CombineParams::default();
//! let pix = ang2pix_ring(params.nside, 150.0, 2.0);
//! let (ra, dec) = pix_center(params.nside, pix);
//!
//! let mut combiner = PixelCombiner::new(pix, params).unwrap();
//! let exp1 = ExposureMeta::new("exp1", 1, Band::G, 57_000.0);
//! let exp2 = ExposureMeta::new("exp2", 2, Band::G, 57_010.0);
//! combiner.add_exposure(&exp1, &[Detection::new("a1", ra, dec, 0.05, 18.0, 0.02)]);
//! let outcome = combiner.add_exposure(&exp2, &[Detection::new("a2", ra, dec, 0.05, 18.1, 0.02)]);
//! assert_eq!(outcome.matched, 1);
//!
//! let catalog = combiner.finish(&NoReddening).unwrap();
//! assert_eq!(catalog.objects.len(), 1);
//! assert_eq!(catalog.objects[0].ndet, 2);
//! ```
pub mod accumulator;
pub mod crossmatch;
pub mod finalize;
pub mod ledger;
pub mod membership;
pub mod object_store;
pub mod summary;

use std::fmt;

use tracing::{debug, info, warn};

use crate::combine::crossmatch::{resolve_claims, CrossMatcher};
use crate::combine::finalize::{finalize, CombinedObject};
use crate::combine::ledger::{ProvenanceEntry, ProvenanceLedger};
use crate::combine::membership::filter_members;
use crate::combine::object_store::ObjectStore;
use crate::combine::summary::{summarize, ExposureSummary};
use crate::combine_errors::CombineError;
use crate::constants::{FastHashSet, PixelIndex};
use crate::detections::{Detection, ExposureMeta};
use crate::params::CombineParams;
use crate::reddening::ReddeningMap;
use crate::sky::healpix::{check_pixel, pix_center};
use crate::sky::tangent_plane::TangentPlane;

/// What happened to the detections of one exposure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExposureOutcome {
    /// Folded into an existing object.
    pub matched: usize,
    /// Started a new object.
    pub created: usize,
    /// Rejected: bad astrometry or duplicate `measid`.
    pub skipped: usize,
}

impl ExposureOutcome {
    pub fn used(&self) -> usize {
        self.matched + self.created
    }
}

impl fmt::Display for ExposureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matched, {} new, {} skipped",
            self.matched, self.created, self.skipped
        )
    }
}

/// Result of a combined pixel.
#[derive(Debug, Clone)]
pub struct CombinedCatalog {
    pub pix: PixelIndex,
    /// Objects whose mean position lies in the pixel.
    pub objects: Vec<CombinedObject>,
    /// One entry per detection folded into a retained object.
    pub ledger: Vec<ProvenanceEntry>,
    pub summary: Vec<ExposureSummary>,
}

/// Streaming combination of exposures overlapping one pixel.
#[derive(Debug)]
pub struct PixelCombiner {
    pix: PixelIndex,
    params: CombineParams,
    plane: TangentPlane,
    store: ObjectStore,
    ledger: ProvenanceLedger,
    exposures: Vec<ExposureMeta>,
}

impl PixelCombiner {
    /// Start the combination of pixel `pix`.
    ///
    /// Return
    /// ----------
    /// * [`CombineError::InvalidPixel`] if `pix` does not exist at `params.nside`.
    pub fn new(pix: PixelIndex, params: CombineParams) -> Result<Self, CombineError> {
        check_pixel(params.nside, pix)?;
        let (cra, cdec) = pix_center(params.nside, pix);

        Ok(PixelCombiner {
            pix,
            plane: TangentPlane::new(cra, cdec),
            store: ObjectStore::new(pix, params.initial_capacity, params.growth_increment),
            ledger: ProvenanceLedger::with_capacity(params.ledger_initial_capacity),
            exposures: Vec::new(),
            params,
        })
    }

    pub fn pix(&self) -> PixelIndex {
        self.pix
    }

    pub fn params(&self) -> &CombineParams {
        &self.params
    }

    /// Number of objects accumulated so far, inside or outside the pixel.
    pub fn nobjects(&self) -> usize {
        self.store.len()
    }

    /// Number of detections folded so far.
    pub fn ndetections(&self) -> usize {
        self.ledger.len()
    }

    /// Fold the detections of one exposure.
    ///
    /// Arguments
    /// -----------------
    /// * `meta`: exposure metadata (band and epoch of every detection).
    /// * `detections`: the detections of the exposure, already restricted to the footprint.
    ///
    /// Return
    /// ----------
    /// * The counts of matched, created and skipped detections.
    pub fn add_exposure(&mut self, meta: &ExposureMeta, detections: &[Detection]) -> ExposureOutcome {
        let mut outcome = ExposureOutcome::default();

        let mut batch_ids: FastHashSet<&str> = FastHashSet::default();
        let usable: Vec<&Detection> = detections
            .iter()
            .filter(|det| {
                if !det.has_valid_astrometry() {
                    warn!(
                        measid = %det.measid,
                        exposure = %meta.base,
                        raerr = det.raerr,
                        decerr = det.decerr,
                        "skipping detection with unusable astrometry"
                    );
                    outcome.skipped += 1;
                    return false;
                }
                if self.ledger.contains(&det.measid) || !batch_ids.insert(det.measid.as_str()) {
                    warn!(measid = %det.measid, exposure = %meta.base, "duplicate detection skipped");
                    outcome.skipped += 1;
                    return false;
                }
                true
            })
            .collect();

        let positions = self.store.positions();
        let det_positions: Vec<(f64, f64)> = usable.iter().map(|d| (d.ra, d.dec)).collect();
        let pairs = CrossMatcher::new(&self.plane, &positions, self.params.match_radius_deg())
            .match_all(&det_positions);
        let (winners, _) = resolve_claims(pairs);

        let mut assigned: Vec<Option<usize>> = vec![None; usable.len()];
        for pair in &winners {
            assigned[pair.detection] = Some(pair.object);
        }

        let mag_limit = self.params.mag_valid_limit;
        for (det, target) in usable.into_iter().zip(assigned) {
            let (object_index, is_new) = match target {
                Some(idx) => (idx, false),
                None => (self.store.create(det, meta, mag_limit), true),
            };

            let object_id = match self.store.get(object_index) {
                Some(obj) => obj.id.clone(),
                None => continue,
            };

            let entry = ProvenanceEntry {
                measid: det.measid.clone(),
                exposure: meta.base.clone(),
                expnum: meta.expnum,
                object_id,
                object_index,
            };
            if let Err(err) = self.ledger.record(entry) {
                warn!(%err, "detection not folded");
                outcome.skipped += 1;
                continue;
            }

            if is_new {
                outcome.created += 1;
            } else if let Some(obj) = self.store.get_mut(object_index) {
                obj.fold(det, meta, mag_limit);
                outcome.matched += 1;
            }
        }

        debug!(
            pix = self.pix,
            exposure = %meta.base,
            matched = outcome.matched,
            created = outcome.created,
            skipped = outcome.skipped,
            nobjects = self.store.len(),
            "exposure folded"
        );

        // a replayed exposure keeps its first summary slot
        if !self.exposures.iter().any(|e| e.expnum == meta.expnum) {
            self.exposures.push(meta.clone());
        }
        outcome
    }

    /// Reduce, filter and summarize.
    ///
    /// Arguments
    /// -----------------
    /// * `reddening`: dust map queried once per finalized object.
    ///
    /// Return
    /// ----------
    /// * The [`CombinedCatalog`], or [`CombineError::EmptyResult`] when no object was
    ///   accumulated or none lies inside the pixel.
    pub fn finish<R: ReddeningMap + ?Sized>(
        self,
        reddening: &R,
    ) -> Result<CombinedCatalog, CombineError> {
        let PixelCombiner {
            pix,
            params,
            store,
            mut ledger,
            exposures,
            ..
        } = self;

        if store.is_empty() {
            return Err(CombineError::EmptyResult(format!(
                "no objects were accumulated for pixel {pix}"
            )));
        }

        let accums = store.trim();
        info!(pix, nobjects = accums.len(), "finalizing objects");

        let objects: Vec<CombinedObject> = accums
            .iter()
            .map(|acc| {
                let mut obj = finalize(acc, params.min_time_variance);
                obj.ebv = reddening.ebv(obj.ra, obj.dec);
                obj
            })
            .collect();

        let objects = filter_members(objects, &mut ledger, params.nside, pix);
        if objects.is_empty() {
            return Err(CombineError::EmptyResult(format!(
                "none of the final objects fall inside pixel {pix}"
            )));
        }
        info!(pix, nobjects = objects.len(), "objects inside the pixel");

        let summary = summarize(&exposures, &ledger, pix);

        Ok(CombinedCatalog {
            pix,
            objects,
            ledger: ledger.into_entries(),
            summary,
        })
    }
}
