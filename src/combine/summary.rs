//! Per-exposure summary of a combined pixel.
use std::fmt;

use crate::combine::ledger::ProvenanceLedger;
use crate::constants::PixelIndex;
use crate::detections::ExposureMeta;

/// Metadata of one exposure that contributed to the final catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureSummary {
    pub meta: ExposureMeta,
    /// Number of retained objects this exposure contributed a detection to.
    pub nobjects: usize,
    pub healpix: PixelIndex,
}

impl fmt::Display for ExposureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (expnum {}, {}, mjd {:.5}): {} objects",
            self.meta.base, self.meta.expnum, self.meta.band, self.meta.mjd, self.nobjects
        )
    }
}

/// One row per exposure still referenced by the ledger, in processing order.
pub fn summarize(
    exposures: &[ExposureMeta],
    ledger: &ProvenanceLedger,
    pix: PixelIndex,
) -> Vec<ExposureSummary> {
    let counts = ledger.objects_per_exposure();
    exposures
        .iter()
        .filter_map(|meta| {
            counts.get(&meta.expnum).map(|&nobjects| ExposureSummary {
                meta: meta.clone(),
                nobjects,
                healpix: pix,
            })
        })
        .collect()
}
