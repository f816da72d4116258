//! Pixel membership of the final objects.
//!
//! The buffer zone lets objects near the edge collect all their detections, but an object
//! belongs to the pixel only if its *final* mean position does. Objects whose recomputed RING
//! pixel differs from the target are dropped here, together with their ledger entries, and the
//! surviving ledger entries are renumbered to the compacted object list.
use tracing::debug;

use crate::combine::finalize::CombinedObject;
use crate::combine::ledger::ProvenanceLedger;
use crate::constants::PixelIndex;
use crate::sky::healpix::ang2pix_ring;

/// Keep the objects whose mean position falls in `pix` and re-index the ledger.
///
/// Arguments
/// -----------------
/// * `objects`: finalized objects, indexed as in the ledger.
/// * `ledger`: provenance of every detection, updated in place.
/// * `nside`: HEALPix resolution.
/// * `pix`: target RING pixel.
///
/// Return
/// ----------
/// * The retained objects, in their original relative order.
pub fn filter_members(
    objects: Vec<CombinedObject>,
    ledger: &mut ProvenanceLedger,
    nside: u64,
    pix: PixelIndex,
) -> Vec<CombinedObject> {
    let before = objects.len();
    let mut new_index: Vec<Option<usize>> = Vec::with_capacity(before);
    let mut kept = Vec::with_capacity(before);

    for obj in objects {
        if ang2pix_ring(nside, obj.ra, obj.dec) == pix {
            new_index.push(Some(kept.len()));
            kept.push(obj);
        } else {
            new_index.push(None);
        }
    }

    ledger.reindex(&new_index);
    debug!(pix, before, after = kept.len(), "membership filter applied");
    kept
}

#[cfg(test)]
mod membership_test {
    use super::*;
    use crate::band::Band;
    use crate::combine::accumulator::ObjectAccum;
    use crate::combine::finalize::finalize;
    use crate::combine::ledger::ProvenanceEntry;
    use crate::detections::{Detection, ExposureMeta};
    use crate::sky::healpix::pix_center;

    fn object_at(id: &str, ra: f64, dec: f64) -> CombinedObject {
        let det = Detection::new(id, ra, dec, 0.1, 18.0, 0.1);
        let exp = ExposureMeta::new("e", 1, Band::G, 57_000.0);
        let mut acc = ObjectAccum::new(id.into(), &det, &exp);
        acc.fold(&det, &exp, 50.0);
        finalize(&acc, 1e-10)
    }

    #[test]
    fn test_filter_members() {
        let nside = 32;
        let (cra, cdec) = pix_center(nside, 5000);
        let target = ang2pix_ring(nside, cra, cdec);

        let objects = vec![
            object_at("a", cra, cdec),
            object_at("b", cra, cdec + 20.0),
            object_at("c", cra, cdec + 1e-4),
        ];
        let mut ledger = ProvenanceLedger::with_capacity(3);
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            ledger
                .record(ProvenanceEntry {
                    measid: id.to_string(),
                    exposure: "e".into(),
                    expnum: 1,
                    object_id: id.to_string(),
                    object_index: i,
                })
                .unwrap();
        }

        let kept = filter_members(objects, &mut ledger, nside, target);
        assert_eq!(kept.len(), 2);
        for obj in &kept {
            assert_eq!(ang2pix_ring(nside, obj.ra, obj.dec), target);
        }
        let remap: Vec<(String, usize)> = ledger
            .iter()
            .map(|e| (e.measid.clone(), e.object_index))
            .collect();
        assert_eq!(remap, vec![("a".to_string(), 0), ("c".to_string(), 1)]);
    }
}
