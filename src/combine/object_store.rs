//! Growable storage of object accumulators.
//!
//! Capacity grows in large fixed increments (`growth_increment`) rather than by doubling, so
//! that memory use stays close to the object count on dense pixels. The store never shrinks
//! during accumulation; [`ObjectStore::trim`] releases the slack once, at the end.
//!
//! Identifiers are `"<pix>.<seq>"` with `seq` a per-pixel counter starting at 1. A sequence
//! number is never reused, even if the object is later dropped by the membership filter.
use crate::combine::accumulator::ObjectAccum;
use crate::constants::PixelIndex;
use crate::detections::{Detection, ExposureMeta};

#[derive(Debug, Clone)]
pub struct ObjectStore {
    pix: PixelIndex,
    objects: Vec<ObjectAccum>,
    growth_increment: usize,
    next_seq: u64,
}

impl ObjectStore {
    pub fn new(pix: PixelIndex, initial_capacity: usize, growth_increment: usize) -> Self {
        ObjectStore {
            pix,
            objects: Vec::with_capacity(initial_capacity),
            growth_increment: growth_increment.max(1),
            next_seq: 1,
        }
    }

    /// Create an object from its first detection and fold it in.
    ///
    /// Return
    /// ----------
    /// * The index of the new object in the store.
    pub fn create(
        &mut self,
        det: &Detection,
        exposure: &ExposureMeta,
        mag_valid_limit: f64,
    ) -> usize {
        if self.objects.len() == self.objects.capacity() {
            self.objects.reserve_exact(self.growth_increment);
        }

        let id = format!("{}.{}", self.pix, self.next_seq);
        self.next_seq += 1;

        let mut acc = ObjectAccum::new(id, det, exposure);
        acc.fold(det, exposure, mag_valid_limit);
        self.objects.push(acc);
        self.objects.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&ObjectAccum> {
        self.objects.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ObjectAccum> {
        self.objects.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.objects.capacity()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObjectAccum> {
        self.objects.iter()
    }

    /// Current mean positions of all objects, in store order.
    pub fn positions(&self) -> Vec<(f64, f64)> {
        self.objects.iter().map(ObjectAccum::mean_position).collect()
    }

    /// Release the unused capacity and hand the accumulators over.
    pub fn trim(mut self) -> Vec<ObjectAccum> {
        self.objects.shrink_to_fit();
        self.objects
    }
}
