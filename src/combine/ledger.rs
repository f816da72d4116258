//! # Provenance ledger
//!
//! One [`ProvenanceEntry`] per folded detection, recording which object absorbed it. The
//! ledger is append-only while exposures are processed and refuses a `measid` it has already
//! seen, which is what makes folding exactly-once: the combiner records the detection *before*
//! folding it and skips it on [`CombineError::DuplicateDetection`].
//!
//! After the membership filter drops objects, [`ProvenanceLedger::reindex`] removes the entries
//! of dropped objects and remaps the surviving object indices.
use std::collections::BTreeMap;

use crate::combine_errors::CombineError;
use crate::constants::FastHashSet;

/// Which object one detection was folded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceEntry {
    pub measid: String,
    /// Exposure name (`base`).
    pub exposure: String,
    pub expnum: i64,
    pub object_id: String,
    /// Index of the object in the object list it belongs to.
    pub object_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceLedger {
    entries: Vec<ProvenanceEntry>,
    seen: FastHashSet<String>,
}

impl ProvenanceLedger {
    pub fn with_capacity(capacity: usize) -> Self {
        ProvenanceLedger {
            entries: Vec::with_capacity(capacity),
            seen: FastHashSet::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Has this measurement already been recorded?
    pub fn contains(&self, measid: &str) -> bool {
        self.seen.contains(measid)
    }

    /// Append an entry.
    ///
    /// Return
    /// ----------
    /// * [`CombineError::DuplicateDetection`] if `entry.measid` was already recorded; the ledger
    ///   is left unchanged.
    pub fn record(&mut self, entry: ProvenanceEntry) -> Result<(), CombineError> {
        if !self.seen.insert(entry.measid.clone()) {
            return Err(CombineError::DuplicateDetection(entry.measid));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProvenanceEntry> {
        self.entries.iter()
    }

    /// Entries folded into the object at `object_index`.
    pub fn for_object(&self, object_index: usize) -> impl Iterator<Item = &ProvenanceEntry> {
        self.entries
            .iter()
            .filter(move |e| e.object_index == object_index)
    }

    /// Number of entries per object index.
    pub fn counts_per_object(&self, nobjects: usize) -> Vec<u32> {
        let mut counts = vec![0_u32; nobjects];
        for e in &self.entries {
            if let Some(c) = counts.get_mut(e.object_index) {
                *c += 1;
            }
        }
        counts
    }

    /// Number of distinct objects each exposure contributed to, keyed by `expnum`.
    pub fn objects_per_exposure(&self) -> BTreeMap<i64, usize> {
        let mut per_exp: BTreeMap<i64, FastHashSet<usize>> = BTreeMap::new();
        for e in &self.entries {
            per_exp.entry(e.expnum).or_default().insert(e.object_index);
        }
        per_exp.into_iter().map(|(k, v)| (k, v.len())).collect()
    }

    /// Drop entries of removed objects and renumber the others.
    ///
    /// Arguments
    /// -----------------
    /// * `new_index`: lookup over the pre-filter index range; `None` marks a dropped object.
    pub fn reindex(&mut self, new_index: &[Option<usize>]) {
        self.entries.retain_mut(|e| {
            match new_index.get(e.object_index).copied().flatten() {
                Some(idx) => {
                    e.object_index = idx;
                    true
                }
                None => false,
            }
        });
        self.seen = self.entries.iter().map(|e| e.measid.clone()).collect();
    }

    pub fn into_entries(self) -> Vec<ProvenanceEntry> {
        self.entries
    }
}

#[cfg(test)]
mod ledger_test {
    use super::*;

    fn entry(measid: &str, expnum: i64, object_index: usize) -> ProvenanceEntry {
        ProvenanceEntry {
            measid: measid.to_string(),
            exposure: format!("exp{expnum}"),
            expnum,
            object_id: format!("7.{}", object_index + 1),
            object_index,
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut ledger = ProvenanceLedger::with_capacity(4);
        ledger.record(entry("a", 1, 0)).unwrap();
        let err = ledger.record(entry("a", 2, 1)).unwrap_err();
        assert_eq!(err, CombineError::DuplicateDetection("a".into()));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("a"));
    }

    #[test]
    fn test_counts() {
        let mut ledger = ProvenanceLedger::with_capacity(4);
        ledger.record(entry("a", 1, 0)).unwrap();
        ledger.record(entry("b", 1, 1)).unwrap();
        ledger.record(entry("c", 2, 0)).unwrap();

        assert_eq!(ledger.counts_per_object(3), vec![2, 1, 0]);
        let per_exp = ledger.objects_per_exposure();
        assert_eq!(per_exp[&1], 2);
        assert_eq!(per_exp[&2], 1);
        assert_eq!(ledger.for_object(0).count(), 2);
    }

    #[test]
    fn test_reindex() {
        let mut ledger = ProvenanceLedger::with_capacity(4);
        ledger.record(entry("a", 1, 0)).unwrap();
        ledger.record(entry("b", 1, 1)).unwrap();
        ledger.record(entry("c", 2, 2)).unwrap();
        ledger.record(entry("d", 2, 1)).unwrap();

        // object 1 dropped, 0 -> 0, 2 -> 1
        ledger.reindex(&[Some(0), None, Some(1)]);

        let kept: Vec<(&str, usize)> = ledger
            .iter()
            .map(|e| (e.measid.as_str(), e.object_index))
            .collect();
        assert_eq!(kept, vec![("a", 0), ("c", 1)]);
        assert!(!ledger.contains("b"));
    }
}
