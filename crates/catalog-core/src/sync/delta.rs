//! Collapse a delta batch to one write per id.

use crate::models::{CatalogRecord, DeltaRecord, RecordId};
use std::collections::HashSet;

/// Final per-id effect of a batch, split by write kind.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CoalescedDeltas {
    pub upserts: Vec<CatalogRecord>,
    pub retires: Vec<RecordId>,
}

impl CoalescedDeltas {
    pub fn len(&self) -> usize {
        self.upserts.len() + self.retires.len()
    }
}

/// Keep only the last occurrence of each id, preserving batch order.
///
/// Applying the result in any order gives the same store state as applying
/// the raw batch entry by entry.
pub(crate) fn coalesce(deltas: Vec<DeltaRecord>) -> CoalescedDeltas {
    let mut seen = HashSet::with_capacity(deltas.len());
    let mut latest: Vec<DeltaRecord> = deltas
        .into_iter()
        .rev()
        .filter(|delta| seen.insert(delta.id().clone()))
        .collect();
    latest.reverse();

    let mut out = CoalescedDeltas::default();
    for delta in latest {
        match delta {
            DeltaRecord::Upsert(record) => out.upserts.push(record),
            DeltaRecord::Retire { id } => out.retires.push(id),
        }
    }
    out
}
