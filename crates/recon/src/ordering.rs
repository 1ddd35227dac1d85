//! Relational ordering: primaries sorted by key, each followed by the
//! dependents that reference it.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CanonicalKey, MergedRecord, OrderedRecord};
use crate::report::{DanglingReference, ReportBuilder};

#[derive(Debug, Default)]
pub struct OrderOutput {
    pub records: Vec<OrderedRecord>,
    /// Dependents that reference no present primary. Already appended to
    /// `records`, in key order.
    pub orphans: Vec<CanonicalKey>,
    /// Targets that are absent or are themselves dependents.
    pub dangling: Vec<DanglingReference>,
}

impl OrderOutput {
    pub fn record_in(&self, report: &mut ReportBuilder) {
        for key in &self.orphans {
            report.orphan(key);
        }
        for d in &self.dangling {
            report.dangling(&d.dependent, &d.target);
        }
    }
}

/// Place every record. A dependent referencing several present primaries
/// is emitted once after each of them.
pub fn order(records: Vec<MergedRecord>) -> OrderOutput {
    let (mut primaries, mut dependents): (Vec<MergedRecord>, Vec<MergedRecord>) =
        records.into_iter().partition(|r| !r.is_dependent());
    primaries.sort_by(|a, b| a.canonical_key.cmp(&b.canonical_key));
    dependents.sort_by(|a, b| a.canonical_key.cmp(&b.canonical_key));

    let primary_keys: BTreeSet<&CanonicalKey> = primaries.iter().map(|r| &r.canonical_key).collect();

    // primary key -> dependents (indices, key order)
    let mut attached: BTreeMap<&CanonicalKey, Vec<usize>> = BTreeMap::new();
    let mut orphan_idx = Vec::new();
    let mut dangling = Vec::new();

    for (i, dep) in dependents.iter().enumerate() {
        let mut placed = false;
        for target in &dep.reference_targets {
            if primary_keys.contains(target) {
                attached.entry(target).or_default().push(i);
                placed = true;
            } else {
                log::debug!("'{}' references '{target}', which is not a primary record", dep.canonical_key);
                dangling.push(DanglingReference {
                    dependent: dep.canonical_key.clone(),
                    target: target.clone(),
                });
            }
        }
        if !placed {
            orphan_idx.push(i);
        }
    }

    let mut out = Vec::with_capacity(primaries.len() + dependents.len());
    let mut no = 0;
    let mut emit = |record: MergedRecord, anchor: Option<CanonicalKey>| {
        no += 1;
        out.push(OrderedRecord { no, anchor, record });
    };

    for primary in &primaries {
        emit(primary.clone(), None);
        if let Some(deps) = attached.get(&primary.canonical_key) {
            for &i in deps {
                emit(dependents[i].clone(), Some(primary.canonical_key.clone()));
            }
        }
    }

    let orphans: Vec<CanonicalKey> = orphan_idx
        .iter()
        .map(|&i| dependents[i].canonical_key.clone())
        .collect();
    if !orphans.is_empty() {
        log::warn!("{} dependent records reference no present primary", orphans.len());
    }
    for &i in &orphan_idx {
        emit(dependents[i].clone(), None);
    }

    OrderOutput {
        records: out,
        orphans,
        dangling,
    }
}
