//! Condition-indexed dispatch table
//!
//! Maps match-keys to `(descendant_count, sorted sink ids)` and sink ids to
//! their current writer slot. One writer (the channel actor) mutates it;
//! many emitters read it through a shared read lock, each `select` observing
//! a consistent snapshot.

use super::condition::{diff, MatchKey};
use super::severity::Severity;
use super::sink::{Writer, WriterSlot};
use std::collections::HashMap;
use std::sync::Arc;

/// One bucket of the index.
///
/// `descendants` counts the strictly more specific keys registered beneath
/// this one; it is an invariant of registration, not a cache, so readers
/// can trust it without invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    pub descendants: u32,
    pub sinks: Vec<String>,
}

#[derive(Default)]
pub struct IndexTable {
    entries: HashMap<MatchKey, IndexEntry>,
    writers: HashMap<String, WriterSlot>,
}

impl IndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or re-register a sink: bind its writer slot and apply the
    /// key diff between `new` and `old` (both normalised).
    pub fn register(&mut self, sink_id: &str, slot: WriterSlot, new: &[MatchKey], old: &[MatchKey]) {
        self.writers.insert(sink_id.to_string(), slot);
        self.apply(sink_id, new, old);
    }

    /// Re-index a sink after a condition change; the writer binding is kept.
    pub fn reindex(&mut self, sink_id: &str, new: &[MatchKey], old: &[MatchKey]) {
        self.apply(sink_id, new, old);
    }

    /// Remove a sink entirely: unindex its keys and drop its writer binding.
    pub fn deregister(&mut self, sink_id: &str, condition: &[MatchKey]) {
        self.apply(sink_id, &[], condition);
        self.writers.remove(sink_id);
    }

    fn apply(&mut self, sink_id: &str, new: &[MatchKey], old: &[MatchKey]) {
        let d = diff(new, old);

        for key in &d.added {
            for prefix in key.prefixes() {
                self.entries.entry(prefix).or_default().descendants += 1;
            }
            let entry = self.entries.entry(key.clone()).or_default();
            if let Err(pos) = entry.sinks.binary_search_by(|s| s.as_str().cmp(sink_id)) {
                entry.sinks.insert(pos, sink_id.to_string());
            }
        }

        for key in &d.removed {
            for prefix in key.prefixes() {
                if let Some(entry) = self.entries.get_mut(&prefix) {
                    entry.descendants = entry.descendants.saturating_sub(1);
                }
                self.gc(&prefix);
            }
            if let Some(entry) = self.entries.get_mut(key) {
                if let Ok(pos) = entry.sinks.binary_search_by(|s| s.as_str().cmp(sink_id)) {
                    entry.sinks.remove(pos);
                }
            }
            self.gc(key);
        }
    }

    /// An entry lives while it has sinks or descendants.
    fn gc(&mut self, key: &MatchKey) {
        if let Some(entry) = self.entries.get(key) {
            if entry.sinks.is_empty() && entry.descendants == 0 {
                self.entries.remove(key);
            }
        }
    }

    /// Match `(severity, application, module)` against the table.
    ///
    /// Up to four lookups, each deeper one gated on its prefix's descendant
    /// count, then an ordered merge of the sorted id lists. Ids whose writer
    /// slot is gone or empty (racing uninstall, composite without an active
    /// writer) are dropped silently.
    pub fn select(
        &self,
        severity: Severity,
        application: &str,
        module: &str,
    ) -> Vec<(String, Arc<dyn Writer>)> {
        let mut ids: Vec<String> = Vec::new();

        let top = self.entries.get(&MatchKey::severity(severity));
        if let Some(entry) = top {
            ids.extend(entry.sinks.iter().cloned());
        }

        if top.is_some_and(|e| e.descendants > 0) {
            if let Some(entry) = self.entries.get(&MatchKey::module(severity, module)) {
                ids = merge(&ids, &entry.sinks);
            }
            if let Some(entry) = self
                .entries
                .get(&MatchKey::application(severity, application))
            {
                ids = merge(&ids, &entry.sinks);
                if entry.descendants > 0 {
                    if let Some(deep) =
                        self.entries
                            .get(&MatchKey::full(severity, application, module))
                    {
                        ids = merge(&ids, &deep.sinks);
                    }
                }
            }
        }

        ids.into_iter()
            .filter_map(|id| {
                let writer = self.writers.get(&id).and_then(WriterSlot::load)?;
                Some((id, writer))
            })
            .collect()
    }

    pub fn entry(&self, key: &MatchKey) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &MatchKey> {
        self.entries.keys()
    }

    /// Sorted copy of the key/entry pairs, for structural comparison.
    pub fn snapshot(&self) -> Vec<(MatchKey, IndexEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.writers.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.writers.clear();
    }
}

/// Ordered union of two sorted, de-duplicated id lists.
fn merge(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
