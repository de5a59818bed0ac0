//! Completion usage frequency table

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Label to count table shared by all completion requests
///
/// Once the table grows past its limit, only the most used half survives.
#[derive(Debug)]
pub struct UsageTracker {
    counts: RwLock<FxHashMap<String, u32>>,
    limit: usize,
}

impl UsageTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            counts: RwLock::new(FxHashMap::default()),
            limit: limit.max(2),
        }
    }

    /// Count one resolved use of `label`
    pub fn record(&self, label: &str) {
        let mut counts = self.counts.write();
        *counts.entry(label.to_string()).or_insert(0) += 1;
        if counts.len() > self.limit {
            let keep = self.limit / 2;
            let mut ranked: Vec<(String, u32)> = counts.drain().collect();
            ranked.sort_by(|(la, ca), (lb, cb)| cb.cmp(ca).then_with(|| la.cmp(lb)));
            ranked.truncate(keep);
            counts.extend(ranked);
            log::debug!("usage table pruned to {keep} labels");
        }
    }

    /// Uses recorded for `label`
    pub fn count(&self, label: &str) -> u32 {
        self.counts.read().get(label).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.read().is_empty()
    }

    pub fn clear(&self) {
        self.counts.write().clear();
    }
}
