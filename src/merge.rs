// src/merge.rs
//
// Deep-merge of identifier-keyed entries from the stats and geo sides, plus
// the filter that keeps only fully joined features.

use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// One identifier-keyed payload, from either side of the pipeline.
pub type KeyedEntry = (String, Value);

/// Fields whose presence in merged `properties` marks a full join: one that
/// only the stats side contributes (the first requested value, and the first
/// predicate when the query has any) and one only the geo side contributes
/// (the first identifier component).
#[derive(Debug, Clone)]
pub struct Indicators {
    pub stats_value: String,
    pub stats_predicate: Option<String>,
    pub geo_id: String,
}

impl Indicators {
    fn fully_joined(&self, merged: &Value) -> bool {
        let props = match merged.get("properties") {
            Some(p) => p,
            None => return false,
        };
        let present = |key: &str| props.get(key).map_or(false, |v| !v.is_null());
        present(&self.stats_value)
            && self
                .stats_predicate
                .as_deref()
                .map_or(true, |p| present(p))
            && present(&self.geo_id)
    }
}

/// Merge `incoming` into `base`: objects merge recursively key by key, any
/// other conflict is won by the later value. Associative and order-independent
/// for disjoint keys.
pub fn deep_merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match base.entry(key) {
                    serde_json::map::Entry::Occupied(mut slot) => {
                        deep_merge(slot.get_mut(), value)
                    }
                    serde_json::map::Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Group entries from both sides by identifier, fold each group with
/// [`deep_merge`], and keep only the groups that pass the indicator filter.
/// Stats-only and geo-only remnants are dropped, never null-padded; output
/// order is unspecified.
pub fn merge_keyed(
    entries: impl IntoIterator<Item = KeyedEntry>,
    indicators: &Indicators,
) -> Vec<Value> {
    let mut groups: HashMap<String, Value> = HashMap::new();
    let mut total = 0usize;
    for (identifier, payload) in entries {
        total += 1;
        match groups.entry(identifier) {
            Entry::Occupied(mut slot) => deep_merge(slot.get_mut(), payload),
            Entry::Vacant(slot) => {
                slot.insert(payload);
            }
        }
    }

    let merged: Vec<Value> = groups
        .into_values()
        .filter(|candidate| indicators.fully_joined(candidate))
        .collect();
    debug!(entries = total, joined = merged.len(), "merge complete");
    merged
}
