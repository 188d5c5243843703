//! Resource-set diffs: what applying a freshly synthesized set would change.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{Resource, ResourceSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary { pub adds: usize, pub updates: usize, pub removes: usize }

impl DiffSummary {
    pub fn is_empty(&self) -> bool { self.adds == 0 && self.updates == 0 && self.removes == 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction { Create, Update, Delete, Unchanged }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub kind: String,
    pub name: String,
    pub action: ChangeAction,
    pub summary: DiffSummary,
}

/// Drop fields the API server owns so they never register as drift.
pub fn strip_noisy(mut v: Json) -> Json {
    if let Some(meta) = v.get_mut("metadata").and_then(Json::as_object_mut) {
        for k in ["managedFields", "resourceVersion", "generation", "creationTimestamp", "uid"] {
            meta.remove(k);
        }
    }
    if let Some(obj) = v.as_object_mut() { obj.remove("status"); }
    v
}

/// Count leaf-level adds, updates and removes turning `base` into `target`.
pub fn diff_summary(target: &Json, base: &Json) -> DiffSummary {
    fn walk(a: &Json, b: &Json, s: &mut DiffSummary) {
        match (a, b) {
            (Json::Object(ao), Json::Object(bo)) => {
                for (k, av) in ao {
                    match bo.get(k) {
                        Some(bv) if av == bv => {}
                        Some(bv) => walk(av, bv, s),
                        None => s.adds += 1,
                    }
                }
                s.removes += bo.keys().filter(|k| !ao.contains_key(*k)).count();
            }
            (Json::Array(aa), Json::Array(bb)) => {
                s.updates += aa.iter().zip(bb).filter(|(x, y)| x != y).count();
                s.adds += aa.len().saturating_sub(bb.len());
                s.removes += bb.len().saturating_sub(aa.len());
            }
            (av, bv) => if av != bv { s.updates += 1 },
        }
    }
    let mut s = DiffSummary::default();
    walk(target, base, &mut s);
    s
}

fn canonical(r: &Resource) -> Json { r.to_json().map(strip_noisy).unwrap_or(Json::Null) }

/// Changes to go from `previous` to `desired`: desired order first, then
/// deletions of resources no longer synthesized.
pub fn plan(previous: &ResourceSet, desired: &ResourceSet) -> Vec<ResourceChange> {
    let index: FxHashMap<(&str, &str), &Resource> = previous.iter().map(|r| ((r.kind(), r.name()), r)).collect();
    let mut out = Vec::with_capacity(desired.len());

    for r in desired {
        let (action, summary) = match index.get(&(r.kind(), r.name())) {
            None => (ChangeAction::Create, diff_summary(&canonical(r), &Json::Object(Default::default()))),
            Some(old) => {
                let s = diff_summary(&canonical(r), &canonical(old));
                (if s.is_empty() { ChangeAction::Unchanged } else { ChangeAction::Update }, s)
            }
        };
        out.push(ResourceChange { kind: r.kind().into(), name: r.name().into(), action, summary });
    }

    for r in previous.iter().rev() {
        if desired.get(r.kind(), r.name()).is_none() {
            let summary = diff_summary(&Json::Object(Default::default()), &canonical(r));
            out.push(ResourceChange { kind: r.kind().into(), name: r.name().into(), action: ChangeAction::Delete, summary });
        }
    }
    out
}
