//! Content fingerprint of a workload spec.
//!
//! The digest is a 32-bit FNV-1a over a canonical traversal of the spec's
//! JSON value: object members are visited in sorted key order and members
//! holding `null`, `[]` or `{}` are skipped, so absent and empty fields hash
//! the same. The digest's decimal text is then mapped onto a vowel-free
//! alphabet. Changing any of this changes every stored fingerprint.

use metrics::counter;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::constants::LABEL_HASH;
use crate::workload::Workload;

const FNV32_OFFSET: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

const SAFE_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Tokens the encoded form must never contain.
pub const BLOCKLIST: &[&str] = &["fck", "sht", "cnt", "dck", "twt", "kkk", "fgt", "ngr"];

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("spec is not serializable: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no safe encoding for digest {0}")]
    Exhausted(u32),
}

struct Fnv32(u32);

impl Fnv32 {
    fn new() -> Self { Self(FNV32_OFFSET) }

    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 ^= *b as u32;
            self.0 = self.0.wrapping_mul(FNV32_PRIME);
        }
    }

    fn write_len(&mut self, n: usize) { self.write(&(n as u32).to_le_bytes()); }

    fn write_str(&mut self, s: &str) {
        self.write(b"s");
        self.write_len(s.len());
        self.write(s.as_bytes());
    }
}

fn is_vacant(v: &Json) -> bool {
    match v {
        Json::Null => true,
        Json::Array(a) => a.is_empty(),
        Json::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn feed(h: &mut Fnv32, v: &Json) {
    match v {
        Json::Null => h.write(b"n"),
        Json::Bool(true) => h.write(b"t"),
        Json::Bool(false) => h.write(b"f"),
        Json::Number(n) => {
            h.write(b"#");
            h.write(n.to_string().as_bytes());
            h.write(b";");
        }
        Json::String(s) => h.write_str(s),
        Json::Array(items) => {
            h.write(b"[");
            h.write_len(items.len());
            for item in items { feed(h, item); }
            h.write(b"]");
        }
        Json::Object(map) => {
            let mut members: Vec<(&String, &Json)> = map.iter().filter(|(_, v)| !is_vacant(v)).collect();
            members.sort_by(|a, b| a.0.cmp(b.0));
            h.write(b"{");
            h.write_len(members.len());
            for (k, v) in members {
                h.write_str(k);
                feed(h, v);
            }
            h.write(b"}");
        }
    }
}

/// Raw 32-bit digest of a JSON value with an optional collision salt.
pub fn digest(value: &Json, collision_salt: Option<i32>) -> u32 {
    let mut h = Fnv32::new();
    feed(&mut h, value);
    if let Some(salt) = collision_salt {
        h.write(&salt.to_le_bytes());
    }
    h.0
}

/// Map each byte onto the safe alphabet, rotating the alphabet by one more
/// position per attempt until no blocklisted token appears.
pub fn safe_encode(text: &str, blocklist: &[&str]) -> Option<String> {
    let n = SAFE_ALPHABET.len();
    for attempt in 0..n {
        let encoded: String = text
            .bytes()
            .map(|b| SAFE_ALPHABET[(b as usize + attempt) % n] as char)
            .collect();
        if !blocklist.iter().any(|t| encoded.contains(t)) {
            if attempt > 0 {
                counter!("fingerprint_rerolls", attempt as u64);
            }
            return Some(encoded);
        }
    }
    None
}

/// Fingerprint of any serializable spec.
pub fn hash<T: Serialize + ?Sized>(spec: &T, collision_salt: Option<i32>) -> Result<String, FingerprintError> {
    let value = serde_json::to_value(spec)?;
    let d = digest(&value, collision_salt);
    safe_encode(&d.to_string(), BLOCKLIST).ok_or(FingerprintError::Exhausted(d))
}

/// Fingerprint of a workload's spec.
pub fn hash_workload<W: Workload>(w: &W, collision_salt: Option<i32>) -> Result<String, FingerprintError> {
    hash(w.spec(), collision_salt)
}

/// Write the fingerprint label onto the workload. Returns the hash and
/// whether the label changed.
pub fn ensure_hash_label<W: Workload>(w: &mut W) -> Result<(String, bool), FingerprintError> {
    let h = hash_workload(w, None)?;
    let labels = w.metadata_mut().labels.get_or_insert_with(Default::default);
    let applied = labels.get(LABEL_HASH) != Some(&h);
    if applied {
        labels.insert(LABEL_HASH.to_string(), h.clone());
        debug!(hash = %h, "applied fingerprint label");
    }
    Ok((h, applied))
}
