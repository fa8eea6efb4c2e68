//! Decode Cache (component C): frequency-biased cache of decoded
//! instructions keyed by raw byte sequence, so two identical prologues are
//! decoded once. No teacher counterpart — the teacher's CFG recovery
//! decodes every instruction uncached.
//!
//! Three buffers, per spec:
//! - `TempKeys`/`TempValues`: instructions decoded since the last flush,
//!   appended in order, not yet deduplicated.
//! - `Cached`: the uniqued, frequency-ranked set kept across flushes, held
//!   as a `Vec` sorted by raw bytes so a lookup can binary-search for the
//!   longest cached key that is a prefix of a freshly read byte window
//!   instead of trying every candidate length against a hash table.
//!
//! When `TempKeys` reaches [`DECODE_CACHE_FLUSH_THRESHOLD`] entries, the
//! temp buffers are uniqued by byte sequence, merged with `Cached`, and the
//! top [`DECODE_CACHE_TOP_K`] by hit count are kept; the rest are dropped.

use crate::core::instruction::{Operand, SideEffect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flush the temp buffers into `Cached` once this many decodes accumulate.
pub const DECODE_CACHE_FLUSH_THRESHOLD: usize = 5000;

/// Keep at most this many entries in `Cached` after a flush.
pub const DECODE_CACHE_TOP_K: usize = 2000;

/// A decoded instruction's shape, independent of the address it was decoded
/// at — the cache key is the raw bytes, so the same key can be replayed at
/// any address by rebasing `mnemonic`/`operands`/`length` onto a new base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedInstruction {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    pub length: u16,
    pub side_effects: Option<Vec<SideEffect>>,
    pub groups: Option<Vec<String>>,
}

struct CacheEntry {
    key: Vec<u8>,
    value: DecodedInstruction,
    hits: u64,
}

/// Byte-sequence-keyed decode cache with bounded memory via top-K retention.
/// `cached` is kept sorted by `key` so lookups binary-search rather than
/// hash, per spec's `Cached` structure.
pub struct DecodeCache {
    temp_keys: Vec<Vec<u8>>,
    temp_values: Vec<DecodedInstruction>,
    cached: Vec<CacheEntry>,
    uniqued: u64,
    translated: u64,
    longest_cached_raw_bytes: usize,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self {
            temp_keys: Vec::new(),
            temp_values: Vec::new(),
            cached: Vec::new(),
            uniqued: 0,
            translated: 0,
            longest_cached_raw_bytes: 0,
        }
    }

    /// Longest byte sequence ever admitted into `Cached` — bounds how many
    /// bytes a lookup needs to consider as a candidate key prefix.
    pub fn longest_cached_raw_bytes(&self) -> usize {
        self.longest_cached_raw_bytes
    }

    pub fn uniqued(&self) -> u64 {
        self.uniqued
    }

    pub fn translated(&self) -> u64 {
        self.translated
    }

    /// Look up a previously-cached decode for this exact byte sequence, via
    /// binary search over the sorted `cached` entries.
    pub fn get(&mut self, key: &[u8]) -> Option<DecodedInstruction> {
        let idx = self.cached.binary_search_by(|e| e.key.as_slice().cmp(key)).ok()?;
        let entry = &mut self.cached[idx];
        entry.hits += 1;
        self.translated += 1;
        Some(entry.value.clone())
    }

    /// Find the longest cached entry whose raw bytes are a prefix of
    /// `window`, via a single binary search for `window`'s position among
    /// the sorted keys followed by a bounded backward scan for the first
    /// actual prefix match (a byte-sequence-sorted key that is a prefix of
    /// `window` is never greater than `window`, so every candidate lies at
    /// or before that position).
    pub fn find_longest_prefix(&mut self, window: &[u8]) -> Option<(usize, DecodedInstruction)> {
        let upper = self.cached.partition_point(|e| e.key.as_slice() <= window);
        for idx in (0..upper).rev() {
            let len = self.cached[idx].key.len();
            if len <= window.len() && window[..len] == self.cached[idx].key[..] {
                self.cached[idx].hits += 1;
                self.translated += 1;
                return Some((len, self.cached[idx].value.clone()));
            }
        }
        None
    }

    /// Record a freshly decoded instruction, flushing into `Cached` once the
    /// temp buffers reach the flush threshold.
    pub fn insert(&mut self, key: Vec<u8>, value: DecodedInstruction) {
        self.temp_keys.push(key);
        self.temp_values.push(value);
        if self.temp_keys.len() >= DECODE_CACHE_FLUSH_THRESHOLD {
            self.flush();
        }
    }

    /// Unique the temp buffers by byte key, merge hit counts with `Cached`,
    /// then keep only the top-K most frequently seen entries.
    pub fn flush(&mut self) {
        let mut merged: HashMap<Vec<u8>, CacheEntry> = self
            .cached
            .drain(..)
            .map(|e| (e.key.clone(), e))
            .collect();

        for (key, value) in self.temp_keys.drain(..).zip(self.temp_values.drain(..)) {
            merged
                .entry(key.clone())
                .and_modify(|e| e.hits += 1)
                .or_insert(CacheEntry { key, value, hits: 1 });
        }

        self.uniqued += merged.len() as u64;

        let mut entries: Vec<CacheEntry> = merged.into_values().collect();
        if entries.len() > DECODE_CACHE_TOP_K {
            entries.sort_by(|a, b| b.hits.cmp(&a.hits));
            entries.truncate(DECODE_CACHE_TOP_K);
        }

        self.longest_cached_raw_bytes = entries.iter().map(|e| e.key.len()).max().unwrap_or(0);
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        self.cached = entries;
    }
}

impl Default for DecodeCache {
    fn default() -> Self {
        Self::new()
    }
}
