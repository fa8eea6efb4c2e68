//! BasicBlock type for representing straight-line code regions.
//!
//! A basic block is a maximal run of instructions with one entry and one
//! exit, as materialized by the CFG builder's phase 2. `end_address` is
//! exclusive, unlike `Atom`'s inclusive `end` — the builder converts between
//! the two when it carves blocks out of atoms.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::Address;

/// A straight-line run of instructions with a single entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Deterministic identifier, typically `format!("{:x}", start_address.value)`.
    pub id: String,
    pub start_address: Address,
    /// Exclusive end address.
    pub end_address: Address,
    pub instruction_count: u32,
    pub successor_ids: Vec<String>,
    pub predecessor_ids: Vec<String>,
    pub relationships_known: bool,
    /// Set when decoding ran off the end of an atom or hit an invalid
    /// instruction before reaching a terminator — the block is a partial
    /// result, not a dead end by design.
    pub failed: bool,
    /// Address of the atom this block was carved from, for attributing a
    /// block back to its containing atom without a reverse lookup.
    pub atom_begin: u64,
}

impl BasicBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        start_address: Address,
        end_address: Address,
        instruction_count: u32,
        successor_ids: Option<Vec<String>>,
        predecessor_ids: Option<Vec<String>>,
        failed: bool,
        atom_begin: u64,
    ) -> Self {
        Self {
            id,
            start_address,
            end_address,
            instruction_count,
            successor_ids: successor_ids.clone().unwrap_or_default(),
            predecessor_ids: predecessor_ids.clone().unwrap_or_default(),
            relationships_known: successor_ids.is_some() || predecessor_ids.is_some(),
            failed,
            atom_begin,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        if self.start_address.kind != self.end_address.kind {
            return 0;
        }
        if self.end_address.value <= self.start_address.value {
            return 0;
        }
        self.end_address.value - self.start_address.value
    }

    pub fn contains_address(&self, addr: Address) -> bool {
        if addr.kind != self.start_address.kind {
            return false;
        }
        addr.value >= self.start_address.value && addr.value < self.end_address.value
    }

    pub fn successor_count(&self) -> usize {
        self.successor_ids.len()
    }
    pub fn predecessor_count(&self) -> usize {
        self.predecessor_ids.len()
    }
    pub fn is_entry_block(&self) -> bool {
        self.relationships_known && self.predecessor_ids.is_empty()
    }
    pub fn is_exit_block(&self) -> bool {
        self.relationships_known && self.successor_ids.is_empty()
    }
    pub fn is_single_instruction(&self) -> bool {
        self.instruction_count == 1
    }
    pub fn has_successor(&self, id: &str) -> bool {
        self.successor_ids.iter().any(|s| s == id)
    }
    pub fn has_predecessor(&self, id: &str) -> bool {
        self.predecessor_ids.iter().any(|s| s == id)
    }
    pub fn add_successor(&mut self, id: String) {
        if !self.has_successor(&id) {
            self.successor_ids.push(id);
        }
    }
    pub fn remove_successor(&mut self, id: &str) {
        if let Some(pos) = self.successor_ids.iter().position(|s| s == id) {
            self.successor_ids.remove(pos);
        }
    }
    pub fn add_predecessor(&mut self, id: String) {
        if !self.has_predecessor(&id) {
            self.predecessor_ids.push(id);
        }
    }
    pub fn remove_predecessor(&mut self, id: &str) {
        if let Some(pos) = self.predecessor_ids.iter().position(|s| s == id) {
            self.predecessor_ids.remove(pos);
        }
    }

    pub fn summary(&self) -> String {
        let entry = if self.is_entry_block() { " ENTRY" } else { "" };
        let exit = if self.is_exit_block() { " EXIT" } else { "" };
        let failed = if self.failed { " FAILED" } else { "" };
        format!(
            "BB:{} {:x}-{:x} {} instrs, {} preds, {} succs{}{}{}",
            self.id,
            self.start_address.value,
            self.end_address.value,
            self.instruction_count,
            self.predecessor_ids.len(),
            self.successor_ids.len(),
            entry,
            exit,
            failed
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start_address.kind != self.end_address.kind {
            return Err("start address and end address must have same kind".to_string());
        }
        if self.end_address.value <= self.start_address.value {
            return Err("start address must be less than end address".to_string());
        }
        if self.instruction_count == 0 {
            return Err("instruction count must be > 0".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for s in &self.successor_ids {
            if !seen.insert(s) {
                return Err("duplicate successor id".to_string());
            }
        }
        Ok(())
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BasicBlock '{}' ({:x}-{:x}, instrs={}, preds={}, succs={})",
            self.id,
            self.start_address.value,
            self.end_address.value,
            self.instruction_count,
            self.predecessor_ids.len(),
            self.successor_ids.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;

    fn bb(start: u64, end: u64) -> BasicBlock {
        BasicBlock::new(
            format!("{:x}", start),
            Address::va(start),
            Address::va(end),
            2,
            None,
            None,
            false,
            start,
        )
    }

    #[test]
    fn test_size_and_contains() {
        let b = bb(0x1000, 0x1008);
        assert_eq!(b.size_bytes(), 8);
        assert!(b.contains_address(Address::va(0x1000)));
        assert!(!b.contains_address(Address::va(0x1008)));
    }

    #[test]
    fn test_entry_exit_classification() {
        let mut b = bb(0x1000, 0x1008);
        assert!(!b.is_entry_block());
        b.relationships_known = true;
        assert!(b.is_entry_block());
        assert!(b.is_exit_block());
        b.add_successor("2000".to_string());
        assert!(!b.is_exit_block());
    }

    #[test]
    fn test_failed_block_summary_mentions_failed() {
        let mut b = bb(0x1000, 0x1008);
        b.failed = true;
        assert!(b.summary().contains("FAILED"));
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let b = bb(0x1000, 0x1000);
        assert!(b.validate().is_err());
    }
}
