//! Address types for binary analysis.
//!
//! This module provides the fundamental `Address`/`AddressKind` types used as
//! the location reference throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of address representation.
///
/// Only the two kinds the CFG Builder actually carries end-to-end are kept:
/// effective virtual addresses and raw file offsets. The ASLR slide between
/// them is a per-module constant (`Module::slide`), not a third address kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum AddressKind {
    /// Virtual address (effective, post-slide)
    VA,
    /// Offset within the file on disk
    FileOffset,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::VA => write!(f, "VA"),
            AddressKind::FileOffset => write!(f, "FileOffset"),
        }
    }
}

/// A location reference in binary analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// The kind of address this represents
    pub kind: AddressKind,
    /// The numeric value of the address
    pub value: u64,
    /// Bit width (32 or 64); this crate targets 64-bit Mach-O exclusively
    pub bits: u8,
}

impl Address {
    /// Create a new Address.
    ///
    /// # Panics
    /// Panics if `bits` is not 32 or 64, since `spec.md` §1 scopes this crate
    /// to 64-bit Mach-O (32-bit kept only for completeness of the type).
    pub fn new(kind: AddressKind, value: u64, bits: u8) -> Result<Self, String> {
        if ![32, 64].contains(&bits) {
            return Err("bits must be 32 or 64".to_string());
        }
        let max_value = if bits == 32 { 0xFFFF_FFFFu64 } else { u64::MAX };
        if value > max_value {
            return Err(format!(
                "value {} exceeds maximum for {}-bit address ({})",
                value, bits, max_value
            ));
        }
        Ok(Address { kind, value, bits })
    }

    /// Construct a 64-bit virtual address. The common case throughout this crate.
    pub fn va(value: u64) -> Self {
        Address {
            kind: AddressKind::VA,
            value,
            bits: 64,
        }
    }

    /// Construct a 64-bit file offset.
    pub fn file_offset(value: u64) -> Self {
        Address {
            kind: AddressKind::FileOffset,
            value,
            bits: 64,
        }
    }

    pub fn is_valid(&self) -> bool {
        if ![32, 64].contains(&self.bits) {
            return false;
        }
        let max_value = if self.bits == 32 {
            0xFFFF_FFFFu64
        } else {
            u64::MAX
        };
        self.value <= max_value
    }

    /// Add an offset to this address, wrapping on 64-bit overflow.
    pub fn add(&self, other: u64) -> Result<Self, String> {
        let new_value = if self.bits < 64 {
            self.value
                .checked_add(other)
                .ok_or_else(|| "addition overflow".to_string())?
        } else {
            self.value.wrapping_add(other)
        };
        Self::new(self.kind, new_value, self.bits)
    }

    /// Subtract an offset from this address.
    pub fn sub(&self, other: u64) -> Result<Self, String> {
        let new_value = self
            .value
            .checked_sub(other)
            .ok_or_else(|| "subtraction underflow".to_string())?;
        Self::new(self.kind, new_value, self.bits)
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }

    pub fn from_json(json_str: &str) -> Result<Self, String> {
        serde_json::from_str(json_str).map_err(|e| e.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_value = format!("{:x}", self.value);
        match self.kind {
            AddressKind::VA => write!(f, "VA:{}", hex_value),
            AddressKind::FileOffset => write!(f, "FO:{}", hex_value),
        }
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.value.cmp(&other.value) {
            std::cmp::Ordering::Equal => self.kind.cmp(&other.kind),
            ord => ord,
        }
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
