//! AddressRange types for binary analysis.
//!
//! Half-open `[start, start+size)` contiguous memory regions, used to
//! represent segments, sections, and function extents.

use crate::core::address::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open contiguous memory region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    /// The starting address of the range (inclusive)
    pub start: Address,
    /// The size of the range in bytes
    pub size: u64,
    /// Optional alignment requirement in bytes
    pub alignment: Option<u64>,
}

impl AddressRange {
    /// Create a new AddressRange.
    ///
    /// # Errors
    /// Returns an error if size is 0, alignment is invalid, or end address would overflow.
    pub fn new(start: Address, size: u64, alignment: Option<u64>) -> Result<Self, String> {
        if size == 0 {
            return Err("size cannot be 0".to_string());
        }
        if let Some(align) = alignment {
            if align == 0 || (align & (align - 1)) != 0 {
                return Err("alignment must be a positive power of 2".to_string());
            }
        }
        if start.bits < 64 {
            let _ = start
                .add(size)
                .map_err(|_| "size too large, would cause address overflow".to_string())?;
        }
        Ok(AddressRange {
            start,
            size,
            alignment,
        })
    }

    /// Get the end address of the range (exclusive).
    pub fn end_addr(&self) -> Result<Address, String> {
        self.start.add(self.size)
    }

    pub fn is_valid(&self) -> bool {
        if self.size == 0 {
            return false;
        }
        if let Some(align) = self.alignment {
            if align == 0 || (align & (align - 1)) != 0 {
                return false;
            }
        }
        if !self.start.is_valid() {
            return false;
        }
        self.end_addr().is_ok()
    }

    /// Check if this range contains the given address (same kind/bits required).
    pub fn contains_addr(&self, address: &Address) -> Result<bool, String> {
        if address.kind != self.start.kind || address.bits != self.start.bits {
            return Ok(false);
        }
        let end_addr = self.end_addr()?;
        Ok(address.value >= self.start.value && address.value < end_addr.value)
    }

    pub fn contains_range(&self, other: &AddressRange) -> Result<bool, String> {
        if other.start.kind != self.start.kind || other.start.bits != self.start.bits {
            return Ok(false);
        }
        let self_end = self.end_addr()?;
        let other_end = other.end_addr()?;
        Ok(other.start.value >= self.start.value && other_end.value <= self_end.value)
    }

    pub fn overlaps_with(&self, other: &AddressRange) -> Result<bool, String> {
        if other.start.kind != self.start.kind || other.start.bits != self.start.bits {
            return Ok(false);
        }
        let self_end = self.end_addr()?;
        let other_end = other.end_addr()?;
        Ok(self.start.value < other_end.value && other.start.value < self_end.value)
    }

    pub fn intersection_with(&self, other: &AddressRange) -> Result<Option<Self>, String> {
        if other.start.kind != self.start.kind || other.start.bits != self.start.bits {
            return Ok(None);
        }
        let self_end = self.end_addr()?;
        let other_end = other.end_addr()?;

        let intersect_start = self.start.value.max(other.start.value);
        let intersect_end = self_end.value.min(other_end.value);
        if intersect_start >= intersect_end {
            return Ok(None);
        }
        let intersect_size = intersect_end - intersect_start;
        let intersect_start_addr = self.start.add(intersect_start - self.start.value)?;
        let alignment = match (self.alignment, other.alignment) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };
        Ok(Some(AddressRange::new(
            intersect_start_addr,
            intersect_size,
            alignment,
        )?))
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_addr() {
            Ok(end) => write!(f, "[{}, {})", self.start, end),
            Err(_) => write!(f, "[{}, +{})", self.start, self.size),
        }
    }
}
