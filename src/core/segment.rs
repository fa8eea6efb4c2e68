//! Segment type for load-time memory mapping units.
//!
//! Segments correspond to Mach-O `LC_SEGMENT_64` load commands — the unit
//! used to locate `__TEXT` (for `HeaderLoadAddress`) and to seed the Region
//! Map alongside sections.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::{Address, AddressKind};
use crate::core::address_range::AddressRange;

/// Permission flags for memory segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Perms {
    /// Raw permission bits: read=1, write=2, execute=4
    pub bits: u8,
}

impl Perms {
    pub fn new(read: bool, write: bool, execute: bool) -> Self {
        let mut bits = 0u8;
        if read {
            bits |= 1;
        }
        if write {
            bits |= 2;
        }
        if execute {
            bits |= 4;
        }
        Self { bits }
    }

    pub fn has_read(&self) -> bool {
        (self.bits & 1) != 0
    }
    pub fn has_write(&self) -> bool {
        (self.bits & 2) != 0
    }
    pub fn has_execute(&self) -> bool {
        (self.bits & 4) != 0
    }
    pub fn is_data(&self) -> bool {
        self.has_read() && self.has_write() && !self.has_execute()
    }
    pub fn is_code(&self) -> bool {
        self.has_read() && self.has_execute() && !self.has_write()
    }
    pub fn is_readonly(&self) -> bool {
        self.has_read() && !self.has_write() && !self.has_execute()
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut perms = String::new();
        perms.push(if self.has_read() { 'r' } else { '-' });
        perms.push(if self.has_write() { 'w' } else { '-' });
        perms.push(if self.has_execute() { 'x' } else { '-' });
        write!(f, "{}", perms)
    }
}

/// Load-time memory mapping unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// Segment name (e.g., "__TEXT", "__DATA")
    pub name: String,
    /// Virtual address range where the segment is mapped
    pub range: AddressRange,
    /// Memory permissions for the segment
    pub perms: Perms,
    /// File offset where segment data begins
    pub file_offset: Address,
}

impl Segment {
    pub fn new(
        name: String,
        range: AddressRange,
        perms: Perms,
        file_offset: Address,
    ) -> Result<Self, String> {
        if file_offset.kind != AddressKind::FileOffset {
            return Err("file_offset must have AddressKind::FileOffset".to_string());
        }
        if range.start.kind != AddressKind::VA {
            return Err("range addresses must have AddressKind::VA for segments".to_string());
        }
        Ok(Self {
            name,
            range,
            perms,
            file_offset,
        })
    }

    pub fn size(&self) -> u64 {
        self.range.size
    }

    pub fn is_code_segment(&self) -> bool {
        self.perms.is_code()
    }

    pub fn is_data_segment(&self) -> bool {
        self.perms.is_data()
    }

    /// True if this segment's file data begins at offset 0 — the Mach-O
    /// header (and hence `HeaderLoadAddress`) always lives here.
    pub fn contains_file_header(&self) -> bool {
        self.file_offset.value == 0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment '{}'", self.name)
    }
}
