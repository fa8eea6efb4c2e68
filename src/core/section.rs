//! Section type for file-format organizational units.
//!
//! Sections represent file-format organizational units (e.g. Mach-O's
//! `__TEXT,__text`) used to seed the Region Map.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::{Address, AddressKind};
use crate::core::address_range::AddressRange;

/// Permission flags for sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionPerms {
    /// Raw permission bits: read=1, write=2, execute=4
    pub bits: u8,
}

impl SectionPerms {
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

impl fmt::Display for SectionPerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut perms = String::new();
        perms.push(if self.has_read() { 'r' } else { '-' });
        perms.push(if self.has_write() { 'w' } else { '-' });
        perms.push(if self.has_execute() { 'x' } else { '-' });
        write!(f, "{}", perms)
    }
}

/// File-format organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    /// Section name (e.g., "__text", "__data")
    pub name: String,
    /// Virtual address range where the section is mapped
    pub range: AddressRange,
    /// Memory permissions for the section, if known
    pub perms: Option<SectionPerms>,
    /// File offset where section data begins
    pub file_offset: Address,
}

impl Section {
    pub fn new(
        name: String,
        range: AddressRange,
        file_offset: Address,
        perms: Option<SectionPerms>,
    ) -> Result<Self, String> {
        if file_offset.kind != AddressKind::FileOffset {
            return Err("file_offset must have AddressKind::FileOffset".to_string());
        }
        if range.start.kind != AddressKind::VA {
            return Err("range addresses must have AddressKind::VA for sections".to_string());
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

    pub fn is_code_section(&self) -> bool {
        self.perms.as_ref().map(|p| p.is_code()).unwrap_or(false)
    }

    pub fn is_data_section(&self) -> bool {
        self.perms.as_ref().map(|p| p.is_data()).unwrap_or(false)
    }

    pub fn is_executable(&self) -> bool {
        self.perms.as_ref().map(|p| p.has_execute()).unwrap_or(false)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Section '{}'", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;

    #[test]
    fn test_section_perms_creation() {
        let perms = SectionPerms::new(true, false, true);
        assert!(perms.has_read());
        assert!(!perms.has_write());
        assert!(perms.has_execute());
        assert_eq!(format!("{}", perms), "r-x");
    }

    #[test]
    fn test_section_creation() {
        let range = AddressRange::new(Address::va(0x400000), 0x1000, Some(0x1000)).unwrap();
        let file_offset = Address::file_offset(0x1000);
        let perms = SectionPerms::new(true, false, true);

        let section = Section::new(
            "__text".to_string(),
            range,
            file_offset,
            Some(perms),
        )
        .unwrap();

        assert_eq!(section.name, "__text");
        assert_eq!(section.size(), 0x1000);
        assert!(section.is_code_section());
    }
}
