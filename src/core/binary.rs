//! Format/architecture enums shared by the Mach-O shim and the disassembler backends.
//!
//! The teacher's `Binary` type (provenance, hashes, per-format metadata) has
//! no counterpart here — this crate analyzes one `Module` built directly from
//! a Mach-O byte buffer, not a catalogued binary artifact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The executable format of a binary. This crate only *builds* modules from
/// `MachO`, but keeps the other variants so `object`'s `Format` maps cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    ELF,
    PE,
    MachO,
    Wasm,
    COFF,
    Unknown,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::ELF => write!(f, "ELF"),
            Format::PE => write!(f, "PE"),
            Format::MachO => write!(f, "MachO"),
            Format::Wasm => write!(f, "Wasm"),
            Format::COFF => write!(f, "COFF"),
            Format::Unknown => write!(f, "Unknown"),
        }
    }
}

/// The CPU architecture of a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    X86,
    X86_64,
    ARM,
    AArch64,
    MIPS,
    MIPS64,
    PPC,
    PPC64,
    RISCV,
    RISCV64,
    Unknown,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86 => write!(f, "x86"),
            Arch::X86_64 => write!(f, "x86_64"),
            Arch::ARM => write!(f, "arm"),
            Arch::AArch64 => write!(f, "aarch64"),
            Arch::MIPS => write!(f, "mips"),
            Arch::MIPS64 => write!(f, "mips64"),
            Arch::PPC => write!(f, "ppc"),
            Arch::PPC64 => write!(f, "ppc64"),
            Arch::RISCV => write!(f, "riscv"),
            Arch::RISCV64 => write!(f, "riscv64"),
            Arch::Unknown => write!(f, "unknown"),
        }
    }
}

impl Arch {
    pub fn is_64_bit(&self) -> bool {
        matches!(
            self,
            Arch::X86_64 | Arch::AArch64 | Arch::MIPS64 | Arch::PPC64 | Arch::RISCV64
        )
    }

    pub fn bits(&self) -> u8 {
        if self.is_64_bit() {
            64
        } else {
            32
        }
    }
}

/// The endianness of a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "Little"),
            Endianness::Big => write!(f, "Big"),
        }
    }
}
