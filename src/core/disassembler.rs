//! Disassembler trait and error types for instruction decoding.
//!
//! Defines the `Disassembler` trait implemented by each decoder backend
//! (`disasm::iced`, `disasm::capstone`) and the `Architecture` enum used to
//! pick one via `disasm::registry::for_arch`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::{Address, AddressKind};
use crate::core::binary::Endianness;
use crate::core::instruction::Instruction;

/// Errors that can occur during disassembly operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisassemblerError {
    InvalidInstruction,
    InvalidAddress,
    InsufficientBytes,
    UnsupportedInstruction,
    UnsupportedArchitecture,
    InternalError(String),
}

impl fmt::Display for DisassemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisassemblerError::InvalidInstruction => write!(f, "InvalidInstruction"),
            DisassemblerError::InvalidAddress => write!(f, "InvalidAddress"),
            DisassemblerError::InsufficientBytes => write!(f, "InsufficientBytes"),
            DisassemblerError::UnsupportedInstruction => write!(f, "UnsupportedInstruction"),
            DisassemblerError::UnsupportedArchitecture => write!(f, "UnsupportedArchitecture"),
            DisassemblerError::InternalError(msg) => write!(f, "InternalError: {}", msg),
        }
    }
}

impl std::error::Error for DisassemblerError {}

pub type DisassemblerResult<T> = Result<T, DisassemblerError>;

/// Architecture types supported by disassembler backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    X86,
    X86_64,
    ARM,
    ARM64,
    MIPS,
    MIPS64,
    PPC,
    PPC64,
    RISCV,
    RISCV64,
    Unknown,
}

impl Architecture {
    pub fn address_bits(&self) -> u8 {
        match self {
            Architecture::X86 | Architecture::ARM | Architecture::MIPS | Architecture::PPC
            | Architecture::RISCV => 32,
            _ => 64,
        }
    }

    pub fn is_64_bit(&self) -> bool {
        self.address_bits() == 64
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::ARM => write!(f, "arm"),
            Architecture::ARM64 => write!(f, "arm64"),
            Architecture::MIPS => write!(f, "mips"),
            Architecture::MIPS64 => write!(f, "mips64"),
            Architecture::PPC => write!(f, "ppc"),
            Architecture::PPC64 => write!(f, "ppc64"),
            Architecture::RISCV => write!(f, "riscv"),
            Architecture::RISCV64 => write!(f, "riscv64"),
            Architecture::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<crate::core::binary::Arch> for Architecture {
    fn from(a: crate::core::binary::Arch) -> Self {
        use crate::core::binary::Arch as B;
        match a {
            B::X86 => Architecture::X86,
            B::X86_64 => Architecture::X86_64,
            B::ARM => Architecture::ARM,
            B::AArch64 => Architecture::ARM64,
            B::MIPS => Architecture::MIPS,
            B::MIPS64 => Architecture::MIPS64,
            B::PPC => Architecture::PPC,
            B::PPC64 => Architecture::PPC64,
            B::RISCV => Architecture::RISCV,
            B::RISCV64 => Architecture::RISCV64,
            B::Unknown => Architecture::Unknown,
        }
    }
}

impl From<Architecture> for crate::core::binary::Arch {
    fn from(a: Architecture) -> Self {
        use crate::core::binary::Arch as B;
        match a {
            Architecture::X86 => B::X86,
            Architecture::X86_64 => B::X86_64,
            Architecture::ARM => B::ARM,
            Architecture::ARM64 => B::AArch64,
            Architecture::MIPS => B::MIPS,
            Architecture::MIPS64 => B::MIPS64,
            Architecture::PPC => B::PPC,
            Architecture::PPC64 => B::PPC64,
            Architecture::RISCV => B::RISCV,
            Architecture::RISCV64 => B::RISCV64,
            Architecture::Unknown => B::Unknown,
        }
    }
}

/// Common interface for single-instruction decoding backends.
pub trait Disassembler {
    /// Disassemble a single instruction at the given address.
    fn disassemble_instruction(
        &self,
        address: &Address,
        bytes: &[u8],
    ) -> DisassemblerResult<Instruction>;

    /// Maximum instruction length for this architecture, in bytes.
    fn max_instruction_length(&self) -> usize;

    fn architecture(&self) -> Architecture;

    fn endianness(&self) -> Endianness;

    /// Check if an address is valid for disassembly on this backend:
    /// effective VA with matching bit width, or a raw file offset.
    fn is_valid_address(&self, address: &Address) -> bool {
        match address.kind {
            AddressKind::VA => address.bits == self.architecture().address_bits(),
            AddressKind::FileOffset => true,
        }
    }

    fn name(&self) -> &str {
        "Generic Disassembler"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// Configuration options for disassembler creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisassemblerConfig {
    pub architecture: Architecture,
    pub endianness: Endianness,
    pub options: std::collections::HashMap<String, String>,
}

impl DisassemblerConfig {
    pub fn new(
        architecture: Architecture,
        endianness: Endianness,
        options: Option<std::collections::HashMap<String, String>>,
    ) -> Self {
        Self {
            architecture,
            endianness,
            options: options.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;

    #[test]
    fn test_disassembler_error_display() {
        assert_eq!(
            format!("{}", DisassemblerError::InvalidInstruction),
            "InvalidInstruction"
        );
        assert_eq!(
            format!("{}", DisassemblerError::InternalError("test".to_string())),
            "InternalError: test"
        );
    }

    #[test]
    fn test_architecture_address_bits() {
        assert_eq!(Architecture::X86.address_bits(), 32);
        assert_eq!(Architecture::X86_64.address_bits(), 64);
        assert!(Architecture::X86_64.is_64_bit());
        assert!(!Architecture::X86.is_64_bit());
    }

    #[test]
    fn test_disassembler_config_creation() {
        let config = DisassemblerConfig::new(Architecture::X86_64, Endianness::Little, None);
        assert_eq!(config.architecture, Architecture::X86_64);
        assert!(config.options.is_empty());
    }

    #[test]
    fn test_default_is_valid_address() {
        struct MockDisassembler {
            arch: Architecture,
        }

        impl Disassembler for MockDisassembler {
            fn disassemble_instruction(
                &self,
                _address: &Address,
                _bytes: &[u8],
            ) -> DisassemblerResult<Instruction> {
                Err(DisassemblerError::UnsupportedInstruction)
            }

            fn max_instruction_length(&self) -> usize {
                15
            }

            fn architecture(&self) -> Architecture {
                self.arch
            }

            fn endianness(&self) -> Endianness {
                Endianness::Little
            }
        }

        let x86_disasm = MockDisassembler {
            arch: Architecture::X86,
        };
        let x64_disasm = MockDisassembler {
            arch: Architecture::X86_64,
        };

        let va32 = Address::new(AddressKind::VA, 0x1000, 32).unwrap();
        let va64 = Address::va(0x1000);

        assert!(x86_disasm.is_valid_address(&va32));
        assert!(x64_disasm.is_valid_address(&va64));
        assert!(!x86_disasm.is_valid_address(&va64));
        assert!(!x64_disasm.is_valid_address(&va32));
    }
}
