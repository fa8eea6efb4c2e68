//! Instruction and Operand types for decoded assembly instructions.
//!
//! `Instruction` is a decoded instruction materialized at a specific address
//! (what a `Disassembler` backend returns). The Decode Cache (component C,
//! `core::decode_cache`) stores an address-independent variant of the same
//! shape so that a cache hit decoded at one address is valid at another.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::Address;

/// Types of operands that can appear in instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    Register,
    Immediate,
    Memory,
    Displacement,
    Relative,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Register => write!(f, "Register"),
            OperandKind::Immediate => write!(f, "Immediate"),
            OperandKind::Memory => write!(f, "Memory"),
            OperandKind::Displacement => write!(f, "Displacement"),
            OperandKind::Relative => write!(f, "Relative"),
        }
    }
}

/// Access types for operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "Read"),
            Access::Write => write!(f, "Write"),
            Access::ReadWrite => write!(f, "ReadWrite"),
        }
    }
}

/// Side effects that instructions can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideEffect {
    MemoryWrite,
    RegisterModify,
    StackOperation,
    ControlFlow,
    SystemCall,
    IoOperation,
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffect::MemoryWrite => write!(f, "MemoryWrite"),
            SideEffect::RegisterModify => write!(f, "RegisterModify"),
            SideEffect::StackOperation => write!(f, "StackOperation"),
            SideEffect::ControlFlow => write!(f, "ControlFlow"),
            SideEffect::SystemCall => write!(f, "SystemCall"),
            SideEffect::IoOperation => write!(f, "IoOperation"),
        }
    }
}

/// Structured operand representation for instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    pub kind: OperandKind,
    pub size: u8,
    pub access: Access,
    /// String representation of the operand (fallback/display)
    pub text: String,
    pub register: Option<String>,
    pub immediate: Option<i64>,
    pub displacement: Option<i64>,
    pub scale: Option<u8>,
    pub base: Option<String>,
    pub index: Option<String>,
}

impl Operand {
    pub fn register(name: String, size: u8, access: Access) -> Self {
        Self {
            kind: OperandKind::Register,
            size,
            access,
            text: name.clone(),
            register: Some(name),
            immediate: None,
            displacement: None,
            scale: None,
            base: None,
            index: None,
        }
    }

    pub fn immediate(value: i64, size: u8) -> Self {
        Self {
            kind: OperandKind::Immediate,
            size,
            access: Access::Read,
            text: format!("0x{:x}", value),
            register: None,
            immediate: Some(value),
            displacement: None,
            scale: None,
            base: None,
            index: None,
        }
    }

    pub fn memory(
        size: u8,
        access: Access,
        displacement: Option<i64>,
        base: Option<String>,
        index: Option<String>,
        scale: Option<u8>,
    ) -> Self {
        let mut text = String::from("[");
        if let Some(base) = &base {
            text.push_str(base);
        }
        if let Some(index) = &index {
            if base.is_some() {
                text.push_str(" + ");
            }
            text.push_str(index);
            if let Some(scale) = scale {
                if scale > 1 {
                    text.push_str(&format!(" * {}", scale));
                }
            }
        }
        if let Some(disp) = displacement {
            if base.is_some() || index.is_some() {
                if disp >= 0 {
                    text.push_str(&format!(" + 0x{:x}", disp));
                } else {
                    text.push_str(&format!(" - 0x{:x}", -disp));
                }
            } else {
                text.push_str(&format!("0x{:x}", disp));
            }
        }
        text.push(']');

        Self {
            kind: OperandKind::Memory,
            size,
            access,
            text,
            register: None,
            immediate: None,
            displacement,
            scale,
            base,
            index,
        }
    }

    pub fn is_register(&self) -> bool {
        self.kind == OperandKind::Register
    }
    pub fn is_immediate(&self) -> bool {
        self.kind == OperandKind::Immediate
    }
    pub fn is_memory(&self) -> bool {
        self.kind == OperandKind::Memory
    }
    pub fn is_read(&self) -> bool {
        matches!(self.access, Access::Read | Access::ReadWrite)
    }
    pub fn is_write(&self) -> bool {
        matches!(self.access, Access::Write | Access::ReadWrite)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Decoded instruction at a specific address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub address: Address,
    pub bytes: Vec<u8>,
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    pub length: u16,
    pub arch: String,
    pub side_effects: Option<Vec<SideEffect>>,
    pub groups: Option<Vec<String>>,
}

impl Instruction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        bytes: Vec<u8>,
        mnemonic: String,
        operands: Vec<Operand>,
        length: u16,
        arch: String,
        side_effects: Option<Vec<SideEffect>>,
        groups: Option<Vec<String>>,
    ) -> Self {
        Self {
            address,
            bytes,
            mnemonic,
            operands,
            length,
            arch,
            side_effects,
            groups,
        }
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    pub fn is_branch(&self) -> bool {
        if let Some(groups) = &self.groups {
            groups.iter().any(|g| g == "branch")
        } else {
            matches!(
                self.mnemonic.as_str(),
                "jmp" | "je" | "jne" | "jg" | "jl" | "ja" | "jb" | "jbe" | "jae" | "js" | "jns"
            )
        }
    }

    pub fn is_call(&self) -> bool {
        self.mnemonic == "call"
    }

    pub fn is_return(&self) -> bool {
        matches!(self.mnemonic.as_str(), "ret" | "retf" | "iret")
    }

    /// End address of this instruction (exclusive), i.e. the address of the
    /// next instruction on straight-line fallthrough.
    pub fn end_address(&self) -> Address {
        self.address
            .add(self.length as u64)
            .unwrap_or(self.address)
    }

    pub fn disassembly(&self) -> String {
        let mut result = format!("{:08x}: ", self.address.value);
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                result.push(' ');
            }
            result.push_str(&format!("{:02x}", byte));
        }
        while result.len() < 30 {
            result.push(' ');
        }
        result.push_str(&self.mnemonic);
        if !self.operands.is_empty() {
            result.push(' ');
            for (i, operand) in self.operands.iter().enumerate() {
                if i > 0 {
                    result.push_str(", ");
                }
                result.push_str(&operand.text);
            }
        }
        result
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operand_str = if self.operands.is_empty() {
            String::new()
        } else {
            let ops: Vec<String> = self.operands.iter().map(|op| op.to_string()).collect();
            format!(" {}", ops.join(", "))
        };
        write!(f, "{}{}", self.mnemonic, operand_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;

    #[test]
    fn test_operand_kind_display() {
        assert_eq!(format!("{}", OperandKind::Register), "Register");
        assert_eq!(format!("{}", OperandKind::Memory), "Memory");
    }

    #[test]
    fn test_operand_register_creation() {
        let reg = Operand::register("rax".to_string(), 64, Access::ReadWrite);
        assert_eq!(reg.kind, OperandKind::Register);
        assert_eq!(reg.text, "rax");
    }

    #[test]
    fn test_operand_memory_display() {
        let mem = Operand::memory(32, Access::Read, Some(8), Some("rbp".to_string()), None, None);
        assert_eq!(mem.text, "[rbp + 0x8]");
    }

    #[test]
    fn test_instruction_end_address() {
        let ins = Instruction::new(
            Address::va(0x1000),
            vec![0xc3],
            "ret".to_string(),
            vec![],
            1,
            "x86_64".to_string(),
            None,
            None,
        );
        assert_eq!(ins.end_address().value, 0x1001);
        assert!(ins.is_return());
    }

    #[test]
    fn test_instruction_disassembly() {
        let ins = Instruction::new(
            Address::va(0x1000),
            vec![0x90],
            "nop".to_string(),
            vec![],
            1,
            "x86_64".to_string(),
            None,
            None,
        );
        assert!(ins.disassembly().contains("nop"));
    }
}
