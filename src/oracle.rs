//! Instruction-analysis oracle (spec §6): classifies a decoded instruction's
//! control-flow role and, where determinable, its branch target. Treated as
//! an external collaborator by the spec but implemented concretely here since
//! the CFG Builder cannot do anything without one.

use crate::core::disassembler::Architecture;
use crate::core::instruction::Instruction;

/// What a single instruction does to control flow.
pub trait InstructionOracle {
    fn is_branch(&self, ins: &Instruction) -> bool;
    fn is_call(&self, ins: &Instruction) -> bool;
    fn is_conditional_branch(&self, ins: &Instruction) -> bool;
    /// True for any instruction after which execution does not fall through
    /// to the next address unconditionally: unconditional branches, calls
    /// that never return, and returns. A conditional branch is NOT a
    /// terminator — both the taken and fallthrough edges must be wired.
    fn is_terminator(&self, ins: &Instruction) -> bool;
    /// Resolve a direct branch/call's target address, if statically known.
    fn evaluate_branch(&self, ins: &Instruction) -> Option<u64>;
}

/// x86/x86-64 oracle, grounded on `iced_x86::Instruction::flow_control()`
/// rather than mnemonic string matching — `iced-x86` already classifies flow
/// control precisely as part of decoding, so re-deriving it from mnemonics
/// would throw away information the decoder already has.
pub struct IcedOracle {
    bits: u32,
}

impl IcedOracle {
    pub fn new(arch: Architecture) -> Self {
        let bits = if arch.is_64_bit() { 64 } else { 32 };
        IcedOracle { bits }
    }

    /// Re-decode the instruction's raw bytes to recover iced's `FlowControl`
    /// classification. The Decode Cache stores a `DecodedInstruction`
    /// independent of `iced_x86::Instruction`, so the oracle re-derives flow
    /// control from bytes rather than threading iced's own type through the
    /// cache.
    fn decode(&self, ins: &Instruction) -> Option<iced_x86::Instruction> {
        use iced_x86::{Decoder, DecoderOptions};
        let mut decoder = Decoder::new(self.bits, &ins.bytes, DecoderOptions::NONE);
        decoder.set_ip(ins.address.value);
        let decoded = decoder.decode();
        if decoded.is_invalid() {
            None
        } else {
            Some(decoded)
        }
    }
}

impl InstructionOracle for IcedOracle {
    fn is_branch(&self, ins: &Instruction) -> bool {
        use iced_x86::FlowControl::*;
        matches!(
            self.decode(ins).map(|i| i.flow_control()),
            Some(UnconditionalBranch | ConditionalBranch | IndirectBranch)
        )
    }

    fn is_call(&self, ins: &Instruction) -> bool {
        use iced_x86::FlowControl::*;
        matches!(self.decode(ins).map(|i| i.flow_control()), Some(Call | IndirectCall))
    }

    fn is_conditional_branch(&self, ins: &Instruction) -> bool {
        matches!(
            self.decode(ins).map(|i| i.flow_control()),
            Some(iced_x86::FlowControl::ConditionalBranch)
        )
    }

    fn is_terminator(&self, ins: &Instruction) -> bool {
        use iced_x86::FlowControl::*;
        // IndirectCall falls through just like a direct call (e.g. `call rax`
        // for vtable dispatch or a PLT stub) — only the branch/return/
        // exception flow-control kinds actually end the block.
        matches!(
            self.decode(ins).map(|i| i.flow_control()),
            Some(UnconditionalBranch | IndirectBranch | Return | Exception)
        )
    }

    fn evaluate_branch(&self, ins: &Instruction) -> Option<u64> {
        let decoded = self.decode(ins)?;
        match decoded.flow_control() {
            iced_x86::FlowControl::UnconditionalBranch
            | iced_x86::FlowControl::ConditionalBranch
            | iced_x86::FlowControl::Call => Some(decoded.near_branch_target()),
            _ => None,
        }
    }
}

/// Mnemonic-prefix heuristic oracle for architectures `iced-x86` doesn't
/// cover, ported from the teacher's `analysis/cfg.rs::classify_ctrl_flow`.
pub struct MnemonicOracle {
    arch: Architecture,
}

impl MnemonicOracle {
    pub fn new(arch: Architecture) -> Self {
        MnemonicOracle { arch }
    }

    fn classify(&self, mnemonic: &str) -> (bool, bool, bool) {
        let m = mnemonic.to_ascii_lowercase();
        match self.arch {
            Architecture::ARM | Architecture::ARM64 => {
                let is_ret = m == "ret" || m.starts_with("bx") && m.contains("lr");
                let is_call = m.starts_with("bl");
                let is_branch = m.starts_with('b') && !is_call;
                (is_branch, is_call, is_ret)
            }
            Architecture::MIPS | Architecture::MIPS64 => {
                let is_call = m == "jal" || m == "jalr";
                let is_branch = m.starts_with('b') || m == "j";
                let is_ret = m == "jr" && !is_call;
                (is_branch, is_call, is_ret)
            }
            Architecture::PPC | Architecture::PPC64 => {
                let is_call = m == "bl" || m == "blr" && false;
                let is_ret = m == "blr";
                let is_branch = (m.starts_with('b')) && !is_call && !is_ret;
                (is_branch, is_call, is_ret)
            }
            Architecture::RISCV | Architecture::RISCV64 => {
                let is_call = m == "jal" || m == "jalr";
                let is_ret = m == "ret";
                let is_branch = m.starts_with('b') || m == "j";
                (is_branch, is_call, is_ret)
            }
            _ => (false, false, false),
        }
    }
}

impl InstructionOracle for MnemonicOracle {
    fn is_branch(&self, ins: &Instruction) -> bool {
        self.classify(&ins.mnemonic).0
    }
    fn is_call(&self, ins: &Instruction) -> bool {
        self.classify(&ins.mnemonic).1
    }
    fn is_conditional_branch(&self, ins: &Instruction) -> bool {
        let (is_branch, is_call, _) = self.classify(&ins.mnemonic);
        is_branch && !is_call && ins.mnemonic.to_ascii_lowercase() != "b" && ins.mnemonic.to_ascii_lowercase() != "j"
    }
    fn is_terminator(&self, ins: &Instruction) -> bool {
        let (is_branch, is_call, is_ret) = self.classify(&ins.mnemonic);
        is_ret || (is_branch && !is_call && !self.is_conditional_branch(ins))
    }
    fn evaluate_branch(&self, ins: &Instruction) -> Option<u64> {
        ins.operands
            .iter()
            .find_map(|op| op.immediate)
            .map(|v| v as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;

    fn ins(address: u64, bytes: Vec<u8>) -> Instruction {
        Instruction::new(
            Address::va(address),
            bytes,
            String::new(),
            vec![],
            0,
            "x86_64".to_string(),
            None,
            None,
        )
    }

    #[test]
    fn test_iced_oracle_call_and_ret() {
        let oracle = IcedOracle::new(Architecture::X86_64);
        // call rel32 to self+5 (E8 00 00 00 00)
        let call = ins(0x1000, vec![0xE8, 0x00, 0x00, 0x00, 0x00]);
        assert!(oracle.is_call(&call));
        assert!(!oracle.is_branch(&call));
        assert_eq!(oracle.evaluate_branch(&call), Some(0x1005));

        // ret (C3)
        let ret = ins(0x1000, vec![0xC3]);
        assert!(oracle.is_terminator(&ret));
        assert!(!oracle.is_call(&ret));
    }

    #[test]
    fn test_iced_oracle_conditional_branch_not_terminator() {
        let oracle = IcedOracle::new(Architecture::X86_64);
        // je rel8 +3 (74 03)
        let je = ins(0x1000, vec![0x74, 0x03]);
        assert!(oracle.is_branch(&je));
        assert!(oracle.is_conditional_branch(&je));
        assert!(!oracle.is_terminator(&je));
        assert_eq!(oracle.evaluate_branch(&je), Some(0x1005));
    }

    #[test]
    fn test_iced_oracle_unconditional_jump_is_terminator() {
        let oracle = IcedOracle::new(Architecture::X86_64);
        // jmp rel32 (E9 00 00 00 00)
        let jmp = ins(0x1000, vec![0xE9, 0x00, 0x00, 0x00, 0x00]);
        assert!(oracle.is_branch(&jmp));
        assert!(!oracle.is_conditional_branch(&jmp));
        assert!(oracle.is_terminator(&jmp));
    }

    #[test]
    fn test_iced_oracle_indirect_call_falls_through() {
        let oracle = IcedOracle::new(Architecture::X86_64);
        // call rax (FF D0)
        let call = ins(0x1000, vec![0xFF, 0xD0]);
        assert!(oracle.is_call(&call));
        assert!(!oracle.is_terminator(&call), "indirect calls fall through, just like direct calls");
    }

    #[test]
    fn test_mnemonic_oracle_arm() {
        let oracle = MnemonicOracle::new(Architecture::ARM64);
        let mut call = ins(0x1000, vec![]);
        call.mnemonic = "bl".to_string();
        assert!(oracle.is_call(&call));

        let mut cond = ins(0x1000, vec![]);
        cond.mnemonic = "beq".to_string();
        assert!(oracle.is_conditional_branch(&cond));
        assert!(!oracle.is_terminator(&cond));
    }
}
