//! CFG Builder (component D): turns a module's mapped bytes into basic
//! blocks and edges by iterative recursive disassembly from a function
//! entry address, ported from the teacher's `analysis::cfg::discover_function`
//! worklist but rebuilt over the atom store, decode cache, and instruction
//! oracle rather than raw `object`-crate iteration and ad hoc flow
//! classification.
//!
//! Three phases per function:
//! 1. Atom discovery/splitting and instruction decoding, worklist-driven
//!    over block-start addresses.
//! 2. Basic block materialization from the decoded instruction runs.
//! 3. Edge wiring: successor addresses recorded in phase 1 are turned into
//!    successor/predecessor id lists once every block in the function is
//!    known.

pub mod driver;
pub mod function_factory;

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::warn;

use crate::core::address::Address;
use crate::core::atom::{Atom, AtomInstruction, TextAtom};
use crate::core::basic_block::BasicBlock;
use crate::core::decode_cache::{DecodeCache, DecodedInstruction};
use crate::core::disassembler::Disassembler;
use crate::core::instruction::Instruction;
use crate::core::module::Module;
use crate::oracle::InstructionOracle;
use crate::symbolizer::Symbolizer;

/// Resource limits for one run of the builder, ported from the teacher's
/// `analysis::cfg::Budgets`. `max_functions` and `timeout_ms` are consulted
/// by the module-level driver; `max_blocks` and `max_instructions` bound a
/// single `build_function` call.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub max_functions: usize,
    pub max_blocks: usize,
    pub max_instructions: usize,
    pub timeout_ms: u64,
}

impl Default for Budgets {
    fn default() -> Self {
        Budgets {
            max_functions: 64,
            max_blocks: 2048,
            max_instructions: 50_000,
            timeout_ms: 100,
        }
    }
}

/// One block discovered during phase 1, before successor addresses are
/// resolved into sibling block ids.
struct RawBlock {
    end_addr: u64,
    instructions: u32,
    successors: Vec<u64>,
    failed: bool,
}

/// Builds basic blocks and call targets for one function entry at a time.
/// Stateless across calls besides the budgets it was constructed with —
/// all mutable state (atoms, decode cache) lives in the `Module`/`DecodeCache`
/// the caller passes in.
pub struct CfgBuilder<'a> {
    disassembler: &'a dyn Disassembler,
    oracle: &'a dyn InstructionOracle,
    budgets: Budgets,
    /// Resolves a branch target to an external function's name, if any.
    /// Consulted ahead of the region-membership fallback so a PLT/stub
    /// trampoline living inside a mapped section is still classified as a
    /// tail call rather than an ordinary intra-function edge.
    symbolizer: Option<&'a dyn Symbolizer>,
}

/// Result of building one function's CFG: the blocks and edges discovered,
/// plus every call/tail-call target seen — callers the module-level driver
/// still needs to resolve into `Function`s of their own.
pub struct BuiltFunction {
    pub blocks: Vec<BasicBlock>,
    /// (from, to) edges between blocks of this function, by start address.
    pub edges: Vec<(u64, u64)>,
    pub call_targets: Vec<u64>,
    /// Subset of `call_targets` reached by a tail call (a terminator branch
    /// to an external function) rather than a `call` instruction.
    pub tail_call_targets: Vec<u64>,
}

impl<'a> CfgBuilder<'a> {
    pub fn new(
        disassembler: &'a dyn Disassembler,
        oracle: &'a dyn InstructionOracle,
        budgets: Budgets,
        symbolizer: Option<&'a dyn Symbolizer>,
    ) -> Self {
        CfgBuilder {
            disassembler,
            oracle,
            budgets,
            symbolizer,
        }
    }

    /// True when a terminator branch to `target` should be recorded as a
    /// tail call rather than an intra-function successor edge: either the
    /// symbolizer resolves `target` to an external function directly (a
    /// PLT/stub trampoline that happens to live inside a mapped section), or
    /// `target` has no backing bytes at all in this module.
    fn is_tail_call_target(&self, module: &Module, target: u64) -> bool {
        if let Some(symbolizer) = self.symbolizer {
            if symbolizer.find_external_function_at(target).is_some() {
                return true;
            }
        }
        module.regions.find(target).is_none()
    }

    /// Decode the instruction at `addr`, checking the decode cache first.
    /// The cache itself binary-searches its sorted entries for the longest
    /// cached key that's a prefix of the read window.
    fn decode_at(&self, module: &Module, cache: &mut DecodeCache, addr: u64) -> Option<Instruction> {
        let max_len = self.disassembler.max_instruction_length();
        let bytes = module.regions.read(addr, max_len)?;
        if bytes.is_empty() {
            return None;
        }

        if let Some((len, hit)) = cache.find_longest_prefix(bytes) {
            return Some(rebase(addr, &bytes[..len], &hit));
        }

        match self.disassembler.disassemble_instruction(&Address::va(addr), bytes) {
            Ok(ins) => {
                cache.insert(
                    ins.bytes.clone(),
                    DecodedInstruction {
                        mnemonic: ins.mnemonic.clone(),
                        operands: ins.operands.clone(),
                        length: ins.length,
                        side_effects: ins.side_effects.clone(),
                        groups: ins.groups.clone(),
                    },
                );
                Some(ins)
            }
            Err(e) => {
                warn!(address = format!("{:#x}", addr), error = %e, "decode failed");
                None
            }
        }
    }

    /// Carve the atom covering `start` if one doesn't exist yet, splitting
    /// an already-materialized atom if `start` lands strictly inside it
    /// (e.g. a second function symbol found mid-atom after its neighbor was
    /// already explored).
    fn ensure_atom_boundary(&self, module: &mut Module, start: u64) {
        if let Some(existing) = module.atom_containing(start) {
            if existing.begin() != start {
                if let Err(e) = module.split_atom(start) {
                    warn!(address = format!("{:#x}", start), error = %e, "atom split failed");
                }
            }
        }
    }

    /// Materialize a text atom carrying the exact instruction sequence
    /// decoded for one basic block, so the atom's `(address, size, decoded
    /// instruction)` triples are available for later contiguity checks and
    /// for `Atom::split_at`'s instruction-boundary validation.
    fn insert_text_atom(&self, module: &mut Module, instructions: Vec<AtomInstruction>) {
        let Some(first) = instructions.first() else {
            return;
        };
        let begin = first.address;
        if module.atom_containing(begin).is_some() {
            return;
        }
        let end = instructions
            .last()
            .map(|i| i.address + i.size as u64 - 1)
            .unwrap_or(begin);
        if let Err(e) = module.insert_atom(Atom::Text(TextAtom {
            begin,
            end,
            name: None,
            instructions,
        })) {
            warn!(address = format!("{:#x}", begin), error = %e, "atom insert failed");
        }
    }

    /// Build one function's basic blocks by recursive descent from `entry`.
    pub fn build_function(&self, module: &mut Module, cache: &mut DecodeCache, entry: u64) -> BuiltFunction {
        let mut worklist: VecDeque<u64> = VecDeque::new();
        worklist.push_back(entry);
        let mut seen_starts: BTreeSet<u64> = BTreeSet::new();
        let mut raw_blocks: HashMap<u64, RawBlock> = HashMap::new();
        let mut call_targets: Vec<u64> = Vec::new();
        let mut tail_call_targets: Vec<u64> = Vec::new();
        let mut total_instructions: usize = 0;

        while let Some(start) = worklist.pop_front() {
            if seen_starts.contains(&start) {
                continue;
            }
            if raw_blocks.len() >= self.budgets.max_blocks {
                warn!(entry = format!("{:#x}", entry), "block budget exhausted");
                break;
            }
            seen_starts.insert(start);
            self.ensure_atom_boundary(module, start);

            let mut addr = start;
            let mut end_addr = start;
            let mut instr_count = 0u32;
            let mut successors: Vec<u64> = Vec::new();
            let mut block_instructions: Vec<AtomInstruction> = Vec::new();
            let mut failed = false;

            loop {
                if total_instructions >= self.budgets.max_instructions {
                    failed = true;
                    break;
                }
                if addr != start && module.is_atom_boundary(addr) {
                    successors.push(addr);
                    worklist.push_back(addr);
                    break;
                }

                let ins = match self.decode_at(module, cache, addr) {
                    Some(ins) => ins,
                    None => {
                        failed = true;
                        break;
                    }
                };
                total_instructions += 1;
                instr_count += 1;
                end_addr = addr + ins.length as u64;
                block_instructions.push(AtomInstruction {
                    address: addr,
                    size: ins.length,
                    decoded: DecodedInstruction {
                        mnemonic: ins.mnemonic.clone(),
                        operands: ins.operands.clone(),
                        length: ins.length,
                        side_effects: ins.side_effects.clone(),
                        groups: ins.groups.clone(),
                    },
                });

                if self.oracle.is_call(&ins) {
                    if let Some(target) = self.oracle.evaluate_branch(&ins) {
                        call_targets.push(target);
                    }
                }

                if self.oracle.is_terminator(&ins) {
                    if self.oracle.is_branch(&ins) {
                        if let Some(target) = self.oracle.evaluate_branch(&ins) {
                            if self.is_tail_call_target(module, target) {
                                tail_call_targets.push(target);
                                call_targets.push(target);
                            } else {
                                successors.push(target);
                                worklist.push_back(target);
                            }
                        }
                    }
                    break;
                }

                if self.oracle.is_conditional_branch(&ins) {
                    if let Some(target) = self.oracle.evaluate_branch(&ins) {
                        successors.push(target);
                        worklist.push_back(target);
                    }
                    successors.push(end_addr);
                    worklist.push_back(end_addr);
                    break;
                }

                addr = end_addr;
            }

            if instr_count > 0 {
                self.insert_text_atom(module, block_instructions);
            }

            raw_blocks.insert(
                start,
                RawBlock {
                    end_addr: end_addr.max(start + 1),
                    instructions: instr_count,
                    successors,
                    failed,
                },
            );
        }

        wire_edges(raw_blocks, call_targets, tail_call_targets)
    }
}

/// Phase 3: turn the raw successor-address lists into successor/predecessor
/// id lists and a function-local edge list, dropping successor addresses
/// that never became a block in this function (external/unresolved targets
/// already folded into `call_targets`).
fn wire_edges(raw_blocks: HashMap<u64, RawBlock>, call_targets: Vec<u64>, tail_call_targets: Vec<u64>) -> BuiltFunction {
    let mut predecessors: HashMap<u64, Vec<u64>> = HashMap::new();
    for (&start, block) in &raw_blocks {
        for &succ in &block.successors {
            if raw_blocks.contains_key(&succ) {
                predecessors.entry(succ).or_default().push(start);
            }
        }
    }

    let mut starts: Vec<u64> = raw_blocks.keys().copied().collect();
    starts.sort_unstable();

    let mut blocks = Vec::with_capacity(starts.len());
    let mut edges = Vec::new();

    for start in starts {
        let raw = &raw_blocks[&start];
        let successor_ids: Vec<String> = raw
            .successors
            .iter()
            .filter(|s| raw_blocks.contains_key(s))
            .map(|s| format!("{:x}", s))
            .collect();
        let predecessor_ids: Vec<String> = predecessors
            .get(&start)
            .into_iter()
            .flatten()
            .map(|p| format!("{:x}", p))
            .collect();

        for &succ in &raw.successors {
            if raw_blocks.contains_key(&succ) {
                edges.push((start, succ));
            }
        }

        blocks.push(BasicBlock::new(
            format!("{:x}", start),
            Address::va(start),
            Address::va(raw.end_addr),
            raw.instructions,
            Some(successor_ids),
            Some(predecessor_ids),
            raw.failed,
            start,
        ));
    }

    BuiltFunction {
        blocks,
        edges,
        call_targets,
        tail_call_targets,
    }
}

/// Replay a cached decode at a new address, rebasing nothing but the
/// address — mnemonic, operands (themselves address-independent), and
/// length are exactly what the cache stored.
fn rebase(addr: u64, bytes: &[u8], decoded: &DecodedInstruction) -> Instruction {
    Instruction::new(
        Address::va(addr),
        bytes.to_vec(),
        decoded.mnemonic.clone(),
        decoded.operands.clone(),
        decoded.length,
        "x86_64".to_string(),
        decoded.side_effects.clone(),
        decoded.groups.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binary::Endianness;
    use crate::core::disassembler::Architecture;
    use crate::core::region::{Region, RegionMap};
    use crate::disasm::iced::IcedDisassembler;
    use crate::oracle::IcedOracle;
    use crate::symbolizer::ObjectSymbolizer;

    fn module_with_code(base: u64, code: &[u8]) -> Module {
        let mut regions = RegionMap::new();
        regions.insert(Region::new(base, code.to_vec().into(), Some("__text".to_string()))).unwrap();
        Module::new("test".to_string(), 0, regions)
    }

    #[test]
    fn test_linear_block_ends_at_ret() {
        // nop; nop; ret
        let mut module = module_with_code(0x1000, &[0x90, 0x90, 0xC3]);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let builder = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
        let mut cache = DecodeCache::new();

        let built = builder.build_function(&mut module, &mut cache, 0x1000);
        assert_eq!(built.blocks.len(), 1);
        assert_eq!(built.blocks[0].instruction_count, 3);
        assert!(built.blocks[0].successor_ids.is_empty());
        assert!(module.is_atom_boundary(0x1000));
    }

    #[test]
    fn test_conditional_branch_splits_into_three_blocks() {
        // je +3 (74 03); nop; nop; nop; ret  -- taken target skips the nops
        let mut module = module_with_code(0x2000, &[0x74, 0x03, 0x90, 0x90, 0x90, 0xC3]);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let builder = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
        let mut cache = DecodeCache::new();

        let built = builder.build_function(&mut module, &mut cache, 0x2000);
        // entry block (je), fallthrough block (nop nop nop -> falls into ret target),
        // and the ret block reached both by fallthrough and by the taken branch.
        assert_eq!(built.blocks.len(), 3);
        let entry = built.blocks.iter().find(|b| b.start_address.value == 0x2000).unwrap();
        assert_eq!(entry.successor_ids.len(), 2);
    }

    #[test]
    fn test_tail_call_to_external_is_call_target_not_block_edge() {
        // jmp rel32 to an address far outside the mapped region.
        let mut code = vec![0xE9];
        code.extend_from_slice(&0x0010_0000u32.to_le_bytes());
        let mut module = module_with_code(0x3000, &code);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let builder = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
        let mut cache = DecodeCache::new();

        let built = builder.build_function(&mut module, &mut cache, 0x3000);
        assert_eq!(built.blocks.len(), 1);
        assert!(built.blocks[0].successor_ids.is_empty());
        assert_eq!(built.call_targets.len(), 1);
    }

    #[test]
    fn test_decode_cache_hit_on_repeated_prologue() {
        // Two functions, each starting with `push rbp` (0x55) then `ret`.
        let mut module = module_with_code(0x4000, &[0x55, 0xC3, 0x90, 0x55, 0xC3]);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let builder = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
        let mut cache = DecodeCache::new();

        builder.build_function(&mut module, &mut cache, 0x4000);
        builder.build_function(&mut module, &mut cache, 0x4003);
        cache.flush();
        // `push rbp` (0x55) was decoded at two different addresses; one key.
        assert!(cache.get(&[0x55]).is_some());
        assert_eq!(cache.uniqued(), 2); // {0x55}, {0xC3}
    }

    #[test]
    fn test_stub_in_mapped_region_is_tail_call_via_symbolizer() {
        // jmp rel32 to offset 0x100 inside the SAME mapped region, landing on
        // a PLT/stub trampoline the symbolizer resolves externally — it must
        // be classified as a tail call, not an intra-function successor edge,
        // even though `target` has backing bytes in this module.
        let mut code = vec![0x90u8; 0x101];
        code[0] = 0xE9;
        code[1..5].copy_from_slice(&0x0000_00FBu32.to_le_bytes());
        code[0x100] = 0xC3;
        let mut module = module_with_code(0x5000, &code);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let symbolizer = ObjectSymbolizer::from_pairs(vec![(0x5100, "_extern_func".to_string())]);
        let builder = CfgBuilder::new(&disasm, &oracle, Budgets::default(), Some(&symbolizer));
        let mut cache = DecodeCache::new();

        let built = builder.build_function(&mut module, &mut cache, 0x5000);
        assert_eq!(built.blocks.len(), 1);
        assert!(built.blocks[0].successor_ids.is_empty());
        assert_eq!(built.call_targets, vec![0x5100]);
        assert_eq!(built.tail_call_targets, vec![0x5100]);
    }

    #[test]
    fn test_built_atom_carries_contiguous_instructions() {
        // nop; nop; ret — the materialized text atom must carry all three
        // decoded instructions with no address/size gaps between them.
        let mut module = module_with_code(0x6000, &[0x90, 0x90, 0xC3]);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let builder = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
        let mut cache = DecodeCache::new();

        builder.build_function(&mut module, &mut cache, 0x6000);
        let atom = module.atom_containing(0x6000).unwrap();
        let Atom::Text(text) = atom else {
            panic!("expected a text atom");
        };
        assert_eq!(text.instructions.len(), 3);
        for pair in text.instructions.windows(2) {
            assert_eq!(pair[0].address + pair[0].size as u64, pair[1].address);
        }
    }
}
