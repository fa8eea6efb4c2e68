//! End-to-end CFG recovery scenarios against hand-assembled x86-64 byte
//! sequences: one test per testable scenario, each exercising the builder,
//! the atom store, the decode cache, the symbolizer, or the fixpoint
//! driver the way a real Mach-O object file would.

use binlift::builder::driver::Driver;
use binlift::builder::function_factory::FunctionFactory;
use binlift::builder::{Budgets, CfgBuilder};
use binlift::core::atom::{Atom, TextAtom};
use binlift::core::binary::Endianness;
use binlift::core::decode_cache::DecodeCache;
use binlift::core::disassembler::Architecture;
use binlift::core::module::Module;
use binlift::core::region::{Region, RegionMap};
use binlift::disasm::iced::IcedDisassembler;
use binlift::oracle::IcedOracle;
use binlift::symbolizer::ObjectSymbolizer;

fn module_with_code(base: u64, code: &[u8]) -> Module {
    let mut regions = RegionMap::new();
    regions
        .insert(Region::new(base, code.to_vec().into(), Some("__text".to_string())))
        .unwrap();
    Module::new("test".to_string(), 0, regions)
}

fn x86_64() -> (IcedDisassembler, IcedOracle) {
    (
        IcedDisassembler::new(Architecture::X86_64, Endianness::Little),
        IcedOracle::new(Architecture::X86_64),
    )
}

#[test]
fn scenario_1_linear_block_has_no_branches() {
    // nop; nop; ret
    let mut module = module_with_code(0x1000, &[0x90, 0x90, 0xC3]);
    let (disasm, oracle) = x86_64();
    let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
    let mut cache = DecodeCache::new();

    let built = cfg.build_function(&mut module, &mut cache, 0x1000);
    assert_eq!(built.blocks.len(), 1);
    assert_eq!(built.blocks[0].instruction_count, 3);
    assert!(built.blocks[0].is_exit_block());
    assert_eq!(built.blocks[0].start_address.value, 0x1000);
    assert_eq!(built.blocks[0].end_address.value, 0x1003);
}

#[test]
fn scenario_2_conditional_branch_produces_both_edges() {
    // je +3 (skips three nops); nop; nop; nop; ret
    let mut module = module_with_code(0x2000, &[0x74, 0x03, 0x90, 0x90, 0x90, 0xC3]);
    let (disasm, oracle) = x86_64();
    let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
    let mut cache = DecodeCache::new();

    let built = cfg.build_function(&mut module, &mut cache, 0x2000);
    let entry = built
        .blocks
        .iter()
        .find(|b| b.start_address.value == 0x2000)
        .expect("entry block must be present");
    assert_eq!(entry.successor_ids.len(), 2, "both taken and fallthrough edges must be wired");
    assert!(entry.has_successor("2005")); // taken: je target
    assert!(entry.has_successor("2002")); // fallthrough
}

#[test]
fn scenario_3_atom_split_when_second_function_starts_mid_atom() {
    // Two 8-byte functions back to back: nop*7; ret, twice.
    let mut code = vec![0x90; 7];
    code.push(0xC3);
    code.extend(vec![0x90; 7]);
    code.push(0xC3);
    let mut module = module_with_code(0x5000, &code);

    // Simulate a coarser prior pass that only identified the outer bounds
    // of the contiguous code run, not each function's start.
    module
        .insert_atom(Atom::Text(TextAtom {
            begin: 0x5000,
            end: 0x500f,
            name: None,
            instructions: vec![],
        }))
        .unwrap();

    let (disasm, oracle) = x86_64();
    let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
    let mut cache = DecodeCache::new();

    cfg.build_function(&mut module, &mut cache, 0x5000);
    assert!(!module.is_atom_boundary(0x5008), "not split until the second entry is explored");

    cfg.build_function(&mut module, &mut cache, 0x5008);
    assert!(module.is_atom_boundary(0x5008));
    assert_eq!(module.atoms().len(), 2);
    assert_eq!(module.atom_containing(0x5000).unwrap().end(), 0x5007);
    assert_eq!(module.atom_containing(0x5008).unwrap().end(), 0x500f);
}

#[test]
fn scenario_4_tail_call_resolves_through_symbolizer() {
    // jmp rel32 from the function body to a PLT/stub trampoline that lives
    // in its own mapped section. Region membership alone would misclassify
    // this as an ordinary intra-function edge since the target has backing
    // bytes; only consulting the symbolizer reveals it resolves externally.
    let mut code = vec![0xE9];
    code.extend_from_slice(&0x0000_2FFBu32.to_le_bytes());
    let mut regions = RegionMap::new();
    regions
        .insert(Region::new(0x6000, code.into(), Some("__text".to_string())))
        .unwrap();
    regions
        .insert(Region::new(0x9000, vec![0xC3].into(), Some("__stubs".to_string())))
        .unwrap();
    let mut module = Module::new("test".to_string(), 0, regions);

    let (disasm, oracle) = x86_64();
    let symbolizer = ObjectSymbolizer::from_pairs(vec![(0x9000, "_printf".to_string())]);
    let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), Some(&symbolizer));
    let mut cache = DecodeCache::new();

    let built = cfg.build_function(&mut module, &mut cache, 0x6000);
    assert!(
        built.blocks[0].successor_ids.is_empty(),
        "tail call through a stub resolved by the symbolizer is not a block edge"
    );
    assert_eq!(built.call_targets, vec![0x9000]);
    assert_eq!(built.tail_call_targets, vec![0x9000]);
}

#[test]
fn scenario_5_decode_cache_hits_across_identical_prologues() {
    // push rbp; mov rbp, rsp; ret, twice, at different addresses.
    let prologue = [0x55u8, 0x48, 0x89, 0xE5, 0xC3];
    let mut code = Vec::new();
    code.extend_from_slice(&prologue);
    code.extend_from_slice(&prologue);
    let mut module = module_with_code(0x7000, &code);
    let (disasm, oracle) = x86_64();
    let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
    let mut cache = DecodeCache::new();

    cfg.build_function(&mut module, &mut cache, 0x7000);
    cfg.build_function(&mut module, &mut cache, 0x7005);
    cache.flush();

    // push rbp / mov rbp,rsp / ret: three distinct keys, each seen twice.
    assert_eq!(cache.uniqued(), 3);
    assert!(cache.get(&[0x55]).is_some());
    assert!(cache.get(&[0x48, 0x89, 0xE5]).is_some());
}

#[test]
fn scenario_6_fixpoint_discovers_callee_absent_from_seeds() {
    // main: call rel32 to the function right after its own ret; ret.
    let mut code = Vec::new();
    code.extend_from_slice(&[0xE8, 0x01, 0x00, 0x00, 0x00]);
    code.push(0xC3);
    code.push(0xC3); // callee, never seeded directly
    let mut module = module_with_code(0x8000, &code);

    let (disasm, oracle) = x86_64();
    let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
    let factory = FunctionFactory::new(None);
    let driver = Driver::new(cfg, factory, Budgets::default());
    let mut cache = DecodeCache::new();

    driver.build_module(&mut module, &mut cache, vec![(0x8000, Some("main".to_string()))]);

    assert_eq!(module.functions.len(), 2);
    assert!(module.functions.contains_key(&0x8006));
}
