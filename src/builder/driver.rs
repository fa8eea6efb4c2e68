//! Module-level driver (component F): a fixpoint closure over every call
//! target discovered while building functions, seeded from entrypoint and
//! symbol-table addresses.
//!
//! The reference algorithm this is ported from only ever walked the first
//! layer of call targets discovered from the seed functions — a newly
//! discovered callee's own callees were never enqueued, so indirect call
//! chains more than one hop from a seed silently went unanalyzed. This
//! driver keeps a real worklist and drains it to a fixpoint instead.

use std::collections::{HashSet, VecDeque};

use tracing::warn;

use crate::core::call_graph::CallType;
use crate::core::decode_cache::DecodeCache;
use crate::core::module::Module;

use super::function_factory::FunctionFactory;
use super::{Budgets, CfgBuilder};

pub struct Driver<'a> {
    cfg: CfgBuilder<'a>,
    factory: FunctionFactory<'a>,
    budgets: Budgets,
}

impl<'a> Driver<'a> {
    pub fn new(cfg: CfgBuilder<'a>, factory: FunctionFactory<'a>, budgets: Budgets) -> Self {
        Driver { cfg, factory, budgets }
    }

    /// Build every function reachable from `seeds`, closing over call
    /// targets discovered along the way until the worklist is empty or the
    /// function budget is exhausted.
    pub fn build_module(&self, module: &mut Module, cache: &mut DecodeCache, seeds: Vec<(u64, Option<String>)>) {
        let mut names: std::collections::HashMap<u64, Option<String>> = seeds.iter().cloned().collect();
        let mut worklist: VecDeque<u64> = seeds.into_iter().map(|(addr, _)| addr).collect();
        let mut processed: HashSet<u64> = HashSet::new();

        while let Some(entry) = worklist.pop_front() {
            if processed.contains(&entry) {
                continue;
            }
            if processed.len() >= self.budgets.max_functions {
                warn!(limit = self.budgets.max_functions, "function budget exhausted");
                break;
            }
            processed.insert(entry);

            let name = names.remove(&entry).flatten();
            let (func, call_targets, tail_call_targets) = self.factory.create(module, &self.cfg, cache, entry, name);
            module.functions.insert(entry, func);

            let caller_id = format!("{:x}", entry);
            module.call_graph.add_node(caller_id.clone());
            for &target in &call_targets {
                let callee_id = format!("{:x}", target);
                module.call_graph.add_node(callee_id.clone());
                let call_type = if tail_call_targets.contains(&target) {
                    CallType::Tail
                } else {
                    CallType::Direct
                };
                module.call_graph.add_simple_edge(caller_id.clone(), callee_id, call_type);
            }

            for target in call_targets {
                if !processed.contains(&target) {
                    worklist.push_back(target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binary::Endianness;
    use crate::core::disassembler::Architecture;
    use crate::core::region::{Region, RegionMap};
    use crate::disasm::iced::IcedDisassembler;
    use crate::oracle::IcedOracle;

    fn module_with_code(base: u64, code: &[u8]) -> Module {
        let mut regions = RegionMap::new();
        regions.insert(Region::new(base, code.to_vec().into(), None)).unwrap();
        Module::new("test".to_string(), 0, regions)
    }

    #[test]
    fn test_fixpoint_discovers_transitive_call() {
        // main: call +5 (to helper at main_end); ret
        // helper (right after main): call +5 (to leaf); ret
        // leaf: ret
        let mut code = Vec::new();
        code.extend_from_slice(&[0xE8, 0x01, 0x00, 0x00, 0x00]); // call 0x1006 (helper)
        code.push(0xC3); // ret
        code.extend_from_slice(&[0xE8, 0x01, 0x00, 0x00, 0x00]); // call 0x100c (leaf)
        code.push(0xC3); // ret
        code.push(0xC3); // leaf: ret
        let mut module = module_with_code(0x1000, &code);

        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
        let factory = FunctionFactory::new(None);
        let driver = Driver::new(cfg, factory, Budgets::default());
        let mut cache = DecodeCache::new();

        driver.build_module(&mut module, &mut cache, vec![(0x1000, Some("main".to_string()))]);

        // main (0x1000) calls 0x1006, which calls 0x100c: all three must be
        // discovered even though 0x100c is two hops from the only seed.
        assert!(module.functions.contains_key(&0x1000));
        assert!(module.functions.contains_key(&0x1006));
        assert!(module.functions.contains_key(&0x100c));
        assert_eq!(module.functions.len(), 3);

        // The call graph must reflect both call edges discovered along the
        // way, not just the function table.
        assert_eq!(module.call_graph.callees(&format!("{:x}", 0x1000u64)), vec![format!("{:x}", 0x1006u64)]);
        assert_eq!(module.call_graph.callees(&format!("{:x}", 0x1006u64)), vec![format!("{:x}", 0x100cu64)]);
    }

    #[test]
    fn test_function_budget_stops_discovery() {
        let mut module = module_with_code(0x2000, &[0xC3]);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let cfg = CfgBuilder::new(&disasm, &oracle, Budgets::default(), None);
        let factory = FunctionFactory::new(None);
        let mut budgets = Budgets::default();
        budgets.max_functions = 0;
        let driver = Driver::new(cfg, factory, budgets);
        let mut cache = DecodeCache::new();

        driver.build_module(&mut module, &mut cache, vec![(0x2000, None)]);
        assert!(module.functions.is_empty());
    }
}
