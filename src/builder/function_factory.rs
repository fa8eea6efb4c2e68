//! Function Factory (component E): binds one entry address to a `Function`,
//! short-circuiting for addresses that resolve to an external symbol rather
//! than running the CFG builder against bytes that don't exist.

use crate::core::address::Address;
use crate::core::decode_cache::DecodeCache;
use crate::core::function::{Function, FunctionKind};
use crate::core::module::Module;
use crate::symbolizer::Symbolizer;

use super::CfgBuilder;

pub struct FunctionFactory<'a> {
    symbolizer: Option<&'a dyn Symbolizer>,
}

impl<'a> FunctionFactory<'a> {
    pub fn new(symbolizer: Option<&'a dyn Symbolizer>) -> Self {
        FunctionFactory { symbolizer }
    }

    /// Build (or short-circuit) the function at `entry`. Returns the
    /// function, every call target its CFG discovered, and the subset of
    /// those reached by a tail call, so the driver can fold call targets
    /// into its fixpoint worklist and populate the call graph with the
    /// right `CallType` for each edge.
    pub fn create(
        &self,
        module: &mut Module,
        cfg: &CfgBuilder,
        cache: &mut DecodeCache,
        entry: u64,
        name: Option<String>,
    ) -> (Function, Vec<u64>, Vec<u64>) {
        if let Some(sym_name) = self.symbolizer.and_then(|s| s.find_external_function_at(entry)) {
            let func = Function::new(sym_name, Address::va(entry), FunctionKind::Imported)
                .expect("Imported functions never require a thunk target");
            return (func, Vec::new(), Vec::new());
        }

        let built = cfg.build_function(module, cache, entry);
        let fn_name = name.unwrap_or_else(|| format!("sub_{:x}", entry));
        let mut func = Function::new(fn_name, Address::va(entry), FunctionKind::Normal)
            .expect("Normal functions never require a thunk target");

        for block in built.blocks {
            func.add_basic_block(block);
        }
        for (from, to) in &built.edges {
            func.add_edge(Address::va(*from), Address::va(*to));
        }
        for target in &built.call_targets {
            func.add_callee(Address::va(*target));
        }
        func.size = Some(func.calculate_size());

        (func, built.call_targets, built.tail_call_targets)
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
    use crate::symbolizer::ObjectSymbolizer;

    fn module_with_code(base: u64, code: &[u8]) -> Module {
        let mut regions = RegionMap::new();
        regions.insert(Region::new(base, code.to_vec().into(), None)).unwrap();
        Module::new("test".to_string(), 0, regions)
    }

    #[test]
    fn test_external_symbol_short_circuits_cfg() {
        let mut module = module_with_code(0x1000, &[0x90, 0xC3]);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let cfg = CfgBuilder::new(&disasm, &oracle, super::super::Budgets::default(), None);
        let mut cache = DecodeCache::new();
        let symbolizer = ObjectSymbolizer::from_pairs(vec![(0x1000, "_imported".to_string())]);
        let factory = FunctionFactory::new(Some(&symbolizer));

        let (func, targets, tail_targets) = factory.create(&mut module, &cfg, &mut cache, 0x1000, None);
        assert_eq!(func.kind, FunctionKind::Imported);
        assert_eq!(func.name, "_imported");
        assert!(func.basic_blocks.is_empty());
        assert!(targets.is_empty());
        assert!(tail_targets.is_empty());
    }

    #[test]
    fn test_local_entry_builds_normal_function() {
        let mut module = module_with_code(0x2000, &[0x90, 0xC3]);
        let disasm = IcedDisassembler::new(Architecture::X86_64, Endianness::Little);
        let oracle = IcedOracle::new(Architecture::X86_64);
        let cfg = CfgBuilder::new(&disasm, &oracle, super::super::Budgets::default(), None);
        let mut cache = DecodeCache::new();
        let factory = FunctionFactory::new(None);

        let (func, _, _) = factory.create(&mut module, &cfg, &mut cache, 0x2000, Some("main".to_string()));
        assert_eq!(func.kind, FunctionKind::Normal);
        assert_eq!(func.name, "main");
        assert_eq!(func.basic_blocks.len(), 1);
        assert_eq!(func.size, Some(2));
    }
}
