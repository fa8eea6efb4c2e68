//! External-symbol resolution (spec §6's `findExternalFunctionAt`).
//!
//! The CFG Builder treats branch/call targets that land outside any mapped
//! text atom as calls to external functions — stubs the linker will resolve
//! at load time. `Symbolizer` answers "is there a name for this address",
//! grounded on `object`'s generic symbol table rather than Mach-O's
//! `nlist`/`dysymtab` directly, since `object::read::macho` already exposes
//! undefined symbols through the same `Object::symbols()` iterator as every
//! other format.

use object::{Object, ObjectSymbol, SymbolKind};

/// Resolves a virtual address to the name of an external symbol, if any.
pub trait Symbolizer {
    /// Returns the external symbol's name if `addr` is not backed by any
    /// defined code in this module — i.e. it is an import, a PLT/stub entry,
    /// or otherwise a symbol the linker must resolve.
    fn find_external_function_at(&self, addr: u64) -> Option<String>;
}

/// `Symbolizer` backed by one parsed `object::File`'s symbol table.
pub struct ObjectSymbolizer {
    /// (address, demangled-ish name) pairs for undefined function symbols,
    /// sorted by address for binary search.
    undefined: Vec<(u64, String)>,
}

impl ObjectSymbolizer {
    pub fn new(data: &[u8]) -> Option<Self> {
        use object::read::Object as _;
        let obj = object::read::File::parse(data).ok()?;
        let mut undefined: Vec<(u64, String)> = obj
            .symbols()
            .filter(|s| s.is_undefined() && matches!(s.kind(), SymbolKind::Text | SymbolKind::Unknown))
            .filter_map(|s| {
                let name = s.name().ok()?.to_string();
                if name.is_empty() {
                    return None;
                }
                Some((s.address(), name))
            })
            .collect();
        undefined.sort_by_key(|(addr, _)| *addr);
        Some(ObjectSymbolizer { undefined })
    }

    /// Build directly from a slice of (address, name) pairs, bypassing
    /// `object` parsing — used when the Mach-O shim has already resolved
    /// stub/lazy-pointer addresses to names itself.
    pub fn from_pairs(mut pairs: Vec<(u64, String)>) -> Self {
        pairs.sort_by_key(|(addr, _)| *addr);
        ObjectSymbolizer { undefined: pairs }
    }
}

impl Symbolizer for ObjectSymbolizer {
    fn find_external_function_at(&self, addr: u64) -> Option<String> {
        self.undefined
            .binary_search_by_key(&addr, |(a, _)| *a)
            .ok()
            .map(|idx| self.undefined[idx].1.clone())
    }
}
