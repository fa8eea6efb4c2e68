//! `Module`: the output of building a CFG from one Mach-O object file —
//! the region map backing its bytes, the atom store carved out of it, and
//! the functions discovered by the CFG builder.

use std::collections::{BTreeSet, HashMap};

use crate::core::atom::{Atom, AtomSplitError, TextAtom};
use crate::core::call_graph::CallGraph;
use crate::core::function::Function;
use crate::core::region::RegionMap;

/// Owns the atom store (component B) and the function table the builder
/// populates. Atoms are kept sorted by `begin` for binary-search lookup, the
/// same discipline `RegionMap` uses for regions.
pub struct Module {
    pub name: String,
    /// ASLR slide applied to every virtual address derived from this module.
    pub slide: i64,
    pub regions: RegionMap,
    atoms: Vec<Atom>,
    pub functions: HashMap<u64, Function>,
    /// Inter-procedural call relationships, populated by the module-level
    /// driver as it builds each function: one node per function entry or
    /// call target, one edge per call site (direct or tail).
    pub call_graph: CallGraph,
}

impl Module {
    pub fn new(name: String, slide: i64, regions: RegionMap) -> Self {
        Module {
            name,
            slide,
            regions,
            atoms: Vec::new(),
            functions: HashMap::new(),
            call_graph: CallGraph::new(),
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Insert an atom, rejecting overlap with any existing atom.
    pub fn insert_atom(&mut self, atom: Atom) -> Result<(), String> {
        let idx = self.atoms.partition_point(|a| a.begin() < atom.begin());
        if let Some(prev) = idx.checked_sub(1).and_then(|i| self.atoms.get(i)) {
            if prev.end() >= atom.begin() {
                return Err(format!(
                    "atom at {:#x} overlaps previous atom ending at {:#x}",
                    atom.begin(),
                    prev.end()
                ));
            }
        }
        if let Some(next) = self.atoms.get(idx) {
            if atom.end() >= next.begin() {
                return Err(format!(
                    "atom at {:#x} overlaps next atom starting at {:#x}",
                    atom.begin(),
                    next.begin()
                ));
            }
        }
        self.atoms.insert(idx, atom);
        Ok(())
    }

    /// Find the atom whose `[begin, end]` covers `addr`.
    pub fn atom_containing(&self, addr: u64) -> Option<&Atom> {
        let idx = self.atoms.partition_point(|a| a.begin() <= addr);
        idx.checked_sub(1)
            .and_then(|i| self.atoms.get(i))
            .filter(|a| a.contains(addr))
    }

    fn atom_index_containing(&self, addr: u64) -> Option<usize> {
        let idx = self.atoms.partition_point(|a| a.begin() <= addr);
        idx.checked_sub(1)
            .filter(|&i| self.atoms[i].contains(addr))
    }

    /// Split the atom containing `at` into two, in place. Used by the CFG
    /// builder when it discovers a branch target that lands inside an
    /// already-materialized atom at a verified instruction boundary.
    pub fn split_atom(&mut self, at: u64) -> Result<(), AtomSplitError> {
        let idx = match self.atom_index_containing(at) {
            Some(i) => i,
            None => {
                return Err(AtomSplitError::OutOfRange {
                    begin: 0,
                    end: 0,
                    at,
                })
            }
        };
        let (first, second) = self.atoms[idx].split_at(at)?;
        self.atoms.splice(idx..=idx, [first, second]);
        Ok(())
    }

    /// True when `at` already sits at an atom boundary — no split needed.
    pub fn is_atom_boundary(&self, at: u64) -> bool {
        self.atoms.iter().any(|a| a.begin() == at)
    }

    /// Sorted set of every text atom's start address — the candidate
    /// function starts this module currently knows about, whether they were
    /// carved out by the CFG builder or by a `withCFG=false` linear sweep.
    pub fn find_function_starts(&self) -> BTreeSet<u64> {
        self.atoms.iter().filter(|a| a.is_text()).map(|a| a.begin()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atom::DataAtom;

    fn module() -> Module {
        Module::new("test".to_string(), 0, RegionMap::new())
    }

    #[test]
    fn test_insert_and_find_atom() {
        let mut m = module();
        m.insert_atom(Atom::Text(TextAtom {
            begin: 0x1000,
            end: 0x100f,
            name: Some("f".to_string()),
            instructions: vec![],
        }))
        .unwrap();
        assert!(m.atom_containing(0x1005).is_some());
        assert!(m.atom_containing(0x2000).is_none());
    }

    #[test]
    fn test_insert_overlap_rejected() {
        let mut m = module();
        m.insert_atom(Atom::Text(TextAtom {
            begin: 0x1000,
            end: 0x100f,
            name: None,
            instructions: vec![],
        }))
        .unwrap();
        let err = m.insert_atom(Atom::Data(DataAtom {
            begin: 0x1005,
            end: 0x1020,
            name: None,
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_split_atom_in_place() {
        let mut m = module();
        m.insert_atom(Atom::Text(TextAtom {
            begin: 0x1000,
            end: 0x100f,
            name: Some("f".to_string()),
            instructions: vec![],
        }))
        .unwrap();
        m.split_atom(0x1008).unwrap();
        assert_eq!(m.atoms().len(), 2);
        assert!(m.is_atom_boundary(0x1008));
        assert_eq!(m.atom_containing(0x1000).unwrap().end(), 0x1007);
        assert_eq!(m.atom_containing(0x1008).unwrap().end(), 0x100f);
    }

    #[test]
    fn test_split_missing_atom_errors() {
        let mut m = module();
        assert!(m.split_atom(0x5000).is_err());
    }
}
