//! Function: an entry address bound to its discovered basic blocks and edges.

use crate::core::address::Address;
use crate::core::address_range::AddressRange;
use crate::core::basic_block::BasicBlock;
use crate::error::BinliftError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of function in binary analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Defined within this module, with a materialized CFG
    Normal,
    /// Resolved against an external symbol, no CFG
    Imported,
    /// Exported and available to other modules
    Exported,
    /// Thunk that jumps straight to another function
    Thunk,
    Library,
    Unknown,
}

impl FunctionKind {
    pub fn value(&self) -> &str {
        match self {
            FunctionKind::Normal => "normal",
            FunctionKind::Imported => "imported",
            FunctionKind::Exported => "exported",
            FunctionKind::Thunk => "thunk",
            FunctionKind::Library => "library",
            FunctionKind::Unknown => "unknown",
        }
    }
}

/// Function flags as bitflags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionFlags(pub u32);

impl FunctionFlags {
    pub const NONE: FunctionFlags = FunctionFlags(0);
    pub const NO_RETURN: FunctionFlags = FunctionFlags(1);
    pub const HAS_SEH: FunctionFlags = FunctionFlags(2);
    pub const HAS_EH: FunctionFlags = FunctionFlags(4);
    pub const IS_VARIADIC: FunctionFlags = FunctionFlags(8);
    pub const IS_INLINE: FunctionFlags = FunctionFlags(16);
    pub const IS_NAKED: FunctionFlags = FunctionFlags(32);
    pub const IS_CONSTRUCTOR: FunctionFlags = FunctionFlags(64);
    pub const IS_DESTRUCTOR: FunctionFlags = FunctionFlags(128);
}

impl std::ops::BitOr for FunctionFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        FunctionFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for FunctionFlags {
    type Output = bool;
    fn bitand(self, rhs: Self) -> Self::Output {
        (self.0 & rhs.0) != 0
    }
}

/// A function discovered by the CFG builder, bound to its entry address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub entry_point: Address,
    pub kind: FunctionKind,
    pub range: Option<AddressRange>,
    pub size: Option<u64>,
    pub flags: FunctionFlags,
    /// Module name for imported functions
    pub module: Option<String>,
    pub ordinal: Option<u32>,
    pub thunk_target: Option<Address>,
    pub calling_convention: Option<String>,
    pub signature: Option<String>,
    pub basic_blocks: Vec<BasicBlock>,
    /// Edges between basic blocks (from_addr, to_addr)
    pub edges: Vec<(Address, Address)>,
    pub callers: HashSet<Address>,
    pub callees: HashSet<Address>,
    pub stack_frame_size: Option<u64>,
    pub local_vars_size: Option<u64>,
    pub saved_regs_size: Option<u64>,
    pub max_call_depth: Option<u32>,
}

impl Function {
    pub fn new(name: String, entry_point: Address, kind: FunctionKind) -> Result<Self, BinliftError> {
        Ok(Function {
            name,
            entry_point,
            kind,
            range: None,
            size: None,
            flags: FunctionFlags::NONE,
            module: None,
            ordinal: None,
            thunk_target: None,
            calling_convention: None,
            signature: None,
            basic_blocks: Vec::new(),
            edges: Vec::new(),
            callers: HashSet::new(),
            callees: HashSet::new(),
            stack_frame_size: None,
            local_vars_size: None,
            saved_regs_size: None,
            max_call_depth: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_full(
        name: String,
        entry_point: Address,
        kind: FunctionKind,
        range: Option<AddressRange>,
        flags: FunctionFlags,
        module: Option<String>,
        ordinal: Option<u32>,
        thunk_target: Option<Address>,
        calling_convention: Option<String>,
        signature: Option<String>,
        stack_frame_size: Option<u64>,
        local_vars_size: Option<u64>,
        saved_regs_size: Option<u64>,
        max_call_depth: Option<u32>,
    ) -> Result<Self, BinliftError> {
        if kind == FunctionKind::Thunk && thunk_target.is_none() {
            return Err(BinliftError::InvalidInput(
                "Thunk functions must have a target".to_string(),
            ));
        }

        let size = range.as_ref().map(|r| r.size);

        Ok(Function {
            name,
            entry_point,
            kind,
            range,
            size,
            flags,
            module,
            ordinal,
            thunk_target,
            calling_convention,
            signature,
            basic_blocks: Vec::new(),
            edges: Vec::new(),
            callers: HashSet::new(),
            callees: HashSet::new(),
            stack_frame_size,
            local_vars_size,
            saved_regs_size,
            max_call_depth,
        })
    }

    pub fn add_basic_block(&mut self, block: BasicBlock) {
        self.basic_blocks.push(block);
    }

    pub fn add_edge(&mut self, from: Address, to: Address) {
        self.edges.push((from, to));
    }

    pub fn add_caller(&mut self, caller: Address) {
        self.callers.insert(caller);
    }

    pub fn add_callee(&mut self, callee: Address) {
        self.callees.insert(callee);
    }

    pub fn has_flag(&self, flag: FunctionFlags) -> bool {
        self.flags & flag
    }

    pub fn add_flag(&mut self, flag: FunctionFlags) {
        self.flags = FunctionFlags(self.flags.0 | flag.0);
    }

    pub fn remove_flag(&mut self, flag: FunctionFlags) {
        self.flags = FunctionFlags(self.flags.0 & !flag.0);
    }

    /// Span of the function's code, from the entry point to the furthest
    /// block end discovered so far.
    pub fn calculate_size(&self) -> u64 {
        if let Some(size) = self.size {
            return size;
        }
        if self.basic_blocks.is_empty() {
            return 0;
        }
        let min_start = self.entry_point.value;
        let max_end = self
            .basic_blocks
            .iter()
            .map(|b| b.end_address.value)
            .max()
            .unwrap_or(min_start);
        max_end.saturating_sub(min_start)
    }

    /// M = E - N + 2P, with P = 1 for a single function.
    pub fn cyclomatic_complexity(&self) -> u32 {
        let edges = self.edges.len() as u32;
        let nodes = self.basic_blocks.len() as u32;
        if nodes == 0 {
            return 0;
        }
        edges.saturating_sub(nodes).saturating_add(2)
    }

    pub fn to_json_string(&self) -> Result<String, BinliftError> {
        serde_json::to_string(self).map_err(|e| BinliftError::Serialization(e.to_string()))
    }

    pub fn from_json_str(json_str: &str) -> Result<Self, BinliftError> {
        serde_json::from_str(json_str).map_err(|e| BinliftError::Serialization(e.to_string()))
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>, BinliftError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| BinliftError::Serialization(e.to_string()))
    }

    pub fn from_bincode(data: &[u8]) -> Result<Self, BinliftError> {
        bincode::serde::decode_from_slice(data, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(|e| BinliftError::Serialization(e.to_string()))
    }
}
