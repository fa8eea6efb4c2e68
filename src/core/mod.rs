//! Core data types: addresses, ranges, memory layout, instructions, and the
//! CFG's output types (basic blocks, functions, call graph).

pub mod address;
pub mod address_range;
pub mod atom;
pub mod basic_block;
pub mod binary;
pub mod call_graph;
pub mod decode_cache;
pub mod disassembler;
pub mod function;
pub mod instruction;
pub mod module;
pub mod region;
pub mod section;
pub mod segment;

pub use address::{Address, AddressKind};
pub use address_range::AddressRange;
pub use atom::{Atom, AtomSplitError, DataAtom, TextAtom};
pub use basic_block::BasicBlock;
pub use binary::{Arch, Endianness, Format};
pub use call_graph::{CallGraph, CallGraphEdge, CallType};
pub use decode_cache::{DecodeCache, DecodedInstruction};
pub use disassembler::{Architecture, Disassembler, DisassemblerConfig, DisassemblerError};
pub use function::{Function, FunctionFlags, FunctionKind};
pub use instruction::{Access, Instruction, Operand, OperandKind, SideEffect};
pub use module::Module;
pub use region::{Region, RegionMap};
pub use section::{Section, SectionPerms};
pub use segment::{Perms, Segment};
