//! Atom Store (component B): the unit the CFG Builder carves basic blocks
//! out of. Every byte of a module's mapped address space belongs to at most
//! one atom — a contiguous run of either code (`TextAtom`) or data
//! (`DataAtom`) — tracked with an INCLUSIVE `end`, unlike `BasicBlock`'s
//! exclusive `end_address`.

use serde::{Deserialize, Serialize};

use crate::core::decode_cache::DecodedInstruction;

/// One decoded instruction's place inside a `TextAtom`: the ordered sequence
/// a text atom carries is exactly `(address, size, decoded instruction)`
/// triples, which is also what `Atom::split_at` checks a split address
/// against to detect a mid-instruction split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomInstruction {
    pub address: u64,
    pub size: u16,
    pub decoded: DecodedInstruction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAtom {
    pub begin: u64,
    pub end: u64,
    pub name: Option<String>,
    /// Ordered decoded instructions covering `[begin, end]`, in address
    /// order with no gaps: `instructions[i].address + instructions[i].size
    /// == instructions[i+1].address`. Empty for atoms materialized without
    /// instruction-level detail (e.g. a coarse pre-pass's section sweep) —
    /// `split_at` falls back to a pure range check in that case, since there
    /// is nothing recorded to validate a split address against.
    #[serde(default)]
    pub instructions: Vec<AtomInstruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAtom {
    pub begin: u64,
    pub end: u64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Atom {
    Text(TextAtom),
    Data(DataAtom),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomSplitError {
    /// The split address does not fall strictly inside `(begin, end]` —
    /// splitting there would produce an empty half.
    OutOfRange { begin: u64, end: u64, at: u64 },
    /// The atom carries a recorded instruction list and `at` does not match
    /// any instruction's address — a genuine mid-instruction split, fatal
    /// per §7 ("indicates a builder bug").
    NotInstructionBoundary { at: u64 },
}

impl std::fmt::Display for AtomSplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomSplitError::OutOfRange { begin, end, at } => write!(
                f,
                "split address {:#x} not strictly inside atom [{:#x}, {:#x}]",
                at, begin, end
            ),
            AtomSplitError::NotInstructionBoundary { at } => {
                write!(f, "split address {:#x} does not fall on an instruction boundary", at)
            }
        }
    }
}

impl std::error::Error for AtomSplitError {}

impl Atom {
    pub fn begin(&self) -> u64 {
        match self {
            Atom::Text(t) => t.begin,
            Atom::Data(d) => d.begin,
        }
    }

    pub fn end(&self) -> u64 {
        match self {
            Atom::Text(t) => t.end,
            Atom::Data(d) => d.end,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Atom::Text(t) => t.name.as_deref(),
            Atom::Data(d) => d.name.as_deref(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Atom::Text(_))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Atom::Data(_))
    }

    /// Inclusive size in bytes.
    pub fn size(&self) -> u64 {
        self.end() - self.begin() + 1
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.begin() && addr <= self.end()
    }

    /// Split this atom into `[begin, at-1]` and `[at, end]`. If this is a
    /// text atom with a recorded instruction list, `at` must land exactly on
    /// one of those instructions' addresses — anything else is a genuine
    /// mid-instruction split and fails with `NotInstructionBoundary`. An
    /// atom with no recorded instructions (nothing to validate against)
    /// only gets the range check.
    pub fn split_at(&self, at: u64) -> Result<(Atom, Atom), AtomSplitError> {
        let (begin, end, name) = (self.begin(), self.end(), self.name().map(|s| s.to_string()));
        if at <= begin || at > end {
            return Err(AtomSplitError::OutOfRange { begin, end, at });
        }
        if let Atom::Text(t) = self {
            if !t.instructions.is_empty() && !t.instructions.iter().any(|i| i.address == at) {
                return Err(AtomSplitError::NotInstructionBoundary { at });
            }
        }
        match self {
            Atom::Text(t) => {
                let (before, after): (Vec<_>, Vec<_>) = t.instructions.iter().cloned().partition(|i| i.address < at);
                let first = Atom::Text(TextAtom {
                    begin,
                    end: at - 1,
                    name,
                    instructions: before,
                });
                let second = Atom::Text(TextAtom {
                    begin: at,
                    end,
                    name: None,
                    instructions: after,
                });
                Ok((first, second))
            }
            Atom::Data(_) => {
                let first = Atom::Data(DataAtom { begin, end: at - 1, name });
                let second = Atom::Data(DataAtom { begin: at, end, name: None });
                Ok((first, second))
            }
        }
    }
}
