//! Single-instruction decoder backends.
//!
//! - `iced` — x86/x86-64, via `iced-x86`
//! - `capstone` — ARM/AArch64, MIPS, PPC, RISC-V
//! - `registry` — picks a backend by `Architecture`

pub mod capstone;
pub mod iced;
pub mod registry;
