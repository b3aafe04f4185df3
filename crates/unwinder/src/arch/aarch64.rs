//! AArch64 entry trampoline layout.
//!
//! The frame record (`x29`, `x30`) is pushed first, followed by the
//! callee-saved general purpose registers. There is no return address on
//! the stack: the caller resumes at the saved link register.

use super::ArchDescriptor;
use crate::host::Memory;
use crate::{RegisterSet, Result};
use gimli::AArch64;
use object::endian::Endianness;

pub static DESCRIPTOR: ArchDescriptor = ArchDescriptor {
    name: "aarch64",
    sp: "sp",
    pc: "pc",
    sentinel: "x30",
    entry_pushed: &[
        "x29", "x30", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26", "x27", "x28",
    ],
    word_size: 8,
    endian: Endianness::Little,
    dwarf: &[
        ("x19", AArch64::X19),
        ("x20", AArch64::X20),
        ("x21", AArch64::X21),
        ("x22", AArch64::X22),
        ("x23", AArch64::X23),
        ("x24", AArch64::X24),
        ("x25", AArch64::X25),
        ("x26", AArch64::X26),
        ("x27", AArch64::X27),
        ("x28", AArch64::X28),
        ("x29", AArch64::X29),
        ("x30", AArch64::X30),
        ("sp", AArch64::SP),
        ("pc", AArch64::PC),
    ],
};

pub fn unwind_entry(memory: &dyn Memory, base: u64) -> Result<RegisterSet> {
    let mut regs = super::unwind_saved_registers(&DESCRIPTOR, memory, base)?;
    if let Some(lr) = regs.get("x30") {
        regs.set(DESCRIPTOR.pc, lr);
    }
    Ok(regs)
}
