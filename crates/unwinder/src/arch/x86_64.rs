//! x86-64 entry trampoline layout.
//!
//! The trampoline pushes the frame pointer and the callee-saved registers
//! of the System V ABI before calling into JIT code:
//!
//! ```text
//!     push rbp
//!     mov  rbp, rsp
//!     push rbx
//!     push r12
//!     push r13
//!     push r14
//!     push r15
//! ```
//!
//! A result slot sits between the entry header and the last push, so
//! reading up from the header the saved registers come back as
//! `r15, r14, r13, r12, rbx, rbp`, followed by the trampoline's return
//! address.

use super::ArchDescriptor;
use crate::host::{Memory, read_word};
use crate::{RegisterSet, Result};
use gimli::X86_64;
use object::endian::Endianness;

pub static DESCRIPTOR: ArchDescriptor = ArchDescriptor {
    name: "x86_64",
    sp: "rsp",
    pc: "rip",
    sentinel: "rip",
    entry_pushed: &["rbp", "rbx", "r12", "r13", "r14", "r15"],
    word_size: 8,
    endian: Endianness::Little,
    dwarf: &[
        ("rbx", X86_64::RBX),
        ("rbp", X86_64::RBP),
        ("rsp", X86_64::RSP),
        ("r12", X86_64::R12),
        ("r13", X86_64::R13),
        ("r14", X86_64::R14),
        ("r15", X86_64::R15),
        ("rip", X86_64::RA),
    ],
};

pub fn unwind_entry(memory: &dyn Memory, base: u64) -> Result<RegisterSet> {
    let mut regs = super::unwind_saved_registers(&DESCRIPTOR, memory, base)?;
    // The trampoline's own return address sits right above the saved frame
    // pointer, where the recovered stack pointer points.
    if let Some(sp) = regs.get(DESCRIPTOR.sp) {
        let pc = read_word(memory, DESCRIPTOR.endian, DESCRIPTOR.word_size, sp)?;
        regs.set(DESCRIPTOR.pc, pc);
    }
    Ok(regs)
}
