//! 32-bit x86 entry trampoline layout.

use super::ArchDescriptor;
use crate::host::{Memory, read_word};
use crate::{RegisterSet, Result};
use gimli::X86;
use object::endian::Endianness;

pub static DESCRIPTOR: ArchDescriptor = ArchDescriptor {
    name: "x86",
    sp: "esp",
    pc: "eip",
    sentinel: "eip",
    entry_pushed: &["ebp", "ebx", "esi", "edi"],
    word_size: 4,
    endian: Endianness::Little,
    dwarf: &[
        ("esp", X86::ESP),
        ("ebp", X86::EBP),
        ("ebx", X86::EBX),
        ("esi", X86::ESI),
        ("edi", X86::EDI),
        ("eip", X86::RA),
    ],
};

pub fn unwind_entry(memory: &dyn Memory, base: u64) -> Result<RegisterSet> {
    let mut regs = super::unwind_saved_registers(&DESCRIPTOR, memory, base)?;
    if let Some(sp) = regs.get(DESCRIPTOR.sp) {
        let pc = read_word(memory, DESCRIPTOR.endian, DESCRIPTOR.word_size, sp)?;
        regs.set(DESCRIPTOR.pc, pc);
    }
    Ok(regs)
}
