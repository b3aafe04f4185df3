//! Architecture-specific definitions.
//!
//! Each supported architecture provides an [`ArchDescriptor`] and the
//! unwinder for its entry trampoline, the one frame that isn't described by
//! a frame header and has to be recovered from raw calling-convention
//! knowledge.

use crate::host::{Memory, Registers, read_word};
use crate::{Error, RegisterSet, Result};
use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::vec::Vec;
use object::endian::Endianness;
use target_lexicon::Architecture;

mod aarch64;
mod x86;
mod x86_64;

/// Static description of an architecture.
#[derive(Debug)]
pub struct ArchDescriptor {
    /// Human-readable name.
    pub name: &'static str,
    /// Stack pointer register.
    pub sp: &'static str,
    /// Program counter register.
    pub pc: &'static str,
    /// Register checked to detect that this architecture applies.
    pub sentinel: &'static str,
    /// Registers saved by the entry trampoline, in push order.
    pub entry_pushed: &'static [&'static str],
    /// Size of a machine word in bytes.
    pub word_size: usize,
    /// Byte order of memory words.
    pub endian: Endianness,
    /// DWARF numbers of the registers named above.
    pub dwarf: &'static [(&'static str, gimli::Register)],
}

/// A supported architecture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86.
    X86_64,
    /// 32-bit x86.
    X86,
    /// 64-bit ARM.
    Aarch64,
}

impl Arch {
    /// Every supported architecture.
    pub const ALL: [Arch; 3] = [Arch::X86_64, Arch::X86, Arch::Aarch64];

    /// The static description of this architecture.
    pub fn descriptor(self) -> &'static ArchDescriptor {
        match self {
            Arch::X86_64 => &x86_64::DESCRIPTOR,
            Arch::X86 => &x86::DESCRIPTOR,
            Arch::Aarch64 => &aarch64::DESCRIPTOR,
        }
    }

    /// Maps a target-lexicon architecture onto a supported one.
    pub fn from_architecture(architecture: Architecture) -> Option<Arch> {
        match architecture {
            Architecture::X86_64 => Some(Arch::X86_64),
            Architecture::X86_32(_) => Some(Arch::X86),
            Architecture::Aarch64(_) => Some(Arch::Aarch64),
            _ => None,
        }
    }

    /// The architecture this crate was compiled for, if supported.
    pub fn host() -> Option<Arch> {
        Arch::from_architecture(target_lexicon::HOST.architecture)
    }

    /// DWARF register number of the register called `name`.
    pub fn dwarf_register(self, name: &str) -> Option<gimli::Register> {
        self.descriptor()
            .dwarf
            .iter()
            .find(|(reg, _)| *reg == name)
            .map(|(_, number)| *number)
    }

    /// Recovers the registers the entry trampoline saved, given the address
    /// where its saved registers begin.
    pub fn unwind_entry(self, memory: &dyn Memory, base: u64) -> Result<RegisterSet> {
        match self {
            Arch::X86_64 => x86_64::unwind_entry(memory, base),
            Arch::X86 => x86::unwind_entry(memory, base),
            Arch::Aarch64 => aarch64::unwind_entry(memory, base),
        }
    }
}

/// Reads the trampoline's saved registers starting at `base`.
///
/// The slot at `base` is reserved for the return value marker. The
/// registers follow in pop order, and the recovered stack pointer is the
/// address just past the first register pushed.
fn unwind_saved_registers(
    desc: &ArchDescriptor,
    memory: &dyn Memory,
    base: u64,
) -> Result<RegisterSet> {
    let word = desc.word_size as u64;
    let mut regs = RegisterSet::new();
    let mut slot = base.wrapping_add(word);
    for &name in desc.entry_pushed.iter().rev() {
        let value = read_word(memory, desc.endian, desc.word_size, slot)?;
        log::trace!("entry: {name} = {value:#x} (saved at {slot:#x})");
        regs.set(name, value);
        slot = slot.wrapping_add(word);
    }
    regs.set(desc.sp, slot);
    Ok(regs)
}

/// The set of architectures an unwinder is willing to handle, each with the
/// sentinel register used to detect it.
#[derive(Clone, Debug)]
pub struct Architectures {
    entries: Vec<(Arch, String)>,
}

impl Architectures {
    /// Uses the built-in sentinel register of each architecture.
    pub fn new(archs: impl IntoIterator<Item = Arch>) -> Result<Architectures> {
        Architectures::with_sentinels(
            archs
                .into_iter()
                .map(|arch| (arch, arch.descriptor().sentinel.to_owned())),
        )
    }

    /// Uses the given sentinel registers.
    ///
    /// Fails with [`Error::AmbiguousArchitecture`] if two entries check the
    /// same register, since detection couldn't tell them apart.
    pub fn with_sentinels(
        entries: impl IntoIterator<Item = (Arch, String)>,
    ) -> Result<Architectures> {
        let mut checked: Vec<(Arch, String)> = Vec::new();
        for (arch, sentinel) in entries {
            if let Some((other, _)) = checked.iter().find(|(_, s)| *s == sentinel) {
                return Err(Error::AmbiguousArchitecture {
                    sentinel,
                    first: other.descriptor().name,
                    second: arch.descriptor().name,
                });
            }
            checked.push((arch, sentinel));
        }
        Ok(Architectures { entries: checked })
    }

    /// Picks the first architecture whose sentinel register is readable in
    /// `frame`.
    pub fn detect(&self, frame: &dyn Registers) -> Result<Arch> {
        self.entries
            .iter()
            .find(|(_, sentinel)| frame.read_register(sentinel).is_some())
            .map(|(arch, _)| *arch)
            .ok_or(Error::NoMatchingArchitecture)
    }

    /// The configured architectures, in detection order.
    pub fn iter(&self) -> impl Iterator<Item = Arch> + '_ {
        self.entries.iter().map(|(arch, _)| *arch)
    }
}
