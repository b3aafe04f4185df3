//! Collaborators supplied by the debugging host.
//!
//! The engine never touches the inspected process itself. Registers, memory,
//! type metadata, and knowledge about which code is native all come through
//! the traits below, which keeps the engine testable against synthetic
//! stack images.

use crate::{Error, FrameId, RegisterSet, Result};
use alloc::string::String;
use alloc::vec::Vec;
use object::endian::{Endian, Endianness};

/// Identity of a thread in the inspected process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

/// Marker error for a failed memory read; the engine attaches the address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Unreadable;

/// Raw access to the inspected process's memory.
pub trait Memory {
    /// Fill `buf` with the bytes starting at `address`.
    fn read_memory(&self, address: u64, buf: &mut [u8]) -> Result<(), Unreadable>;
}

/// Read a `word_size`-byte integer at `address` in the given byte order.
pub fn read_word(
    memory: &dyn Memory,
    endian: Endianness,
    word_size: usize,
    address: u64,
) -> Result<u64> {
    let err = || Error::MemoryRead {
        address,
        len: word_size,
    };
    match word_size {
        4 => {
            let mut bytes = [0; 4];
            memory.read_memory(address, &mut bytes).map_err(|_| err())?;
            Ok(u64::from(endian.read_u32(bytes)))
        }
        8 => {
            let mut bytes = [0; 8];
            memory.read_memory(address, &mut bytes).map_err(|_| err())?;
            Ok(endian.read_u64(bytes))
        }
        _ => unreachable!("unsupported word size {word_size}"),
    }
}

/// Register access for the frame being unwound.
pub trait Registers {
    /// Value of the register called `name`, or `None` if it isn't available
    /// in this frame.
    fn read_register(&self, name: &str) -> Option<u64>;
}

/// The frame the host asks the engine to unwind.
pub trait PendingFrame: Registers {
    /// Host token describing how to resume the generic walk.
    type UnwindInfo;

    /// Build the host's token from a frame id and the caller's registers.
    fn create_unwind_info(&self, id: FrameId, registers: &RegisterSet) -> Self::UnwindInfo;
}

/// Whether an address belongs to native (non-JIT) code.
pub trait NativeCode {
    /// Returns `true` if `pc` lies in a shared library or the main
    /// executable's text.
    fn contains(&self, pc: u64) -> bool;
}

/// The running process being inspected.
pub trait Inferior: Memory {
    /// The thread the host is currently walking.
    fn selected_thread(&self) -> ThreadId;

    /// Address of the thread-local variable called `symbol` for the
    /// selected thread.
    fn thread_local_address(&self, symbol: &str) -> Option<u64>;

    /// Whether `pc` belongs to native code, or `None` if the host can't say
    /// reliably.
    fn native_code_contains(&self, _pc: u64) -> Option<bool> {
        None
    }

    /// Operating system process id, used to locate the memory map.
    fn process_id(&self) -> Option<u32> {
        None
    }
}

/// Size and field offsets of one structure type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeLayout {
    /// Size in bytes.
    pub size: u64,
    /// `(field name, byte offset)` pairs.
    pub fields: Vec<(String, u64)>,
}

impl TypeLayout {
    /// Offset of the field called `name`.
    pub fn field_offset(&self, name: &str) -> Option<u64> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, offset)| *offset)
    }
}

/// Compiled metadata of the inspected process, queried once at load time.
pub trait TypeMetadata {
    /// Layout of the structure type called `name`.
    fn type_layout(&self, name: &str) -> Option<TypeLayout>;

    /// Enumerators of the enum called `name`, in declaration order.
    fn enumerators(&self, name: &str) -> Option<Vec<(String, u64)>>;

    /// Value of the integer constant called `name`.
    fn constant(&self, name: &str) -> Option<u64>;
}
