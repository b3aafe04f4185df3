//! Unwinding of SpiderMonkey JIT frames from raw machine state.
//!
//! Frames created by JIT-generated code don't follow the native frame
//! pointer convention. Instead each frame starts with a small common header
//! holding a return address and a packed *descriptor* word, and runs of
//! consecutive JIT frames are delimited by a per-thread linked list of
//! *activation* records. This crate decodes that layout and produces, one
//! frame at a time, the registers a debugger needs to continue its own
//! generic stack walk:
//!
//! ```text
//!     | ...               |
//!     | Native Frames     |
//!     | ...               |
//!     |-------------------|
//!     | Saved Registers   | <-- pushed by the entry trampoline
//!     |-------------------|
//!     | Entry Header      |                              |
//!     |-------------------|                              |
//!     | JIT Frame         |                            Stack
//!     | ...               |                            Grows
//!     | Descriptor        |                            Down
//!     | Return Address    | <-- common header            |
//!     |-------------------|                              |
//!     | Exit Frame        | <-- activation's top of      V
//!     | ...               |     the JIT stack
//! ```
//!
//! Everything that touches the inspected process goes through the traits in
//! [`host`], so the engine itself never reads memory or registers directly.
//! This module provides the building blocks; the facade that owns sessions
//! and reacts to host events lives in the `smunwind` crate.

#![no_std]
#![deny(missing_docs)]

extern crate alloc;
#[cfg(test)]
extern crate std;

mod activation;
mod annotation;
pub mod arch;
mod catalog;
mod error;
pub mod host;
mod kind;
mod regs;
mod stackwalk;
mod symbols;


pub use crate::activation::*;
pub use crate::annotation::*;
pub use crate::arch::{Arch, ArchDescriptor, Architectures};
pub use crate::catalog::*;
pub use crate::error::*;
pub use crate::kind::*;
pub use crate::regs::*;
pub use crate::stackwalk::*;
pub use crate::symbols::*;
