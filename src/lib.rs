//! Debugger-side unwinding of SpiderMonkey JIT frames.
//!
//! Code generated at runtime by the SpiderMonkey JIT has no unwind tables
//! and doesn't keep the native frame pointer chain intact, so a debugger
//! walking a thread that is running JavaScript loses the stack at the
//! first JIT frame. This crate plugs into the debugger's stack walk and
//! recovers those frames from the engine's own frame headers.
//!
//! The host debugger supplies everything through the traits in [`host`]:
//! register and memory access, the inspected process's type metadata, and
//! native code lookups. A typical integration looks like this:
//!
//! ```ignore
//! use smunwind::{Config, Event, Unwinder};
//!
//! // Once, when the inspected program is loaded.
//! let mut unwinder = Unwinder::new(&Config::new(), &metadata)?;
//!
//! // For each frame the debugger can't unwind by itself.
//! match unwinder.unwind(&inferior, &pending_frame) {
//!     Some(info) => { /* continue the walk from `info` */ }
//!     None => { /* let the default unwinder have it */ }
//! }
//!
//! // Whenever the program is about to run again.
//! unwinder.handle_event(Event::Resumed);
//! ```
//!
//! Configuration errors, such as a process whose frame layout this crate
//! doesn't understand, are reported by [`Unwinder::new`]. Once built, the
//! unwinder never fails: anything it can't unwind is declined and left to
//! the debugger's default behavior.

#![deny(missing_docs)]

mod config;
mod maps;
mod unwinder;

pub use crate::config::{Config, NativeCodeSource};
pub use crate::maps::ProcMaps;
pub use crate::unwinder::{Event, Unwinder};

pub use smunwind_unwinder::host;
pub use smunwind_unwinder::{
    Arch, Decline, FrameAnnotation, FrameId, FrameKind, RegisterSet, Step, Symbols, TopField,
    UnwoundFrame,
};
