//! The per-thread unwinding state machine.
//!
//! The host walks the stack one frame at a time and asks the session to
//! unwind each frame it can't handle itself. The session answers from the
//! state left behind by the previous request:
//!
//! * With no run of JIT frames in progress, the next activation in the
//!   thread's activation list gives the address of the youngest JIT frame of
//!   the next run. That frame is an exit frame, whose header is laid out
//!   like any other, so decoding continues from there.
//!
//! * Inside a run, the header at the expected stack address is decoded. The
//!   header describes how to find the *next older* frame: its payload size
//!   and the kind tag of the next frame. The kind of the frame being
//!   unwound was therefore learned one step earlier.
//!
//! * Once the tag says the next frame is an entry frame, the following
//!   request recovers the registers the entry trampoline saved and the run
//!   is over.
//!
//! The host's own unwinder handles the native frames between runs; the
//! session declines any frame whose program counter is in native code.

use crate::activation::{ActivationCursor, ActivationLayout, ActivationWalker};
use crate::host::{Inferior, NativeCode, ThreadId, TypeMetadata, read_word};
use crate::symbols::Symbols;
use crate::{
    Arch, Error, FrameAnnotation, FrameAnnotationIndex, FrameKind, FrameLayoutCatalog,
    RegisterSet, Result,
};
use alloc::string::String;

/// Default bound on the payload size of a single frame.
pub const DEFAULT_MAX_FRAME_PAYLOAD: u64 = 1 << 20;

/// Default bound on the number of frames in one activation.
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 1 << 16;

/// Everything a session needs to know about the inspected process.
///
/// Built once when the unwinder is loaded and shared by every session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Header sizes and descriptor layout.
    pub frames: FrameLayoutCatalog,
    /// Activation record layout.
    pub activations: ActivationLayout,
    /// Thread-local variable the activation list is reached from.
    pub root_symbol: String,
    /// Descriptors with a larger payload are rejected.
    pub max_frame_payload: u64,
    /// Upper bound of frames decoded in one activation.
    pub max_chain_length: usize,
}

impl SessionConfig {
    /// Reads all layouts from the inspected process's metadata.
    pub fn new(metadata: &dyn TypeMetadata, symbols: &Symbols) -> Result<SessionConfig> {
        Ok(SessionConfig {
            frames: FrameLayoutCatalog::new(metadata, symbols)?,
            activations: ActivationLayout::new(metadata, symbols)?,
            root_symbol: symbols.activation_root.clone(),
            max_frame_payload: DEFAULT_MAX_FRAME_PAYLOAD,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        })
    }
}

/// Identity of a frame: the stack address of its header and the return
/// address stored in it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameId {
    /// Stack address of the frame's header.
    pub stack_address: u64,
    /// Return address stored in the header.
    pub code_address: u64,
}

/// A frame produced by one unwinding step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnwoundFrame {
    id: FrameId,
    kind: FrameKind,
    registers: RegisterSet,
}

impl UnwoundFrame {
    /// The frame's id.
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Stack address of the frame.
    pub fn stack_pointer(&self) -> u64 {
        self.id.stack_address
    }

    /// Return address of the frame.
    pub fn program_counter(&self) -> u64 {
        self.id.code_address
    }

    /// Kind of the frame.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Name of the frame's kind.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Registers recovered for the caller.
    pub fn registers(&self) -> &RegisterSet {
        &self.registers
    }
}

/// Why a frame was left to the host's default unwinder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decline {
    /// The program counter is in native code.
    NativeCode,
    /// No architecture matched the frame.
    NoArchitecture,
    /// Every activation of the thread has been unwound.
    ActivationsExhausted,
    /// Unwinding failed; the frame can't be trusted.
    Unreadable,
}

/// Result of one unwinding request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// A JIT frame was unwound.
    Frame(UnwoundFrame),
    /// The frame isn't ours.
    Decline(Decline),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// No run of JIT frames in progress.
    Fresh,
    /// The frame at `next_sp` is of kind `next_kind`.
    Chaining {
        next_sp: u64,
        next_kind: FrameKind,
        depth: usize,
    },
    /// Nothing left to unwind on this thread.
    Done,
}

/// Unwinding state for one thread during one stop of the inspected process.
///
/// A session caches stack addresses, so it must be discarded as soon as the
/// process resumes.
#[derive(Debug)]
pub struct UnwindSession {
    thread: ThreadId,
    arch: Arch,
    state: State,
    cursor: ActivationCursor,
    annotations: FrameAnnotationIndex,
}

impl UnwindSession {
    /// Creates a fresh session for `thread`, unwinding `arch` frames.
    pub fn new(thread: ThreadId, arch: Arch) -> UnwindSession {
        log::debug!("new unwind session for thread {} ({arch:?})", thread.0);
        UnwindSession {
            thread,
            arch,
            state: State::Fresh,
            cursor: ActivationCursor::NotStarted,
            annotations: FrameAnnotationIndex::new(),
        }
    }

    /// The thread this session belongs to.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// The architecture this session unwinds.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Position in the activation list.
    pub fn cursor(&self) -> ActivationCursor {
        self.cursor
    }

    /// Whether a run of JIT frames is being unwound.
    pub fn is_chaining(&self) -> bool {
        matches!(self.state, State::Chaining { .. })
    }

    /// Annotations of the frames unwound so far.
    pub fn annotations(&self) -> &FrameAnnotationIndex {
        &self.annotations
    }

    /// Unwinds the frame whose program counter is `pc`.
    ///
    /// Errors leave the session done: once a header fails to decode, no
    /// later frame of this thread is trusted.
    pub fn unwind(
        &mut self,
        config: &SessionConfig,
        inferior: &dyn Inferior,
        native: &dyn NativeCode,
        pc: u64,
    ) -> Result<Step> {
        // Never claim frames of code that has other unwind information,
        // even though the host would happily let us.
        if native.contains(pc) {
            log::trace!("pc {pc:#x} is native code");
            return Ok(Step::Decline(Decline::NativeCode));
        }

        let result = match self.state {
            State::Done => return Ok(Step::Decline(Decline::ActivationsExhausted)),
            State::Fresh => self.unwind_exit(config, inferior),
            State::Chaining {
                next_sp,
                next_kind: FrameKind::Entry,
                ..
            } => self.unwind_entry(config, inferior, next_sp),
            State::Chaining { depth, .. } if depth >= config.max_chain_length => {
                Err(Error::ChainTooLong {
                    limit: config.max_chain_length,
                })
            }
            State::Chaining {
                next_sp,
                next_kind,
                depth,
            } => self
                .unwind_ordinary(config, inferior, next_sp, next_kind, depth)
                .map(Step::Frame),
        };
        if result.is_err() {
            self.state = State::Done;
        }
        result
    }

    /// Crosses into the next activation and decodes its exit frame.
    fn unwind_exit(&mut self, config: &SessionConfig, inferior: &dyn Inferior) -> Result<Step> {
        let walker = ActivationWalker::new(inferior, &config.activations, self.arch);
        match walker.advance(inferior, &config.root_symbol, &mut self.cursor)? {
            None => {
                log::trace!("no activations left on thread {}", self.thread.0);
                self.state = State::Done;
                Ok(Step::Decline(Decline::ActivationsExhausted))
            }
            Some(top) => {
                log::trace!("=== Entering activation, exit frame at {top:#x} ===");
                let frame = self.unwind_ordinary(config, inferior, top, FrameKind::Exit, 0)?;
                Ok(Step::Frame(frame))
            }
        }
    }

    /// Decodes the common header at `sp`, describing a frame of `kind`.
    fn unwind_ordinary(
        &mut self,
        config: &SessionConfig,
        inferior: &dyn Inferior,
        sp: u64,
        kind: FrameKind,
        depth: usize,
    ) -> Result<UnwoundFrame> {
        let frames = &config.frames;
        let desc = self.arch.descriptor();
        let word = |address: u64| read_word(inferior, desc.endian, desc.word_size, address);

        let return_address = word(sp.wrapping_add(frames.return_address_offset()))?;
        let raw = word(sp.wrapping_add(frames.descriptor_offset()))?;
        let descriptor = frames.decode(raw)?;
        if descriptor.payload_size > config.max_frame_payload {
            return Err(Error::ImplausibleDescriptor { word: raw });
        }

        // The tag just decoded is the kind of the next frame, and its header
        // size is what separates the two frames.
        let next_sp = sp
            .checked_add(descriptor.payload_size)
            .and_then(|next| next.checked_add(frames.size_of(descriptor.kind)))
            .filter(|next| *next > sp)
            .ok_or(Error::StackNotAdvancing {
                sp,
                next: sp
                    .wrapping_add(descriptor.payload_size)
                    .wrapping_add(frames.size_of(descriptor.kind)),
            })?;

        log::trace!("--- Unwinding one {kind} frame ---");
        log::trace!("sp = {sp:#x}");
        log::trace!("return address = {return_address:#x}");
        log::trace!(
            "payload = {:#x}, next = {} at {next_sp:#x}",
            descriptor.payload_size,
            descriptor.kind,
        );

        self.annotations.record(sp, FrameAnnotation { kind });
        self.state = State::Chaining {
            next_sp,
            next_kind: descriptor.kind,
            depth: depth + 1,
        };

        let mut registers = RegisterSet::new();
        registers.set(desc.pc, return_address);
        registers.set(desc.sp, next_sp);
        Ok(UnwoundFrame {
            id: FrameId {
                stack_address: sp,
                code_address: return_address,
            },
            kind,
            registers,
        })
    }

    /// Recovers the state saved by the entry trampoline whose header is at
    /// `sp`, ending the current run of JIT frames.
    fn unwind_entry(
        &mut self,
        config: &SessionConfig,
        inferior: &dyn Inferior,
        sp: u64,
    ) -> Result<Step> {
        let frames = &config.frames;
        let desc = self.arch.descriptor();
        let return_address = read_word(
            inferior,
            desc.endian,
            desc.word_size,
            sp.wrapping_add(frames.return_address_offset()),
        )?;
        let base = sp.wrapping_add(frames.size_of(FrameKind::Entry));
        let registers = self.arch.unwind_entry(inferior, base)?;

        log::trace!("--- Unwinding entry frame at {sp:#x} ---");
        log::trace!("=== Done with activation ===");

        self.annotations.record(
            sp,
            FrameAnnotation {
                kind: FrameKind::Entry,
            },
        );
        self.state = State::Fresh;
        Ok(Step::Frame(UnwoundFrame {
            id: FrameId {
                stack_address: sp,
                code_address: return_address,
            },
            kind: FrameKind::Entry,
            registers,
        }))
    }
}
