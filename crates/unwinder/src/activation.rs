//! Walking the per-thread list of JIT activations.
//!
//! Every time native code calls into JIT code the runtime pushes an
//! activation record, linked to the previous one, that remembers where the
//! youngest JIT frame of that activation starts. Frame headers alone can't
//! tell the last JIT frame of a run apart from an ordinary link, so the
//! session uses this list to find where each run of JIT frames begins.
//!
//! Later engines keep that top in the activation itself. Older ones keep the
//! head's top next to the head link, and save each older top in the
//! activation pushed after it.

use crate::host::{Inferior, Memory, TypeMetadata, read_word};
use crate::symbols::{Symbols, TopField};
use crate::{Arch, Error, Result};
use alloc::format;
use alloc::vec::Vec;

/// Where the top of an activation's JIT stack is read from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TopOffset {
    /// Offset within the activation.
    Own(u64),
    /// `head` is the offset of the head's top within the structure holding
    /// the head link; `prev` the offset, within an activation, of the top of
    /// the activation it links to.
    Linked {
        /// Offset next to the head link.
        head: u64,
        /// Offset within the newer activation.
        prev: u64,
    },
}

/// Field offsets needed to walk the activation list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationLayout {
    /// Where tops of JIT stacks are recorded.
    pub top: TopOffset,
    /// Offset of the link to the previous activation.
    pub prev_offset: u64,
    /// Offsets dereferenced, in order, to get from the value of the
    /// per-thread root to the head of the list.
    pub root_path: Vec<u64>,
}

impl ActivationLayout {
    /// Reads the layout of the activation type and of the structures on the
    /// path to the list head.
    pub fn new(metadata: &dyn TypeMetadata, symbols: &Symbols) -> Result<ActivationLayout> {
        let offset = |ty: &str, field: &str| {
            metadata
                .type_layout(ty)
                .ok_or_else(|| Error::skew(format!("type `{ty}` not found")))?
                .field_offset(field)
                .ok_or_else(|| Error::skew(format!("field `{ty}::{field}` not found")))
        };
        let root_path = symbols
            .activation_path
            .iter()
            .map(|(ty, field)| offset(ty, field))
            .collect::<Result<Vec<_>>>()?;
        let activation = symbols.activation_type.as_str();
        let top = match &symbols.activation_top {
            TopField::Own(field) => TopOffset::Own(offset(activation, field)?),
            TopField::Linked { head, prev } => {
                let Some((holder, _)) = symbols.activation_path.last() else {
                    return Err(Error::skew(format!(
                        "`{head}` has no type to be read from: the path to the list head is empty"
                    )));
                };
                TopOffset::Linked {
                    head: offset(holder, head)?,
                    prev: offset(activation, prev)?,
                }
            }
        };
        Ok(ActivationLayout {
            top,
            prev_offset: offset(activation, &symbols.activation_prev_field)?,
            root_path,
        })
    }
}

/// Position of a session in the activation list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ActivationCursor {
    /// The list hasn't been consulted yet.
    #[default]
    NotStarted,
    /// The activation at this address was the last one visited.
    At(u64),
    /// Every activation has been visited.
    Exhausted,
}

/// One step through the activation list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActivationStep {
    /// The activation at `activation` has its youngest JIT frame at `top`.
    Found {
        /// Top of the activation's JIT stack.
        top: u64,
        /// Address of the activation record.
        activation: u64,
    },
    /// No activations are left.
    Exhausted,
}

/// Reads activation records through a [`Memory`].
///
/// The walker holds no state of its own; the position in the list is kept
/// by the caller as an [`ActivationCursor`].
pub struct ActivationWalker<'a> {
    memory: &'a dyn Memory,
    layout: &'a ActivationLayout,
    arch: Arch,
}

impl<'a> ActivationWalker<'a> {
    /// Creates a walker reading words the way `arch` lays them out.
    pub fn new(memory: &'a dyn Memory, layout: &'a ActivationLayout, arch: Arch) -> Self {
        ActivationWalker {
            memory,
            layout,
            arch,
        }
    }

    fn word(&self, address: u64) -> Result<u64> {
        let desc = self.arch.descriptor();
        read_word(self.memory, desc.endian, desc.word_size, address)
    }

    /// Starts at the head of the list reachable from `root`, the address of
    /// the per-thread root variable.
    pub fn first(&self, root: u64) -> Result<ActivationStep> {
        let mut holder = root;
        let mut ptr = self.word(root)?;
        for offset in &self.layout.root_path {
            if ptr == 0 {
                break;
            }
            holder = ptr;
            ptr = self.word(ptr.wrapping_add(*offset))?;
        }
        if ptr == 0 {
            return Ok(ActivationStep::Exhausted);
        }
        let top = match self.layout.top {
            TopOffset::Own(offset) => ptr.wrapping_add(offset),
            TopOffset::Linked { head, .. } => holder.wrapping_add(head),
        };
        self.found(ptr, top)
    }

    /// Moves from `activation` to the previous activation.
    pub fn next(&self, activation: u64) -> Result<ActivationStep> {
        let prev = self.word(activation.wrapping_add(self.layout.prev_offset))?;
        if prev == 0 {
            return Ok(ActivationStep::Exhausted);
        }
        let top = match self.layout.top {
            TopOffset::Own(offset) => prev.wrapping_add(offset),
            TopOffset::Linked { prev: offset, .. } => activation.wrapping_add(offset),
        };
        self.found(prev, top)
    }

    /// Advances `cursor`, starting from the root of the selected thread if
    /// it hasn't been started yet, and skipping activations that have no
    /// JIT frames.
    pub fn advance(
        &self,
        inferior: &dyn Inferior,
        root_symbol: &str,
        cursor: &mut ActivationCursor,
    ) -> Result<Option<u64>> {
        loop {
            let step = match *cursor {
                ActivationCursor::Exhausted => return Ok(None),
                ActivationCursor::NotStarted => {
                    match inferior.thread_local_address(root_symbol) {
                        Some(root) => self.first(root)?,
                        None => {
                            log::debug!("no per-thread root `{root_symbol}`");
                            ActivationStep::Exhausted
                        }
                    }
                }
                ActivationCursor::At(activation) => self.next(activation)?,
            };
            match step {
                ActivationStep::Exhausted => {
                    *cursor = ActivationCursor::Exhausted;
                    return Ok(None);
                }
                ActivationStep::Found { top, activation } => {
                    *cursor = ActivationCursor::At(activation);
                    if top != 0 {
                        return Ok(Some(top));
                    }
                    log::trace!("activation {activation:#x} has no JIT frames");
                }
            }
        }
    }

    /// Reads the top of `activation`'s JIT stack from `top_address`.
    fn found(&self, activation: u64, top_address: u64) -> Result<ActivationStep> {
        let top = self.word(top_address)?;
        log::trace!("activation {activation:#x}: top of JIT stack = {top:#x}");
        Ok(ActivationStep::Found { top, activation })
    }
}
