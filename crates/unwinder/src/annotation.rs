use crate::FrameKind;
use alloc::collections::BTreeMap;

/// What the unwinder learned about one JIT frame, for display.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameAnnotation {
    /// Kind of the frame.
    pub kind: FrameKind,
}

impl FrameAnnotation {
    /// Name to show in place of a function name.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Annotations of every frame a session produced, keyed by the frame's
/// stack address.
///
/// Only successful decode steps add entries. A lookup miss means the frame
/// isn't a JIT frame and should be displayed normally.
#[derive(Clone, Debug, Default)]
pub struct FrameAnnotationIndex {
    frames: BTreeMap<u64, FrameAnnotation>,
}

impl FrameAnnotationIndex {
    /// Creates an empty index.
    pub fn new() -> FrameAnnotationIndex {
        FrameAnnotationIndex::default()
    }

    /// Records the frame at `sp`, replacing any earlier record.
    pub fn record(&mut self, sp: u64, annotation: FrameAnnotation) {
        self.frames.insert(sp, annotation);
    }

    /// The annotation of the frame at `sp`.
    pub fn get(&self, sp: u64) -> Option<FrameAnnotation> {
        self.frames.get(&sp).copied()
    }

    /// Number of annotated frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame was annotated.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterates over `(sp, annotation)` in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, FrameAnnotation)> + '_ {
        self.frames.iter().map(|(sp, a)| (*sp, *a))
    }
}
