use alloc::string::String;

/// Errors produced while building the frame layout tables or while decoding
/// frames.
///
/// Only [`Error::VersionSkew`] and [`Error::AmbiguousArchitecture`] are
/// configuration errors. Everything else is raised while unwinding a single
/// frame, and callers are expected to turn it into a declined frame rather
/// than report it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The inspected process doesn't describe its frames the way this
    /// engine expects, so nothing it reports can be trusted.
    #[error("frame layout of the inspected process is not supported: {reason}")]
    VersionSkew {
        /// What didn't match.
        reason: String,
    },

    /// Two configured architectures check the same sentinel register, so
    /// detection can't tell them apart.
    #[error("architectures `{first}` and `{second}` share the sentinel register `{sentinel}`")]
    AmbiguousArchitecture {
        /// The shared register name.
        sentinel: String,
        /// Name of the first architecture using it.
        first: &'static str,
        /// Name of the second architecture using it.
        second: &'static str,
    },

    /// None of the configured architectures has a readable sentinel register
    /// in the frame being unwound.
    #[error("no configured architecture matches the current frame")]
    NoMatchingArchitecture,

    /// A register needed to unwind was not available.
    #[error("register `{name}` is not available")]
    MissingRegister {
        /// The register name.
        name: &'static str,
    },

    /// Reading memory of the inspected process failed.
    #[error("failed to read {len} bytes at {address:#x}")]
    MemoryRead {
        /// Start of the read.
        address: u64,
        /// Number of bytes requested.
        len: usize,
    },

    /// A descriptor carries a kind tag the process never declared.
    #[error("unknown frame kind tag {tag}")]
    UnknownFrameTag {
        /// The raw tag.
        tag: u64,
    },

    /// A descriptor decodes to a payload too large to be a real frame.
    #[error("implausible frame descriptor {word:#x}")]
    ImplausibleDescriptor {
        /// The raw descriptor word.
        word: u64,
    },

    /// Decoding a frame didn't move toward older frames.
    #[error("next stack pointer {next:#x} is not older than {sp:#x}")]
    StackNotAdvancing {
        /// Stack pointer of the decoded frame.
        sp: u64,
        /// Computed stack pointer of the next frame.
        next: u64,
    },

    /// A single activation produced more frames than allowed.
    #[error("more than {limit} frames in one activation")]
    ChainTooLong {
        /// The configured limit.
        limit: usize,
    },
}

/// Convenience alias for results in this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub(crate) fn skew(reason: impl Into<String>) -> Error {
        Error::VersionSkew {
            reason: reason.into(),
        }
    }
}
