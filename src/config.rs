use smunwind_unwinder::{
    Arch, Architectures, DEFAULT_MAX_CHAIN_LENGTH, DEFAULT_MAX_FRAME_PAYLOAD, Symbols,
};
use std::fmt;

/// Where the unwinder learns which code is native.
///
/// Frames whose program counter is in native code are always left to the
/// debugger, so getting this wrong either hides native frames behind bogus
/// JIT frames or gives up on JIT frames the unwinder could have handled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NativeCodeSource {
    /// Ask the host, and parse the process's memory map only when the host
    /// can't answer.
    #[default]
    Host,
    /// Always use the process's memory map.
    ProcMaps,
    /// Never decline a frame because of where its code lives.
    Disabled,
}

/// Configuration used to create an [`Unwinder`](crate::Unwinder).
///
/// This structure exposes a builder-like interface and is consumed by
/// [`Unwinder::new`](crate::Unwinder::new).
#[derive(Clone)]
pub struct Config {
    pub(crate) archs: Vec<(Arch, Option<String>)>,
    pub(crate) symbols: Symbols,
    pub(crate) max_frame_payload: u64,
    pub(crate) max_chain_length: usize,
    pub(crate) native_code: NativeCodeSource,
}

impl Config {
    /// Creates a new configuration object with the default configuration
    /// specified.
    pub fn new() -> Config {
        Config {
            archs: Arch::ALL.iter().map(|arch| (*arch, None)).collect(),
            symbols: Symbols::default(),
            max_frame_payload: DEFAULT_MAX_FRAME_PAYLOAD,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            native_code: NativeCodeSource::default(),
        }
    }

    /// Adds `arch` to the set of architectures the unwinder handles.
    ///
    /// Architectures are tried in the order they were added. By default
    /// every supported architecture is enabled.
    pub fn architecture(&mut self, arch: Arch) -> &mut Self {
        if !self.archs.iter().any(|(a, _)| *a == arch) {
            self.archs.push((arch, None));
        }
        self
    }

    /// Replaces the set of architectures the unwinder handles.
    pub fn architectures(&mut self, archs: impl IntoIterator<Item = Arch>) -> &mut Self {
        self.archs.clear();
        for arch in archs {
            self.architecture(arch);
        }
        self
    }

    /// Overrides the register checked to detect that `arch` applies to a
    /// frame, enabling `arch` if it wasn't already.
    ///
    /// The register must be readable in every frame of `arch` and in no
    /// frame of any other enabled architecture. Two architectures sharing a
    /// register is reported as an error by
    /// [`Unwinder::new`](crate::Unwinder::new).
    pub fn sentinel_register(&mut self, arch: Arch, register: &str) -> &mut Self {
        self.architecture(arch);
        for (a, sentinel) in self.archs.iter_mut() {
            if *a == arch {
                *sentinel = Some(register.to_string());
            }
        }
        self
    }

    /// Configures the names used to look up the frame layout in the
    /// inspected process's metadata.
    ///
    /// The defaults are the names SpiderMonkey uses. Only embedders that
    /// renamed or re-namespaced the JIT need to change them.
    pub fn symbols(&mut self, symbols: Symbols) -> &mut Self {
        self.symbols = symbols;
        self
    }

    /// Configures the largest payload size, in bytes, a frame descriptor may
    /// claim.
    ///
    /// A descriptor over this bound is treated as garbage and unwinding of
    /// the thread stops there.
    pub fn max_frame_payload(&mut self, bytes: u64) -> &mut Self {
        self.max_frame_payload = bytes;
        self
    }

    /// Configures how many frames may be decoded in one activation before
    /// the unwinder assumes it is looping and gives up.
    pub fn max_chain_length(&mut self, frames: usize) -> &mut Self {
        self.max_chain_length = frames;
        self
    }

    /// Configures where native code regions come from.
    pub fn native_code(&mut self, source: NativeCodeSource) -> &mut Self {
        self.native_code = source;
        self
    }

    pub(crate) fn build_architectures(&self) -> smunwind_unwinder::Result<Architectures> {
        Architectures::with_sentinels(self.archs.iter().map(|(arch, sentinel)| {
            let sentinel = sentinel
                .clone()
                .unwrap_or_else(|| arch.descriptor().sentinel.to_string());
            (*arch, sentinel)
        }))
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("archs", &self.archs)
            .field("frame_kind_enum", &self.symbols.frame_kind_enum)
            .field("max_frame_payload", &self.max_frame_payload)
            .field("max_chain_length", &self.max_chain_length)
            .field("native_code", &self.native_code)
            .finish()
    }
}
