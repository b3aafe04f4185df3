use crate::config::{Config, NativeCodeSource};
use crate::maps::ProcMaps;
use anyhow::{Context, Result};
use smunwind_unwinder::host::{Inferior, NativeCode, PendingFrame, Registers, TypeMetadata};
use smunwind_unwinder::{
    Architectures, Decline, FrameAnnotation, SessionConfig, Step, UnwindSession,
};

/// Notifications from the host the unwinder has to react to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The inspected program is about to run. Every cached stack address
    /// may be stale afterwards.
    Resumed,
    /// Shared libraries were loaded or unloaded.
    ObjfilesChanged,
}

/// The unwinder registered with the host.
///
/// Holds the layout tables read from the inspected process and at most one
/// [`UnwindSession`], for the thread currently being walked. A session is
/// never reused for another thread: when the host walks a different thread
/// the session is replaced.
pub struct Unwinder {
    archs: Architectures,
    config: SessionConfig,
    native_code: NativeCodeSource,
    session: Option<UnwindSession>,
    maps: CachedMaps,
}

/// The memory map of the inspected process, as far as it has been read.
enum CachedMaps {
    NotLoaded,
    Loaded(ProcMaps),
    /// Reading failed. Not retried until the cache is dropped.
    Unavailable,
}

impl CachedMaps {
    fn get(&self) -> Option<&ProcMaps> {
        match self {
            CachedMaps::Loaded(maps) => Some(maps),
            CachedMaps::NotLoaded | CachedMaps::Unavailable => None,
        }
    }
}

impl Unwinder {
    /// Reads the frame layout of the inspected process described by
    /// `metadata`.
    ///
    /// Fails if the configured architectures can't be told apart, or if the
    /// process lays out its frames differently than this crate expects. The
    /// unwinder must not be registered in that case since every frame it
    /// produced would be suspect.
    pub fn new(config: &Config, metadata: &dyn TypeMetadata) -> Result<Unwinder> {
        let archs = config
            .build_architectures()
            .context("invalid architecture configuration")?;
        let mut session_config = SessionConfig::new(metadata, &config.symbols)
            .context("failed to read the JIT frame layout of the inspected process")?;
        session_config.max_frame_payload = config.max_frame_payload;
        session_config.max_chain_length = config.max_chain_length;
        log::debug!(
            "unwinder ready for {:?}",
            archs.iter().collect::<Vec<_>>()
        );
        Ok(Unwinder {
            archs,
            config: session_config,
            native_code: config.native_code,
            session: None,
            maps: CachedMaps::NotLoaded,
        })
    }

    /// Unwinds `frame` on the selected thread of `inferior`.
    ///
    /// Returns the host's unwind info for the frame, or `None` if the frame
    /// isn't a JIT frame and should be left to the host's default unwinder.
    pub fn unwind<F: PendingFrame>(
        &mut self,
        inferior: &dyn Inferior,
        frame: &F,
    ) -> Option<F::UnwindInfo> {
        match self.step(inferior, frame) {
            Step::Frame(unwound) => {
                Some(frame.create_unwind_info(unwound.id(), unwound.registers()))
            }
            Step::Decline(_) => None,
        }
    }

    /// Like [`Unwinder::unwind`], but reports what happened instead of
    /// building the host's unwind info.
    pub fn step(&mut self, inferior: &dyn Inferior, frame: &dyn Registers) -> Step {
        let arch = match self.archs.detect(frame) {
            Ok(arch) => arch,
            Err(e) => {
                log::debug!("declining frame: {e}");
                return Step::Decline(Decline::NoArchitecture);
            }
        };
        let desc = arch.descriptor();
        let Some(pc) = frame.read_register(desc.pc) else {
            log::debug!("declining frame: `{}` is not readable", desc.pc);
            return Step::Decline(Decline::Unreadable);
        };

        let thread = inferior.selected_thread();
        if let Some(session) = &self.session {
            if session.thread() != thread || session.arch() != arch {
                log::debug!(
                    "replacing session of thread {} ({:?})",
                    session.thread().0,
                    session.arch()
                );
                self.session = None;
            }
        }

        self.prepare_native_code(inferior, pc);
        let native = NativeRegions {
            source: self.native_code,
            inferior,
            maps: self.maps.get(),
        };
        let session = self
            .session
            .get_or_insert_with(|| UnwindSession::new(thread, arch));
        match session.unwind(&self.config, inferior, &native, pc) {
            Ok(step) => step,
            Err(e) => {
                log::debug!("declining frame at pc {pc:#x}: {e}");
                Step::Decline(Decline::Unreadable)
            }
        }
    }

    /// Loads the memory map if `pc` can only be classified through it.
    fn prepare_native_code(&mut self, inferior: &dyn Inferior, pc: u64) {
        let needed = match self.native_code {
            NativeCodeSource::Disabled => false,
            NativeCodeSource::ProcMaps => true,
            NativeCodeSource::Host => inferior.native_code_contains(pc).is_none(),
        };
        if !needed || !matches!(self.maps, CachedMaps::NotLoaded) {
            return;
        }
        let Some(pid) = inferior.process_id() else {
            log::warn!("no process id to read the memory map of; assuming JIT code");
            self.maps = CachedMaps::Unavailable;
            return;
        };
        self.maps = match ProcMaps::load(pid) {
            Ok(maps) => CachedMaps::Loaded(maps),
            Err(e) => {
                log::warn!("{e:#}; assuming JIT code");
                CachedMaps::Unavailable
            }
        };
    }

    /// Discards the current session and every cached address.
    ///
    /// Must be called whenever the inspected program resumes. Calling it
    /// with no session, or twice in a row, does nothing.
    pub fn invalidate(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!("invalidating session of thread {}", session.thread().0);
        }
        self.maps = CachedMaps::NotLoaded;
    }

    /// Reacts to a host notification.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Resumed => self.invalidate(),
            Event::ObjfilesChanged => self.maps = CachedMaps::NotLoaded,
        }
    }

    /// What the current session knows about `frame`, looked up by its stack
    /// pointer. `None` means `frame` should be displayed normally.
    pub fn annotation_for(&self, frame: &dyn Registers) -> Option<FrameAnnotation> {
        let session = self.session.as_ref()?;
        let sp = frame.read_register(session.arch().descriptor().sp)?;
        session.annotations().get(sp)
    }

    /// The current session, if any.
    pub fn session(&self) -> Option<&UnwindSession> {
        self.session.as_ref()
    }
}

/// Native code lookup following the configured [`NativeCodeSource`].
struct NativeRegions<'a> {
    source: NativeCodeSource,
    inferior: &'a dyn Inferior,
    maps: Option<&'a ProcMaps>,
}

impl NativeCode for NativeRegions<'_> {
    fn contains(&self, pc: u64) -> bool {
        let from_maps = || self.maps.is_some_and(|maps| maps.contains(pc));
        match self.source {
            NativeCodeSource::Disabled => false,
            NativeCodeSource::ProcMaps => from_maps(),
            NativeCodeSource::Host => self
                .inferior
                .native_code_contains(pc)
                .unwrap_or_else(from_maps),
        }
    }
}
