//! Native code regions read from `/proc/<pid>/maps`.
//!
//! Used when the host can't tell whether an address belongs to a shared
//! library or the main executable. Every executable mapping backed by a
//! file counts as native code; JIT code lives in anonymous mappings.

use anyhow::{Context, Result};
use procfs_core::FromRead;
use procfs_core::process::{MMPermissions, MMapPath, MemoryMaps};
use smunwind_unwinder::host::NativeCode;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

/// Executable, file-backed address ranges of a process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcMaps {
    regions: Vec<Range<u64>>,
}

impl ProcMaps {
    /// Reads the memory map of the process `pid`.
    pub fn load(pid: u32) -> Result<ProcMaps> {
        ProcMaps::from_file(format!("/proc/{pid}/maps"))
    }

    /// Reads a memory map in the `/proc/<pid>/maps` format from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ProcMaps> {
        let path = path.as_ref();
        File::open(path)
            .map_err(anyhow::Error::from)
            .and_then(ProcMaps::from_read)
            .with_context(|| format!("failed to read memory map `{}`", path.display()))
    }

    /// Parses a memory map in the `/proc/<pid>/maps` format.
    pub fn from_read(reader: impl Read) -> Result<ProcMaps> {
        let maps = MemoryMaps::from_read(reader)?;
        let mut regions: Vec<Range<u64>> = maps
            .iter()
            .filter(|map| {
                // Pseudo files like `[vdso]` aren't paths, and neither are
                // anonymous mappings, which is where JIT code is allocated.
                map.perms.contains(MMPermissions::EXECUTE)
                    && matches!(map.pathname, MMapPath::Path(_))
            })
            .map(|map| map.address.0..map.address.1)
            .filter(|range| !range.is_empty())
            .collect();
        regions.sort_by_key(|r| r.start);
        log::debug!("{} native code regions", regions.len());
        Ok(ProcMaps { regions })
    }

    /// The native code regions, sorted by start address.
    pub fn regions(&self) -> &[Range<u64>] {
        &self.regions
    }

    /// Whether `pc` lies in native code.
    pub fn contains(&self, pc: u64) -> bool {
        // Regions don't overlap, so only the last one starting at or before
        // `pc` can contain it.
        let i = self.regions.partition_point(|r| r.start <= pc);
        i > 0 && self.regions[i - 1].contains(&pc)
    }
}

impl NativeCode for ProcMaps {
    fn contains(&self, pc: u64) -> bool {
        ProcMaps::contains(self, pc)
    }
}
