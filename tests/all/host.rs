//! A synthetic inspected process: a sparse memory image, a SpiderMonkey-like
//! type metadata table, and helpers laying out JIT stacks in it.

use smunwind::host::{
    Inferior, Memory, PendingFrame, Registers, ThreadId, TypeLayout, TypeMetadata, Unreadable,
};
use smunwind::{FrameId, FrameKind, RegisterSet};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// Kind tags of the synthetic process, in `FrameType` declaration order.
const KINDS: &[(&str, FrameKind)] = &[
    ("JitFrame_Entry", FrameKind::Entry),
    ("JitFrame_BaselineJS", FrameKind::BaselineJS),
    ("JitFrame_IonJS", FrameKind::IonJS),
    ("JitFrame_Bailout", FrameKind::Bailout),
    ("JitFrame_BaselineStub", FrameKind::BaselineStub),
    ("JitFrame_IonStub", FrameKind::IonStub),
    ("JitFrame_Rectifier", FrameKind::Rectifier),
    ("JitFrame_IonAccessorIC", FrameKind::IonAccessorIC),
    ("JitFrame_Unwound_BaselineJS", FrameKind::UnwoundBaselineJS),
    ("JitFrame_Unwound_IonJS", FrameKind::UnwoundIonJS),
    ("JitFrame_Unwound_BaselineStub", FrameKind::UnwoundBaselineStub),
    ("JitFrame_Unwound_IonStub", FrameKind::UnwoundIonStub),
    ("JitFrame_Unwound_Rectifier", FrameKind::UnwoundRectifier),
    ("JitFrame_Unwound_IonAccessorIC", FrameKind::UnwoundIonAccessorIC),
    ("JitFrame_Exit", FrameKind::Exit),
    ("JitFrame_LazyLink", FrameKind::LazyLink),
];

const KIND_BITS: u64 = 4;
const SIZE_SHIFT: u64 = 4;

/// Header size following a frame of `kind`, as declared by [`metadata`].
pub fn header_size(kind: FrameKind) -> u64 {
    match kind {
        FrameKind::Entry => 16,
        FrameKind::Exit | FrameKind::LazyLink => 32,
        FrameKind::BaselineStub | FrameKind::UnwoundBaselineStub => 32,
        FrameKind::IonStub | FrameKind::UnwoundIonStub => 24,
        FrameKind::IonAccessorIC | FrameKind::UnwoundIonAccessorIC => 56,
        _ => 48,
    }
}

fn tag(kind: FrameKind) -> u64 {
    KINDS
        .iter()
        .position(|(_, k)| *k == kind)
        .unwrap() as u64
}

/// Type metadata of the synthetic process.
pub struct Metadata {
    pub types: HashMap<String, TypeLayout>,
    pub enumerators: Vec<(String, u64)>,
    pub constants: HashMap<String, u64>,
}

pub fn metadata() -> Metadata {
    let mut types = HashMap::new();
    let mut add = |name: &str, size: u64, fields: &[(&str, u64)]| {
        types.insert(
            name.to_string(),
            TypeLayout {
                size,
                fields: fields.iter().map(|(f, o)| (f.to_string(), *o)).collect(),
            },
        );
    };
    add(
        "js::jit::CommonFrameLayout",
        16,
        &[("returnAddress_", 0), ("descriptor_", 8)],
    );
    add("js::jit::JitFrameLayout", 48, &[]);
    add("js::jit::BaselineStubFrameLayout", 32, &[]);
    add("js::jit::JitStubFrameLayout", 24, &[]);
    add("js::jit::RectifierFrameLayout", 48, &[]);
    add("js::jit::ExitFrameLayout", 32, &[]);
    add("js::jit::IonAccessorICFrameLayout", 56, &[]);
    add(
        "js::jit::JitActivation",
        0x40,
        &[
            ("prevJitTop_", 0x10),
            ("exitFP_", 0x18),
            ("prevJitActivation_", 0x28),
        ],
    );
    add("js::PerThreadData", 0x40, &[("runtime_", 0x18)]);
    add(
        "JSRuntime",
        0x200,
        &[("jitTop", 0xf8), ("jitActivation", 0x100)],
    );

    Metadata {
        types,
        enumerators: KINDS
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (format!("js::jit::{name}"), i as u64))
            .collect(),
        constants: [
            ("js::jit::FRAMETYPE_BITS".to_string(), KIND_BITS),
            ("js::jit::FRAMESIZE_SHIFT".to_string(), SIZE_SHIFT),
        ]
        .into_iter()
        .collect(),
    }
}

impl TypeMetadata for Metadata {
    fn type_layout(&self, name: &str) -> Option<TypeLayout> {
        self.types.get(name).cloned()
    }

    fn enumerators(&self, name: &str) -> Option<Vec<(String, u64)>> {
        (name == "js::jit::FrameType").then(|| self.enumerators.clone())
    }

    fn constant(&self, name: &str) -> Option<u64> {
        self.constants.get(name).copied()
    }
}

const ROOT: u64 = 0x1_0000;
const THREAD_DATA: u64 = 0x1_1000;
const RUNTIME: u64 = 0x1_2000;
const ACTIVATIONS: u64 = 0x2_0000;

/// The inspected process, with one thread selected.
pub struct Process {
    memory: BTreeMap<u64, u8>,
    pub thread: ThreadId,
    /// Native code as the host knows it; `None` means the host can't tell.
    pub native: Option<Vec<Range<u64>>>,
    pub pid: Option<u32>,
    /// How many times the unwinder asked for the process id.
    pub pid_lookups: Cell<usize>,
}

impl Process {
    pub fn new() -> Process {
        let mut process = Process {
            memory: BTreeMap::new(),
            thread: ThreadId(1),
            native: Some(Vec::new()),
            pid: None,
            pid_lookups: Cell::new(0),
        };
        process.write(ROOT, THREAD_DATA);
        process.write(THREAD_DATA + 0x18, RUNTIME);
        process.write(RUNTIME + 0xf8, 0);
        process.write(RUNTIME + 0x100, 0);
        process
    }

    pub fn write(&mut self, address: u64, value: u64) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.memory.insert(address + i as u64, byte);
        }
    }

    /// Links activations with the given tops of JIT stack, youngest first.
    ///
    /// The runtime records the head's top in `jitTop`, and each activation
    /// the top of the one before it in `prevJitTop_`.
    pub fn activations(&mut self, tops: &[u64]) {
        let address = |i: usize| ACTIVATIONS + 0x100 * i as u64;
        self.write(RUNTIME + 0xf8, tops.first().copied().unwrap_or(0));
        self.write(RUNTIME + 0x100, if tops.is_empty() { 0 } else { ACTIVATIONS });
        for i in 0..tops.len() {
            let prev_top = tops.get(i + 1).copied().unwrap_or(0);
            let prev = if i + 1 == tops.len() { 0 } else { address(i + 1) };
            self.write(address(i) + 0x10, prev_top);
            self.write(address(i) + 0x28, prev);
        }
    }

    /// Like [`Process::activations`], but with every activation recording
    /// its own top in `exitFP_`.
    pub fn own_activations(&mut self, tops: &[u64]) {
        let address = |i: usize| ACTIVATIONS + 0x100 * i as u64;
        self.write(RUNTIME + 0x100, if tops.is_empty() { 0 } else { ACTIVATIONS });
        for (i, top) in tops.iter().enumerate() {
            let prev = if i + 1 == tops.len() { 0 } else { address(i + 1) };
            self.write(address(i) + 0x18, *top);
            self.write(address(i) + 0x28, prev);
        }
    }
}

impl Memory for Process {
    fn read_memory(&self, address: u64, buf: &mut [u8]) -> Result<(), Unreadable> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = *self.memory.get(&(address + i as u64)).ok_or(Unreadable)?;
        }
        Ok(())
    }
}

impl Inferior for Process {
    fn selected_thread(&self) -> ThreadId {
        self.thread
    }

    fn thread_local_address(&self, symbol: &str) -> Option<u64> {
        (symbol == "js::TlsPerThreadData").then_some(ROOT)
    }

    fn native_code_contains(&self, pc: u64) -> Option<bool> {
        let native = self.native.as_ref()?;
        Some(native.iter().any(|r| r.contains(&pc)))
    }

    fn process_id(&self) -> Option<u32> {
        self.pid_lookups.set(self.pid_lookups.get() + 1);
        self.pid
    }
}

/// One run of JIT frames as the synthetic process lays it out.
pub struct Run {
    /// Stack address and kind of every frame, youngest first, ending with
    /// the entry frame.
    pub frames: Vec<(u64, FrameKind)>,
    /// Registers saved by the x86-64 entry trampoline.
    pub saved: Vec<(&'static str, u64)>,
    /// Stack pointer of the trampoline's caller.
    pub caller_sp: u64,
    /// Return address of the trampoline.
    pub caller_pc: u64,
}

impl Run {
    pub fn top(&self) -> u64 {
        self.frames[0].0
    }
}

/// Lays out an exit frame at `top` followed by frames of `kinds`, each with
/// a `payload`-byte body, and an x86-64 entry frame.
pub fn jit_run(process: &mut Process, top: u64, kinds: &[FrameKind], payload: u64) -> Run {
    let mut frames = vec![(top, FrameKind::Exit)];
    let mut sp = top;
    let next_kinds = kinds.iter().copied().chain([FrameKind::Entry]);
    for (i, next) in next_kinds.enumerate() {
        process.write(sp, 0x7f00_0000 + 0x100 * i as u64);
        process.write(sp + 8, (payload << SIZE_SHIFT) | tag(next));
        sp += payload + header_size(next);
        frames.push((sp, next));
    }

    // The entry trampoline's return address, and its saved registers above
    // a return value slot.
    process.write(sp, 0x7e00_0000);
    let base = sp + header_size(FrameKind::Entry);
    process.write(base, 0);
    // `push rbp; mov rbp, rsp; push rbx; push r12; ...; push r15`, read
    // back in pop order.
    let saved = vec![
        ("r15", 0x5a5a_0f15),
        ("r14", 0x5a5a_0f14),
        ("r13", 0x5a5a_0f13),
        ("r12", 0x5a5a_0f12),
        ("rbx", 0x5a5a_00bb),
        ("rbp", 0x5a5a_0bb9),
    ];
    let mut slot = base + 8;
    for (_, value) in &saved {
        process.write(slot, *value);
        slot += 8;
    }
    let caller_pc = 0x0040_2000;
    process.write(slot, caller_pc);
    Run {
        frames,
        saved,
        caller_sp: slot,
        caller_pc,
    }
}

/// A frame handed to the unwinder by the host.
#[derive(Default)]
pub struct Frame {
    regs: Vec<(&'static str, u64)>,
}

impl Frame {
    /// An x86-64 frame at `pc`, with its stack pointer at `sp`.
    pub fn x86_64(pc: u64, sp: u64) -> Frame {
        Frame {
            regs: vec![("rip", pc), ("rsp", sp)],
        }
    }

    /// A frame with no registers any architecture recognizes.
    pub fn opaque() -> Frame {
        Frame {
            regs: vec![("r0", 0)],
        }
    }
}

impl Registers for Frame {
    fn read_register(&self, name: &str) -> Option<u64> {
        self.regs.iter().find(|(r, _)| *r == name).map(|(_, v)| *v)
    }
}

/// What a host would build from an unwound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindInfo {
    pub id: FrameId,
    pub registers: RegisterSet,
}

impl PendingFrame for Frame {
    type UnwindInfo = UnwindInfo;

    fn create_unwind_info(&self, id: FrameId, registers: &RegisterSet) -> UnwindInfo {
        UnwindInfo {
            id,
            registers: registers.clone(),
        }
    }
}
