use core::fmt;

macro_rules! frame_kinds {
    ($($kind:ident = $name:literal => $layout:ident,)*) => {
        /// The kind of a JIT frame, as tagged in frame descriptors.
        ///
        /// The numeric tag of each kind belongs to the inspected process and
        /// is looked up through [`FrameLayoutCatalog`](crate::FrameLayoutCatalog);
        /// only the names are fixed here.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FrameKind {
            $(
                #[doc = concat!("Frames tagged `", $name, "`.")]
                $kind,
            )*
        }

        impl FrameKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [FrameKind] = &[$(FrameKind::$kind,)*];

            /// Number of kinds.
            pub const COUNT: usize = FrameKind::ALL.len();

            /// The enumerator name the inspected process uses for this kind,
            /// without any namespace.
            pub fn name(self) -> &'static str {
                match self {
                    $(FrameKind::$kind => $name,)*
                }
            }

            /// Looks up a kind by its enumerator name.
            pub fn from_name(name: &str) -> Option<FrameKind> {
                match name {
                    $($name => Some(FrameKind::$kind),)*
                    _ => None,
                }
            }

            /// The header structure whose size follows a frame of this kind.
            pub fn header(self) -> HeaderLayout {
                match self {
                    $(FrameKind::$kind => HeaderLayout::$layout,)*
                }
            }
        }
    };
}

frame_kinds! {
    Entry = "JitFrame_Entry" => Common,
    BaselineJS = "JitFrame_BaselineJS" => Jit,
    IonJS = "JitFrame_IonJS" => Jit,
    Bailout = "JitFrame_Bailout" => Jit,
    UnwoundBaselineJS = "JitFrame_Unwound_BaselineJS" => Jit,
    UnwoundIonJS = "JitFrame_Unwound_IonJS" => Jit,
    BaselineStub = "JitFrame_BaselineStub" => BaselineStub,
    UnwoundBaselineStub = "JitFrame_Unwound_BaselineStub" => BaselineStub,
    IonStub = "JitFrame_IonStub" => JitStub,
    UnwoundIonStub = "JitFrame_Unwound_IonStub" => JitStub,
    Rectifier = "JitFrame_Rectifier" => Rectifier,
    UnwoundRectifier = "JitFrame_Unwound_Rectifier" => Rectifier,
    Exit = "JitFrame_Exit" => Exit,
    LazyLink = "JitFrame_LazyLink" => Exit,
    IonAccessorIC = "JitFrame_IonAccessorIC" => AccessorIC,
    UnwoundIonAccessorIC = "JitFrame_Unwound_IonAccessorIC" => AccessorIC,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header structures whose sizes determine how far apart frames are.
///
/// `Entry` frames use [`HeaderLayout::Common`]: the entry trampoline only
/// lays out the common header before jumping into JIT code, so its own
/// larger structure isn't reliable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HeaderLayout {
    /// The header shared by every frame: return address and descriptor.
    Common,
    /// Scripted (baseline, Ion, bailout) frames.
    Jit,
    /// Baseline IC stub frames.
    BaselineStub,
    /// Ion IC stub frames.
    JitStub,
    /// Argument rectifier frames.
    Rectifier,
    /// Exit frames into the runtime.
    Exit,
    /// Ion accessor IC frames.
    AccessorIC,
}

impl HeaderLayout {
    /// Every layout.
    pub const ALL: [HeaderLayout; 7] = [
        HeaderLayout::Common,
        HeaderLayout::Jit,
        HeaderLayout::BaselineStub,
        HeaderLayout::JitStub,
        HeaderLayout::Rectifier,
        HeaderLayout::Exit,
        HeaderLayout::AccessorIC,
    ];
}
