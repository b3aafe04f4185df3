use crate::HeaderLayout;
use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

/// Names used to query the inspected process's metadata.
///
/// The defaults are those of SpiderMonkey builds that keep the activation
/// list in `JSRuntime`, reached through the thread's `PerThreadData`. Later
/// builds moved the top of the JIT stack into the activation; they are
/// described with [`TopField::Own`].
#[derive(Clone, Debug)]
pub struct Symbols {
    /// Prefix stripped from enumerator names, e.g. `js::jit::`.
    pub namespace: String,
    /// The frame kind enum.
    pub frame_kind_enum: String,
    /// Constant holding the number of bits of the kind tag.
    pub kind_bits_constant: String,
    /// Constant holding the shift of the payload size.
    pub size_shift_constant: String,
    /// Structure types of each [`HeaderLayout`].
    pub header_types: Vec<(HeaderLayout, String)>,
    /// Field of the common header holding the return address.
    pub return_address_field: String,
    /// Field of the common header holding the descriptor.
    pub descriptor_field: String,
    /// The activation record type.
    pub activation_type: String,
    /// Where the top of each activation's JIT stack is recorded.
    pub activation_top: TopField,
    /// Field of an activation linking to the previous one.
    pub activation_prev_field: String,
    /// Thread-local variable the activation list is reached from.
    pub activation_root: String,
    /// `(type, field)` pointers followed from the root to the head of the
    /// list; the root itself holds a pointer to the first type.
    pub activation_path: Vec<(String, String)>,
}

/// Where an engine records the top of each activation's JIT stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopField {
    /// A field of the activation itself, e.g. `exitFP_`.
    Own(String),
    /// Next to the links. The head's top is a field of the last type of
    /// [`Symbols::activation_path`], e.g. `JSRuntime::jitTop`, and every
    /// older activation's top is saved in the activation pushed after it,
    /// e.g. `JitActivation::prevJitTop_`.
    Linked {
        /// Field holding the top of the head activation.
        head: String,
        /// Field of an activation holding the top of the previous one.
        prev: String,
    },
}

impl Symbols {
    /// Type name configured for `layout`.
    pub fn header_type(&self, layout: HeaderLayout) -> Option<&str> {
        self.header_types
            .iter()
            .find(|(l, _)| *l == layout)
            .map(|(_, name)| name.as_str())
    }
}

impl Default for Symbols {
    fn default() -> Symbols {
        let jit = |name: &str| {
            let mut s = "js::jit::".to_owned();
            s.push_str(name);
            s
        };
        Symbols {
            namespace: jit(""),
            frame_kind_enum: jit("FrameType"),
            kind_bits_constant: jit("FRAMETYPE_BITS"),
            size_shift_constant: jit("FRAMESIZE_SHIFT"),
            header_types: vec![
                (HeaderLayout::Common, jit("CommonFrameLayout")),
                (HeaderLayout::Jit, jit("JitFrameLayout")),
                (HeaderLayout::BaselineStub, jit("BaselineStubFrameLayout")),
                (HeaderLayout::JitStub, jit("JitStubFrameLayout")),
                (HeaderLayout::Rectifier, jit("RectifierFrameLayout")),
                (HeaderLayout::Exit, jit("ExitFrameLayout")),
                (HeaderLayout::AccessorIC, jit("IonAccessorICFrameLayout")),
            ],
            return_address_field: "returnAddress_".to_owned(),
            descriptor_field: "descriptor_".to_owned(),
            activation_type: jit("JitActivation"),
            activation_top: TopField::Linked {
                head: "jitTop".to_owned(),
                prev: "prevJitTop_".to_owned(),
            },
            activation_prev_field: "prevJitActivation_".to_owned(),
            activation_root: "js::TlsPerThreadData".to_owned(),
            activation_path: vec![
                ("js::PerThreadData".to_owned(), "runtime_".to_owned()),
                ("JSRuntime".to_owned(), "jitActivation".to_owned()),
            ],
        }
    }
}
