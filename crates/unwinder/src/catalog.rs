//! Frame header sizes and descriptor decoding for one inspected process.
//!
//! A frame descriptor is a single machine word laid out like this:
//!
//! ```text
//!   63                  size_shift                 kind_bits      0
//!  +------------------------+-----------------------+---------------+
//!  |      payload size      |     (other flags)     |   kind tag    |
//!  +------------------------+-----------------------+---------------+
//! ```
//!
//! Where the fields split is decided by whoever built the inspected engine,
//! so both numbers are read from the process once and kept here together
//! with the size of every header structure.

use crate::host::TypeMetadata;
use crate::symbols::Symbols;
use crate::{Error, FrameKind, HeaderLayout, Result};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// Bit split of a descriptor word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DescriptorMasks {
    /// Right shift that yields the payload size.
    pub size_shift: u32,
    /// Mask that yields the kind tag.
    pub kind_mask: u64,
}

impl DescriptorMasks {
    /// Masks for a tag `kind_bits` wide and a size starting at `size_shift`.
    pub fn new(kind_bits: u32, size_shift: u32) -> Result<DescriptorMasks> {
        if kind_bits == 0 || kind_bits > size_shift || size_shift >= 64 {
            return Err(Error::skew(format!(
                "descriptor split of {kind_bits} kind bits and size shift {size_shift} is invalid"
            )));
        }
        Ok(DescriptorMasks {
            size_shift,
            kind_mask: (1 << kind_bits) - 1,
        })
    }

    /// Splits a descriptor into `(payload size, raw kind tag)`.
    pub fn split(&self, word: u64) -> (u64, u64) {
        (word >> self.size_shift, word & self.kind_mask)
    }

    /// Packs a payload size and raw tag back into a descriptor.
    pub fn join(&self, payload_size: u64, tag: u64) -> u64 {
        debug_assert_eq!(tag & !self.kind_mask, 0);
        (payload_size << self.size_shift) | tag
    }

    /// Largest payload size a descriptor can carry.
    pub fn max_payload_size(&self) -> u64 {
        u64::MAX >> self.size_shift
    }
}

/// A decoded frame descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Size of the frame's payload in bytes.
    pub payload_size: u64,
    /// The kind tagged in the descriptor.
    pub kind: FrameKind,
}

/// Header sizes and descriptor layout of an inspected process.
///
/// Built once when the unwinder is loaded and only read afterwards.
#[derive(Clone, Debug)]
pub struct FrameLayoutCatalog {
    masks: DescriptorMasks,
    sizes: [u64; FrameKind::COUNT],
    tags: BTreeMap<u64, FrameKind>,
    kind_tags: [u64; FrameKind::COUNT],
    return_address_offset: u64,
    descriptor_offset: u64,
}

impl FrameLayoutCatalog {
    /// Reads the descriptor split, the frame kind enum, and the header
    /// layouts from the inspected process.
    ///
    /// Fails with [`Error::VersionSkew`] if the process's frame kinds aren't
    /// exactly the ones this engine knows about, or if any layout is
    /// missing.
    pub fn new(metadata: &dyn TypeMetadata, symbols: &Symbols) -> Result<FrameLayoutCatalog> {
        let constant = |name: &str| {
            let value = metadata
                .constant(name)
                .ok_or_else(|| Error::skew(format!("constant `{name}` not found")))?;
            u32::try_from(value)
                .map_err(|_| Error::skew(format!("constant `{name}` = {value} is out of range")))
        };
        let masks = DescriptorMasks::new(
            constant(&symbols.kind_bits_constant)?,
            constant(&symbols.size_shift_constant)?,
        )?;

        let enumerators = metadata
            .enumerators(&symbols.frame_kind_enum)
            .ok_or_else(|| Error::skew(format!("enum `{}` not found", symbols.frame_kind_enum)))?;
        let mut tags = BTreeMap::new();
        let mut kind_tags = [None; FrameKind::COUNT];
        let mut unexpected = Vec::new();
        for (name, value) in enumerators {
            let base = name.strip_prefix(symbols.namespace.as_str()).unwrap_or(&name);
            let Some(kind) = FrameKind::from_name(base) else {
                unexpected.push(String::from(base));
                continue;
            };
            if value & !masks.kind_mask != 0 {
                return Err(Error::skew(format!(
                    "tag {value} of `{base}` doesn't fit in the kind mask {:#x}",
                    masks.kind_mask
                )));
            }
            if let Some(other) = tags.insert(value, kind) {
                return Err(Error::skew(format!(
                    "`{base}` and `{other}` share the tag {value}"
                )));
            }
            kind_tags[kind as usize] = Some(value);
        }
        let missing: Vec<&str> = FrameKind::ALL
            .iter()
            .filter(|kind| kind_tags[**kind as usize].is_none())
            .map(|kind| kind.name())
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(Error::skew(format!(
                "frame kinds differ: missing {missing:?}, unexpected {unexpected:?}"
            )));
        }

        let mut layout_sizes = [0; HeaderLayout::ALL.len()];
        for layout in HeaderLayout::ALL {
            let name = symbols
                .header_type(layout)
                .ok_or_else(|| Error::skew(format!("no type configured for {layout:?}")))?;
            let ty = metadata
                .type_layout(name)
                .ok_or_else(|| Error::skew(format!("type `{name}` not found")))?;
            if ty.size == 0 {
                return Err(Error::skew(format!("type `{name}` has no size")));
            }
            layout_sizes[layout as usize] = ty.size;
        }

        let common_name = symbols.header_type(HeaderLayout::Common).unwrap_or_default();
        let common = metadata
            .type_layout(common_name)
            .ok_or_else(|| Error::skew(format!("type `{common_name}` not found")))?;
        let field = |name: &str| {
            common
                .field_offset(name)
                .ok_or_else(|| Error::skew(format!("field `{common_name}::{name}` not found")))
        };

        let mut sizes = [0; FrameKind::COUNT];
        let mut tag_of = [0; FrameKind::COUNT];
        for kind in FrameKind::ALL {
            sizes[*kind as usize] = layout_sizes[kind.header() as usize];
            // Presence of every kind was checked above.
            tag_of[*kind as usize] = kind_tags[*kind as usize].unwrap_or_default();
        }

        let catalog = FrameLayoutCatalog {
            masks,
            sizes,
            tags,
            kind_tags: tag_of,
            return_address_offset: field(&symbols.return_address_field)?,
            descriptor_offset: field(&symbols.descriptor_field)?,
        };
        log::debug!(
            "frame layout: size shift {}, kind mask {:#x}, common header {} bytes",
            catalog.masks.size_shift,
            catalog.masks.kind_mask,
            catalog.size_of(FrameKind::Entry),
        );
        Ok(catalog)
    }

    /// The descriptor bit split.
    pub fn descriptor_masks(&self) -> DescriptorMasks {
        self.masks
    }

    /// Size of the header that follows a frame of `kind`.
    pub fn size_of(&self, kind: FrameKind) -> u64 {
        self.sizes[kind as usize]
    }

    /// The process's numeric tag for `kind`.
    pub fn tag_of(&self, kind: FrameKind) -> u64 {
        self.kind_tags[kind as usize]
    }

    /// Offset of the return address within the common header.
    pub fn return_address_offset(&self) -> u64 {
        self.return_address_offset
    }

    /// Offset of the descriptor within the common header.
    pub fn descriptor_offset(&self) -> u64 {
        self.descriptor_offset
    }

    /// Decodes a descriptor word.
    pub fn decode(&self, word: u64) -> Result<FrameDescriptor> {
        let (payload_size, tag) = self.masks.split(word);
        let kind = *self
            .tags
            .get(&tag)
            .ok_or(Error::UnknownFrameTag { tag })?;
        Ok(FrameDescriptor { payload_size, kind })
    }

    /// Encodes a descriptor, the inverse of [`FrameLayoutCatalog::decode`].
    pub fn encode(&self, descriptor: FrameDescriptor) -> u64 {
        self.masks
            .join(descriptor.payload_size, self.tag_of(descriptor.kind))
    }
}
