//! Schema descriptor model.
//!
//! A schema is a build-time, immutable table of [`ParamInfo`] descriptors.
//! Descriptor order determines the on-record byte offset of every field and
//! must never change once a device has persisted data: appending new fields
//! is safe, reordering or removing corrupts existing records.
//!
//! Values and editor descriptions are proper sum types rather than
//! tag-plus-union pairs, so reading the wrong arm is unrepresentable.

use crate::error::{Error, Result};

/// Number of octets in an address-typed field.
pub const IP_LEN: usize = 4;

// ───────────────────────────────────────────────────────────────
// Parameter types and values
// ───────────────────────────────────────────────────────────────

/// Serialized type of one configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    Char,
    /// Fixed-capacity NUL-terminated string; `size` includes the terminator.
    Str,
    /// Fixed-length opaque bytes, rendered as base64 text.
    Binary,
    /// 4-octet address, rendered as dotted decimal.
    Ip,
}

impl ParamType {
    /// Serialized width for types whose width is not schema-declared.
    pub const fn fixed_size(self) -> Option<u16> {
        match self {
            Self::Bool | Self::I8 | Self::U8 | Self::Char => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::Ip => Some(IP_LEN as u16),
            Self::Str | Self::Binary => None,
        }
    }

    /// Whether this is one of the integer types (signed or unsigned).
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::U8 | Self::I16 | Self::U16 | Self::I32 | Self::U32
        )
    }

    /// Whether this is one of the signed integer types.
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32)
    }
}

/// Type-tagged default value; doubles as the type discriminant reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    /// Default for any signed integer width (truncated on encode).
    Int(i32),
    /// Default for any unsigned integer width (truncated on encode).
    Uint(u32),
    Float(f32),
    Char(u8),
    Str(&'static str),
    Binary(&'static [u8]),
    Ip([u8; IP_LEN]),
}

/// Numeric bound used only for client-side input assistance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Int(i32),
    Uint(u32),
    Float(f32),
    /// NaN-equivalent: no bound.
    Unbounded,
}

// ───────────────────────────────────────────────────────────────
// Editor descriptors
// ───────────────────────────────────────────────────────────────

/// Attribute flags shared by most editor variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditorFlags {
    pub disabled: bool,
    pub required: bool,
    pub readonly: bool,
}

impl EditorFlags {
    pub const NONE: Self = Self {
        disabled: false,
        required: false,
        readonly: false,
    };
}

/// One selectable option of a radio group or select list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub value: &'static str,
    pub title: &'static str,
}

/// How a field renders as a UI control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Editor {
    /// Not exposed in the form at all.
    None,
    Text {
        size: u16,
        maxlength: u16,
        flags: EditorFlags,
    },
    Password {
        size: u16,
        maxlength: u16,
        flags: EditorFlags,
    },
    TextArea {
        cols: u16,
        rows: u16,
        maxlength: u16,
        flags: EditorFlags,
    },
    /// Checked control plus a hidden twin carrying the unchecked literal,
    /// so an unchecked box still submits a definite value.
    Checkbox {
        checked: &'static str,
        unchecked: &'static str,
        flags: EditorFlags,
    },
    Radio {
        choices: &'static [Choice],
        flags: EditorFlags,
    },
    Select {
        size: u16,
        choices: &'static [Choice],
        flags: EditorFlags,
    },
    Hidden,
}

impl Editor {
    pub const fn flags(&self) -> EditorFlags {
        match self {
            Self::Text { flags, .. }
            | Self::Password { flags, .. }
            | Self::TextArea { flags, .. }
            | Self::Checkbox { flags, .. }
            | Self::Radio { flags, .. }
            | Self::Select { flags, .. } => *flags,
            Self::None | Self::Hidden => EditorFlags::NONE,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Parameter descriptor
// ───────────────────────────────────────────────────────────────

/// Build-time metadata describing one configuration field.
///
/// Constructed through the per-type constructors below, which pick a
/// sensible default editor for each width; the `_custom` forms take an
/// explicit editor (and bounds for numerics).
#[derive(Debug, Clone, Copy)]
pub struct ParamInfo {
    /// Unique stable identifier; ASCII, compared case-sensitively.
    pub name: &'static str,
    /// Human-readable label; empty means "use `name`".
    pub title: &'static str,
    pub ptype: ParamType,
    /// Serialized byte width (strings: declared capacity incl. terminator).
    pub size: u16,
    pub default: DefaultValue,
    pub editor: Editor,
    pub min: Bound,
    pub max: Bound,
}

const fn text_editor(size: u16, maxlength: u16) -> Editor {
    Editor::Text {
        size,
        maxlength,
        flags: EditorFlags::NONE,
    }
}

impl ParamInfo {
    /// UI label: the title, falling back to the name.
    pub fn label(&self) -> &'static str {
        if self.title.is_empty() { self.name } else { self.title }
    }

    pub const fn boolean(name: &'static str, title: &'static str, default: bool) -> Self {
        Self::boolean_custom(
            name,
            title,
            default,
            Editor::Checkbox {
                checked: "true",
                unchecked: "false",
                flags: EditorFlags::NONE,
            },
        )
    }

    pub const fn boolean_custom(
        name: &'static str,
        title: &'static str,
        default: bool,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::Bool,
            size: 1,
            default: DefaultValue::Bool(default),
            editor,
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }

    pub const fn int8(name: &'static str, title: &'static str, default: i8) -> Self {
        Self::int8_custom(name, title, default, -128, 127, text_editor(3, 4))
    }

    pub const fn int8_custom(
        name: &'static str,
        title: &'static str,
        default: i8,
        min: i8,
        max: i8,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::I8,
            size: 1,
            default: DefaultValue::Int(default as i32),
            editor,
            min: Bound::Int(min as i32),
            max: Bound::Int(max as i32),
        }
    }

    pub const fn uint8(name: &'static str, title: &'static str, default: u8) -> Self {
        Self::uint8_custom(name, title, default, 0, 255, text_editor(3, 3))
    }

    pub const fn uint8_custom(
        name: &'static str,
        title: &'static str,
        default: u8,
        min: u8,
        max: u8,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::U8,
            size: 1,
            default: DefaultValue::Uint(default as u32),
            editor,
            min: Bound::Uint(min as u32),
            max: Bound::Uint(max as u32),
        }
    }

    pub const fn int16(name: &'static str, title: &'static str, default: i16) -> Self {
        Self::int16_custom(name, title, default, -32768, 32767, text_editor(5, 6))
    }

    pub const fn int16_custom(
        name: &'static str,
        title: &'static str,
        default: i16,
        min: i16,
        max: i16,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::I16,
            size: 2,
            default: DefaultValue::Int(default as i32),
            editor,
            min: Bound::Int(min as i32),
            max: Bound::Int(max as i32),
        }
    }

    pub const fn uint16(name: &'static str, title: &'static str, default: u16) -> Self {
        Self::uint16_custom(name, title, default, 0, 65535, text_editor(5, 5))
    }

    pub const fn uint16_custom(
        name: &'static str,
        title: &'static str,
        default: u16,
        min: u16,
        max: u16,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::U16,
            size: 2,
            default: DefaultValue::Uint(default as u32),
            editor,
            min: Bound::Uint(min as u32),
            max: Bound::Uint(max as u32),
        }
    }

    pub const fn int32(name: &'static str, title: &'static str, default: i32) -> Self {
        Self::int32_custom(
            name,
            title,
            default,
            i32::MIN,
            i32::MAX,
            text_editor(10, 11),
        )
    }

    pub const fn int32_custom(
        name: &'static str,
        title: &'static str,
        default: i32,
        min: i32,
        max: i32,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::I32,
            size: 4,
            default: DefaultValue::Int(default),
            editor,
            min: Bound::Int(min),
            max: Bound::Int(max),
        }
    }

    pub const fn uint32(name: &'static str, title: &'static str, default: u32) -> Self {
        Self::uint32_custom(name, title, default, 0, u32::MAX, text_editor(10, 10))
    }

    pub const fn uint32_custom(
        name: &'static str,
        title: &'static str,
        default: u32,
        min: u32,
        max: u32,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::U32,
            size: 4,
            default: DefaultValue::Uint(default),
            editor,
            min: Bound::Uint(min),
            max: Bound::Uint(max),
        }
    }

    pub const fn float32(name: &'static str, title: &'static str, default: f32) -> Self {
        Self::float32_custom(
            name,
            title,
            default,
            Bound::Unbounded,
            Bound::Unbounded,
            text_editor(10, 15),
        )
    }

    pub const fn float32_custom(
        name: &'static str,
        title: &'static str,
        default: f32,
        min: Bound,
        max: Bound,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::F32,
            size: 4,
            default: DefaultValue::Float(default),
            editor,
            min,
            max,
        }
    }

    pub const fn character(name: &'static str, title: &'static str, default: u8) -> Self {
        Self::character_custom(name, title, default, text_editor(1, 1))
    }

    pub const fn character_custom(
        name: &'static str,
        title: &'static str,
        default: u8,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::Char,
            size: 1,
            default: DefaultValue::Char(default),
            editor,
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }

    /// `size` is the declared capacity including the NUL terminator, so the
    /// longest storable value is `size - 1` bytes.
    pub const fn string(
        name: &'static str,
        title: &'static str,
        size: u16,
        default: &'static str,
    ) -> Self {
        Self::string_custom(
            name,
            title,
            size,
            default,
            text_editor(if size > 33 { 32 } else { size - 1 }, size - 1),
        )
    }

    pub const fn string_custom(
        name: &'static str,
        title: &'static str,
        size: u16,
        default: &'static str,
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::Str,
            size,
            default: DefaultValue::Str(default),
            editor,
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }

    /// Like [`ParamInfo::string`] but rendered as a password input.
    pub const fn password(
        name: &'static str,
        title: &'static str,
        size: u16,
        default: &'static str,
    ) -> Self {
        Self::string_custom(
            name,
            title,
            size,
            default,
            Editor::Password {
                size: if size > 33 { 32 } else { size - 1 },
                maxlength: size - 1,
                flags: EditorFlags::NONE,
            },
        )
    }

    pub const fn binary(
        name: &'static str,
        title: &'static str,
        size: u16,
        default: &'static [u8],
    ) -> Self {
        // Text width of the base64 rendition: 4 symbols per 3 raw bytes.
        let encoded = (size + 2) / 3 * 4;
        Self::binary_custom(
            name,
            title,
            size,
            default,
            text_editor(if encoded > 32 { 32 } else { encoded }, encoded),
        )
    }

    pub const fn binary_custom(
        name: &'static str,
        title: &'static str,
        size: u16,
        default: &'static [u8],
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::Binary,
            size,
            default: DefaultValue::Binary(default),
            editor,
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }

    pub const fn ip(name: &'static str, title: &'static str, default: [u8; IP_LEN]) -> Self {
        Self::ip_custom(name, title, default, text_editor(15, 15))
    }

    pub const fn ip_custom(
        name: &'static str,
        title: &'static str,
        default: [u8; IP_LEN],
        editor: Editor,
    ) -> Self {
        Self {
            name,
            title,
            ptype: ParamType::Ip,
            size: IP_LEN as u16,
            default: DefaultValue::Ip(default),
            editor,
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Schema binding
// ───────────────────────────────────────────────────────────────

/// An ordered, fixed table of descriptors plus the offset table derived
/// from it. Offsets are computed once at bind time; field addressing stays
/// O(1) without re-summing preceding sizes on every access.
#[derive(Debug, Clone)]
pub struct Schema {
    params: &'static [ParamInfo],
    offsets: Vec<usize>,
    data_len: usize,
}

impl Schema {
    pub fn new(params: &'static [ParamInfo]) -> Self {
        let mut offsets = Vec::with_capacity(params.len());
        let mut at = 0usize;
        for p in params {
            debug_assert!(!p.name.is_empty(), "parameter name must be non-empty");
            debug_assert!(
                p.ptype.fixed_size().is_none() || p.ptype.fixed_size() == Some(p.size),
                "declared size disagrees with type width for '{}'",
                p.name
            );
            debug_assert!(
                p.ptype != ParamType::Str || p.size >= 1,
                "string capacity must cover the terminator for '{}'",
                p.name
            );
            offsets.push(at);
            at += p.size as usize;
        }
        #[cfg(debug_assertions)]
        for (i, a) in params.iter().enumerate() {
            for b in &params[i + 1..] {
                debug_assert!(a.name != b.name, "duplicate parameter name '{}'", a.name);
            }
        }
        Self {
            params,
            offsets,
            data_len: at,
        }
    }

    /// Number of descriptors.
    pub fn count(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total serialized length of the data region (header excluded).
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Linear scan, first exact case-sensitive match.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Like [`Schema::find`] but with the error-taxonomy result.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.find(name).ok_or(Error::NotFound)
    }

    pub fn param(&self, index: usize) -> Result<&ParamInfo> {
        self.params.get(index).ok_or(Error::OutOfRange)
    }

    pub fn name(&self, index: usize) -> Result<&'static str> {
        Ok(self.param(index)?.name)
    }

    pub fn ptype(&self, index: usize) -> Result<ParamType> {
        Ok(self.param(index)?.ptype)
    }

    pub fn size(&self, index: usize) -> Result<u16> {
        Ok(self.param(index)?.size)
    }

    /// Byte offset of the field inside the data region.
    pub fn offset(&self, index: usize) -> Result<usize> {
        self.offsets.get(index).copied().ok_or(Error::OutOfRange)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, ParamInfo> {
        self.params.iter()
    }
}
