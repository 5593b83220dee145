//! Typed values delivered by the subscription and device-status providers.

use std::fmt;

/// Scalar type tag carried in variable metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value has been sampled yet.
    Void,
    /// Boolean.
    Bool,
    /// Unsigned 8-bit.
    U8,
    /// Signed 8-bit.
    I8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    I16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit.
    I32,
    /// Unsigned 64-bit.
    U64,
    /// Signed 64-bit.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// UTF-8 string.
    String,
}

/// A single typed value.
///
/// `Void` is the provider's "no value yet" sentinel. Consumers keep their
/// previous value when they see it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value available yet.
    #[default]
    Void,
    /// Boolean.
    Bool(bool),
    /// Unsigned 8-bit.
    U8(u8),
    /// Signed 8-bit.
    I8(i8),
    /// Unsigned 16-bit.
    U16(u16),
    /// Signed 16-bit.
    I16(i16),
    /// Unsigned 32-bit.
    U32(u32),
    /// Signed 32-bit.
    I32(i32),
    /// Unsigned 64-bit.
    U64(u64),
    /// Signed 64-bit.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// UTF-8 string.
    String(String),
}

impl Variant {
    /// Type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Void => ValueKind::Void,
            Self::Bool(_) => ValueKind::Bool,
            Self::U8(_) => ValueKind::U8,
            Self::I8(_) => ValueKind::I8,
            Self::U16(_) => ValueKind::U16,
            Self::I16(_) => ValueKind::I16,
            Self::U32(_) => ValueKind::U32,
            Self::I32(_) => ValueKind::I32,
            Self::U64(_) => ValueKind::U64,
            Self::I64(_) => ValueKind::I64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::String(_) => ValueKind::String,
        }
    }

    /// True for the "no value yet" sentinel.
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Boolean view. Integers map to `!= 0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            other => other.as_i64().map(|v| v != 0),
        }
    }

    /// Integer view of any integer variant that fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::U8(v) => Some(v.into()),
            Self::I8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::I16(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("<void>"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for Variant {
    fn from(v: u8) -> Self {
        Self::U8(v)
    }
}

impl From<i8> for Variant {
    fn from(v: i8) -> Self {
        Self::I8(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_is_default() {
        assert!(Variant::default().is_void());
        assert_eq!(Variant::Void.kind(), ValueKind::Void);
        assert_eq!(Variant::Void.as_bool(), None);
    }

    #[test]
    fn integer_views() {
        assert_eq!(Variant::U8(42).as_i64(), Some(42));
        assert_eq!(Variant::I8(-3).as_i64(), Some(-3));
        assert_eq!(Variant::U64(u64::MAX).as_i64(), None);
        assert_eq!(Variant::U16(0).as_bool(), Some(false));
        assert_eq!(Variant::I32(7).as_bool(), Some(true));
        assert_eq!(Variant::F64(1.0).as_i64(), None);
    }

    #[test]
    fn display_matches_log_format() {
        assert_eq!(Variant::Bool(true).to_string(), "true");
        assert_eq!(Variant::I8(-12).to_string(), "-12");
        assert_eq!(Variant::from("Vendor").to_string(), "Vendor");
        assert_eq!(Variant::Void.to_string(), "<void>");
    }
}
