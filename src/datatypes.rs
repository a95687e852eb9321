use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Fixed-width element types a `NumpyArray` can hold.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
pub enum PrimitiveType {
    #[strum(to_string = "bool")]
    Bool,
    #[strum(to_string = "int8")]
    Int8,
    #[strum(to_string = "uint8")]
    UInt8,
    #[strum(to_string = "int16")]
    Int16,
    #[strum(to_string = "uint16")]
    UInt16,
    #[strum(to_string = "int32")]
    Int32,
    #[strum(to_string = "uint32")]
    UInt32,
    #[strum(to_string = "int64")]
    Int64,
    #[strum(to_string = "uint64")]
    UInt64,
    #[strum(to_string = "float32")]
    Float32,
    #[strum(to_string = "float64")]
    Float64,
}

impl PrimitiveType {
    /// Returns the size of one element in bytes.
    #[must_use]
    pub fn itemsize(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Returns the buffer-protocol format character.
    #[must_use]
    pub fn format(self) -> &'static str {
        match self {
            Self::Bool => "?",
            Self::Int8 => "b",
            Self::UInt8 => "B",
            Self::Int16 => "h",
            Self::UInt16 => "H",
            Self::Int32 => "i",
            Self::UInt32 => "I",
            Self::Int64 => "l",
            Self::UInt64 => "L",
            Self::Float32 => "f",
            Self::Float64 => "d",
        }
    }

    /// Resolves a format character and item size into a primitive type.
    ///
    /// Returns `None` if the pair does not name a supported type.
    #[must_use]
    pub fn from_format(format: &str, itemsize: usize) -> Option<Self> {
        let format = format.trim_start_matches(|c| matches!(c, '<' | '>' | '=' | '@' | '!'));
        let primitive = match format {
            "?" => Self::Bool,
            "b" => Self::Int8,
            "B" => Self::UInt8,
            "h" => Self::Int16,
            "H" => Self::UInt16,
            "i" => Self::Int32,
            "I" => Self::UInt32,
            "l" | "q" => Self::Int64,
            "L" | "Q" => Self::UInt64,
            "f" => Self::Float32,
            "d" => Self::Float64,
            _ => return None,
        };
        if primitive.itemsize() == itemsize {
            Some(primitive)
        } else {
            None
        }
    }
}

/// Integer types used by offsets, starts/stops, indexes, tags and masks.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
pub enum IndexType {
    #[strum(to_string = "i8")]
    I8,
    #[strum(to_string = "u8")]
    U8,
    #[strum(to_string = "i32")]
    I32,
    #[strum(to_string = "u32")]
    U32,
    #[strum(to_string = "i64")]
    I64,
}

impl IndexType {
    /// Returns the suffix used in class names, e.g. `64` in `ListOffsetArray64`.
    #[must_use]
    pub fn class_suffix(self) -> &'static str {
        match self {
            Self::I8 => "8",
            Self::U8 => "U8",
            Self::I32 => "32",
            Self::U32 => "U32",
            Self::I64 => "64",
        }
    }

    #[must_use]
    pub fn from_class_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "8" => Some(Self::I8),
            "U8" => Some(Self::U8),
            "32" => Some(Self::I32),
            "U32" => Some(Self::U32),
            "64" => Some(Self::I64),
            _ => None,
        }
    }

    /// Returns `true` for the types list offsets, starts, stops and
    /// `IndexedArray` indexes are stored as.
    #[must_use]
    pub fn is_list_index(self) -> bool {
        matches!(self, Self::I32 | Self::U32 | Self::I64)
    }

    /// Returns `true` for the types an `IndexedOptionArray` index is stored
    /// as. Missing values need a sign.
    #[must_use]
    pub fn is_option_index(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    /// Returns `true` if `value` is representable in this type.
    #[must_use]
    pub fn holds(self, value: i64) -> bool {
        match self {
            Self::I8 => i8::try_from(value).is_ok(),
            Self::U8 => u8::try_from(value).is_ok(),
            Self::I32 => i32::try_from(value).is_ok(),
            Self::U32 => u32::try_from(value).is_ok(),
            Self::I64 => true,
        }
    }
}

/// A single element read out of a `NumpyArray`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    /// Converts the scalar into a JSON value. Non-finite floats become `null`.
    #[must_use]
    pub fn to_json(self) -> Value {
        match self {
            Self::Bool(v) => Value::Bool(v),
            Self::Int(v) => Value::from(v),
            Self::UInt(v) => Value::from(v),
            Self::Float(v) => serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number),
        }
    }

    #[must_use]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            Self::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(x) => write!(f, "{}", x),
            Self::Int(x) => write!(f, "{}", x),
            Self::UInt(x) => write!(f, "{}", x),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Rust native types that can be stored in a `NumpyArray`.
pub trait NativeType: fmt::Debug + Send + Sync + Copy + PartialOrd + FromStr + 'static {
    /// The primitive type this native type is stored as.
    const PRIMITIVE: PrimitiveType;

    fn into_scalar(self) -> Scalar;
}

macro_rules! native_type {
    ($native:ty, $primitive:ident, $variant:ident, $as:ty) => {
        impl NativeType for $native {
            const PRIMITIVE: PrimitiveType = PrimitiveType::$primitive;

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(<$as>::from(self))
            }
        }
    };
}

native_type!(bool, Bool, Bool, bool);
native_type!(i8, Int8, Int, i64);
native_type!(u8, UInt8, UInt, u64);
native_type!(i16, Int16, Int, i64);
native_type!(u16, UInt16, UInt, u64);
native_type!(i32, Int32, Int, i64);
native_type!(u32, UInt32, UInt, u64);
native_type!(i64, Int64, Int, i64);
native_type!(u64, UInt64, UInt, u64);
native_type!(f32, Float32, Float, f64);
native_type!(f64, Float64, Float, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_names() {
        assert_eq!(PrimitiveType::Float64.to_string(), "float64");
        assert_eq!(PrimitiveType::UInt8.to_string(), "uint8");
        assert_eq!("bool".parse::<PrimitiveType>(), Ok(PrimitiveType::Bool));
        assert!("float128".parse::<PrimitiveType>().is_err());
    }

    #[test]
    fn primitive_format() {
        for primitive in [
            PrimitiveType::Bool,
            PrimitiveType::Int8,
            PrimitiveType::UInt16,
            PrimitiveType::Int64,
            PrimitiveType::Float32,
            PrimitiveType::Float64,
        ] {
            assert_eq!(
                PrimitiveType::from_format(primitive.format(), primitive.itemsize()),
                Some(primitive)
            );
        }
        assert_eq!(PrimitiveType::from_format("q", 8), Some(PrimitiveType::Int64));
        assert_eq!(PrimitiveType::from_format("<d", 8), Some(PrimitiveType::Float64));
        assert_eq!(PrimitiveType::from_format("d", 4), None);
    }

    #[test]
    fn index_type_suffix() {
        assert_eq!("i64".parse::<IndexType>(), Ok(IndexType::I64));
        assert_eq!(IndexType::U32.class_suffix(), "U32");
        assert_eq!(IndexType::from_class_suffix("32"), Some(IndexType::I32));
        assert!(IndexType::I8.holds(-128));
        assert!(!IndexType::U8.holds(-1));
        assert!(IndexType::U32.is_list_index());
        assert!(!IndexType::I8.is_list_index());
        assert!(!IndexType::U32.is_option_index());
        assert!(IndexType::I32.is_option_index());
    }

    #[test]
    fn scalar_json() {
        assert_eq!(1.5_f64.into_scalar().to_json(), serde_json::json!(1.5));
        assert_eq!(3_u8.into_scalar(), Scalar::UInt(3));
        assert_eq!(Scalar::Float(f64::NAN).to_json(), Value::Null);
    }
}
