use std::fmt;

use ndarray::ArcArray2;
use serde::{Deserialize, Serialize};

use super::{NumericArray, PlaneData};

/// Sample type of every channel of a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataType {
    #[default]
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::U8,
        DataType::I8,
        DataType::U16,
        DataType::I16,
        DataType::U32,
        DataType::I32,
        DataType::U64,
        DataType::I64,
        DataType::F32,
        DataType::F64,
    ];

    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        !matches!(
            self,
            DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Smallest value representable by the type.
    pub fn min_value(self) -> f64 {
        match self {
            DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64 => 0.0,
            DataType::I8 => f64::from(i8::MIN),
            DataType::I16 => f64::from(i16::MIN),
            DataType::I32 => f64::from(i32::MIN),
            DataType::I64 => i64::MIN as f64,
            DataType::F32 => f64::from(f32::MIN),
            DataType::F64 => f64::MIN,
        }
    }

    /// Largest value representable by the type.
    pub fn max_value(self) -> f64 {
        match self {
            DataType::U8 => f64::from(u8::MAX),
            DataType::I8 => f64::from(i8::MAX),
            DataType::U16 => f64::from(u16::MAX),
            DataType::I16 => f64::from(i16::MAX),
            DataType::U32 => f64::from(u32::MAX),
            DataType::I32 => f64::from(i32::MAX),
            DataType::U64 => u64::MAX as f64,
            DataType::I64 => i64::MAX as f64,
            DataType::F32 => f64::from(f32::MAX),
            DataType::F64 => f64::MAX,
        }
    }

    pub fn bounds(self) -> [f64; 2] {
        [self.min_value(), self.max_value()]
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::U8 => "unsigned byte (8 bits)",
            DataType::I8 => "signed byte (8 bits)",
            DataType::U16 => "unsigned short (16 bits)",
            DataType::I16 => "signed short (16 bits)",
            DataType::U32 => "unsigned int (32 bits)",
            DataType::I32 => "signed int (32 bits)",
            DataType::U64 => "unsigned long (64 bits)",
            DataType::I64 => "signed long (64 bits)",
            DataType::F32 => "float (32 bits)",
            DataType::F64 => "double (64 bits)",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Numeric sample that can live in a plane, a dynamic array or a histogram.
///
/// Every type-specific accessor of the crate is written once against this
/// trait; the tagged containers ([`PlaneData`], [`NumericArray`]) are the only
/// places where the concrete types are enumerated.
pub trait Element:
    Copy + Default + PartialOrd + Send + Sync + fmt::Debug + 'static
{
    const DATA_TYPE: DataType;

    fn to_f64(self) -> f64;

    /// Saturating conversion, NaN maps to zero for integer types.
    fn from_f64(value: f64) -> Self;

    /// Value with signed integers reinterpreted as their unsigned counterpart.
    fn to_unsigned_f64(self) -> f64;

    fn wrap_channels(channels: Vec<ArcArray2<Self>>) -> PlaneData;

    fn channels(data: &PlaneData) -> Option<&[ArcArray2<Self>]>;

    fn channels_mut(data: &mut PlaneData) -> Option<&mut Vec<ArcArray2<Self>>>;

    fn wrap_array(values: Vec<Self>) -> NumericArray;

    fn array(values: &NumericArray) -> Option<&[Self]>;

    fn write_le(values: &[Self], out: &mut Vec<u8>);

    fn read_le(bytes: &[u8]) -> Vec<Self>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident, $unsigned:ty;)*) => {
        $(
            impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$variant;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }

                fn to_unsigned_f64(self) -> f64 {
                    (self as $unsigned) as f64
                }

                fn wrap_channels(channels: Vec<ArcArray2<Self>>) -> PlaneData {
                    PlaneData::$variant(channels)
                }

                fn channels(data: &PlaneData) -> Option<&[ArcArray2<Self>]> {
                    match data {
                        PlaneData::$variant(channels) => Some(channels.as_slice()),
                        _ => None,
                    }
                }

                fn channels_mut(data: &mut PlaneData) -> Option<&mut Vec<ArcArray2<Self>>> {
                    match data {
                        PlaneData::$variant(channels) => Some(channels),
                        _ => None,
                    }
                }

                fn wrap_array(values: Vec<Self>) -> NumericArray {
                    NumericArray::$variant(values)
                }

                fn array(values: &NumericArray) -> Option<&[Self]> {
                    match values {
                        NumericArray::$variant(values) => Some(values.as_slice()),
                        _ => None,
                    }
                }

                fn write_le(values: &[Self], out: &mut Vec<u8>) {
                    out.reserve(values.len() * std::mem::size_of::<$ty>());
                    for value in values {
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                }

                fn read_le(bytes: &[u8]) -> Vec<Self> {
                    bytes
                        .chunks_exact(std::mem::size_of::<$ty>())
                        .map(|chunk| {
                            let mut raw = [0_u8; std::mem::size_of::<$ty>()];
                            raw.copy_from_slice(chunk);
                            <$ty>::from_le_bytes(raw)
                        })
                        .collect()
                }
            }
        )*
    };
}

impl_element! {
    u8 => U8, u8;
    i8 => I8, u8;
    u16 => U16, u16;
    i16 => I16, u16;
    u32 => U32, u32;
    i32 => I32, u32;
    u64 => U64, u64;
    i64 => I64, u64;
    f32 => F32, f32;
    f64 => F64, f64;
}
