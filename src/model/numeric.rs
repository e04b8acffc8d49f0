use ndarray::ArcArray2;

use super::{CoreError, DataType, Element, Result};

/// Channel arrays of one plane, tagged by sample type.
///
/// Each channel is a `(height, width)` array whose storage is shared until
/// written to, so handing a channel out or snapshotting a plane never copies
/// pixels.
#[derive(Debug, Clone)]
pub enum PlaneData {
    U8(Vec<ArcArray2<u8>>),
    I8(Vec<ArcArray2<i8>>),
    U16(Vec<ArcArray2<u16>>),
    I16(Vec<ArcArray2<i16>>),
    U32(Vec<ArcArray2<u32>>),
    I32(Vec<ArcArray2<i32>>),
    U64(Vec<ArcArray2<u64>>),
    I64(Vec<ArcArray2<i64>>),
    F32(Vec<ArcArray2<f32>>),
    F64(Vec<ArcArray2<f64>>),
}

macro_rules! dispatch_plane_data {
    ($data:expr, $channels:ident => $body:expr) => {
        match $data {
            $crate::model::PlaneData::U8($channels) => $body,
            $crate::model::PlaneData::I8($channels) => $body,
            $crate::model::PlaneData::U16($channels) => $body,
            $crate::model::PlaneData::I16($channels) => $body,
            $crate::model::PlaneData::U32($channels) => $body,
            $crate::model::PlaneData::I32($channels) => $body,
            $crate::model::PlaneData::U64($channels) => $body,
            $crate::model::PlaneData::I64($channels) => $body,
            $crate::model::PlaneData::F32($channels) => $body,
            $crate::model::PlaneData::F64($channels) => $body,
        }
    };
}

pub(crate) use dispatch_plane_data;

fn zero_channels<T: Element>(width: usize, height: usize, size_c: usize) -> PlaneData {
    T::wrap_channels(
        (0..size_c)
            .map(|_| ArcArray2::<T>::from_elem((height, width), T::default()))
            .collect(),
    )
}

fn channels_from_bytes<T: Element>(
    width: usize,
    height: usize,
    size_c: usize,
    bytes: &[u8],
) -> Result<PlaneData> {
    let values = T::read_le(bytes);
    let plane_len = width * height;
    if values.len() != plane_len * size_c {
        return Err(CoreError::InvalidLength {
            expected: plane_len * size_c,
            actual: values.len(),
        });
    }
    let mut channels = Vec::with_capacity(size_c);
    for chunk in values.chunks(plane_len.max(1)).take(size_c) {
        let array = ArcArray2::from_shape_vec((height, width), chunk.to_vec())
            .map_err(|error| CoreError::InvalidMetadata(error.to_string()))?;
        channels.push(array);
    }
    Ok(T::wrap_channels(channels))
}

impl PlaneData {
    pub fn zeros(data_type: DataType, width: usize, height: usize, size_c: usize) -> Self {
        match data_type {
            DataType::U8 => zero_channels::<u8>(width, height, size_c),
            DataType::I8 => zero_channels::<i8>(width, height, size_c),
            DataType::U16 => zero_channels::<u16>(width, height, size_c),
            DataType::I16 => zero_channels::<i16>(width, height, size_c),
            DataType::U32 => zero_channels::<u32>(width, height, size_c),
            DataType::I32 => zero_channels::<i32>(width, height, size_c),
            DataType::U64 => zero_channels::<u64>(width, height, size_c),
            DataType::I64 => zero_channels::<i64>(width, height, size_c),
            DataType::F32 => zero_channels::<f32>(width, height, size_c),
            DataType::F64 => zero_channels::<f64>(width, height, size_c),
        }
    }

    /// Builds plane data from per-channel row-major sample vectors.
    pub fn from_channels<T: Element>(
        width: usize,
        height: usize,
        channels: Vec<Vec<T>>,
    ) -> Result<Self> {
        if channels.is_empty() {
            return Err(CoreError::InvalidMetadata(
                "a plane needs at least one channel".to_string(),
            ));
        }
        let mut arrays = Vec::with_capacity(channels.len());
        for values in channels {
            if values.len() != width * height {
                return Err(CoreError::InvalidLength {
                    expected: width * height,
                    actual: values.len(),
                });
            }
            let array = ArcArray2::from_shape_vec((height, width), values)
                .map_err(|error| CoreError::InvalidMetadata(error.to_string()))?;
            arrays.push(array);
        }
        Ok(T::wrap_channels(arrays))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            PlaneData::U8(_) => DataType::U8,
            PlaneData::I8(_) => DataType::I8,
            PlaneData::U16(_) => DataType::U16,
            PlaneData::I16(_) => DataType::I16,
            PlaneData::U32(_) => DataType::U32,
            PlaneData::I32(_) => DataType::I32,
            PlaneData::U64(_) => DataType::U64,
            PlaneData::I64(_) => DataType::I64,
            PlaneData::F32(_) => DataType::F32,
            PlaneData::F64(_) => DataType::F64,
        }
    }

    pub fn size_c(&self) -> usize {
        dispatch_plane_data!(self, channels => channels.len())
    }

    /// `(width, height)` of the channel arrays.
    pub fn dims(&self) -> (usize, usize) {
        dispatch_plane_data!(self, channels => channels
            .first()
            .map(|channel| (channel.ncols(), channel.nrows()))
            .unwrap_or((0, 0)))
    }

    pub fn value(&self, c: usize, x: usize, y: usize) -> Option<f64> {
        dispatch_plane_data!(self, channels => channels
            .get(c)
            .and_then(|channel| channel.get((y, x)))
            .map(|value| value.to_f64()))
    }

    pub fn set_value(&mut self, c: usize, x: usize, y: usize, value: f64) -> bool {
        dispatch_plane_data!(self, channels => {
            match channels.get_mut(c).and_then(|channel| channel.get_mut((y, x))) {
                Some(slot) => {
                    *slot = Element::from_f64(value);
                    true
                }
                None => false,
            }
        })
    }

    /// Minimum and maximum of a channel, NaN samples ignored.
    pub fn channel_bounds(&self, c: usize) -> Option<[f64; 2]> {
        dispatch_plane_data!(self, channels => {
            let channel = channels.get(c)?;
            let mut bounds: Option<[f64; 2]> = None;
            for value in channel.iter() {
                let value = value.to_f64();
                if value.is_nan() {
                    continue;
                }
                bounds = Some(match bounds {
                    Some([min, max]) => [min.min(value), max.max(value)],
                    None => [value, value],
                });
            }
            Some(bounds.unwrap_or([0.0, 0.0]))
        })
    }

    pub fn channel_as_f64(&self, c: usize) -> Option<Vec<f64>> {
        dispatch_plane_data!(self, channels => channels
            .get(c)
            .map(|channel| channel.iter().map(|value| value.to_f64()).collect()))
    }

    /// Copy that shares nothing with `self`.
    pub fn deep_copy(&self) -> Self {
        dispatch_plane_data!(self, channels => Element::wrap_channels(
            channels
                .iter()
                .map(|channel| channel.to_owned().into_shared())
                .collect()
        ))
    }

    pub fn byte_len(&self) -> usize {
        let (width, height) = self.dims();
        width * height * self.size_c() * self.data_type().size_in_bytes()
    }

    /// Little endian serialization, channel after channel, row-major.
    pub fn write_le(&self, out: &mut Vec<u8>) {
        dispatch_plane_data!(self, channels => {
            for channel in channels {
                let values = channel.iter().copied().collect::<Vec<_>>();
                Element::write_le(&values, out);
            }
        })
    }

    pub fn read_le(
        data_type: DataType,
        width: usize,
        height: usize,
        size_c: usize,
        bytes: &[u8],
    ) -> Result<Self> {
        match data_type {
            DataType::U8 => channels_from_bytes::<u8>(width, height, size_c, bytes),
            DataType::I8 => channels_from_bytes::<i8>(width, height, size_c, bytes),
            DataType::U16 => channels_from_bytes::<u16>(width, height, size_c, bytes),
            DataType::I16 => channels_from_bytes::<i16>(width, height, size_c, bytes),
            DataType::U32 => channels_from_bytes::<u32>(width, height, size_c, bytes),
            DataType::I32 => channels_from_bytes::<i32>(width, height, size_c, bytes),
            DataType::U64 => channels_from_bytes::<u64>(width, height, size_c, bytes),
            DataType::I64 => channels_from_bytes::<i64>(width, height, size_c, bytes),
            DataType::F32 => channels_from_bytes::<f32>(width, height, size_c, bytes),
            DataType::F64 => channels_from_bytes::<f64>(width, height, size_c, bytes),
        }
    }
}

/// Flat sample vector tagged by sample type.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! dispatch_numeric_array {
    ($array:expr, $values:ident => $body:expr) => {
        match $array {
            NumericArray::U8($values) => $body,
            NumericArray::I8($values) => $body,
            NumericArray::U16($values) => $body,
            NumericArray::I16($values) => $body,
            NumericArray::U32($values) => $body,
            NumericArray::I32($values) => $body,
            NumericArray::U64($values) => $body,
            NumericArray::I64($values) => $body,
            NumericArray::F32($values) => $body,
            NumericArray::F64($values) => $body,
        }
    };
}

impl NumericArray {
    pub fn data_type(&self) -> DataType {
        match self {
            NumericArray::U8(_) => DataType::U8,
            NumericArray::I8(_) => DataType::I8,
            NumericArray::U16(_) => DataType::U16,
            NumericArray::I16(_) => DataType::I16,
            NumericArray::U32(_) => DataType::U32,
            NumericArray::I32(_) => DataType::I32,
            NumericArray::U64(_) => DataType::U64,
            NumericArray::I64(_) => DataType::I64,
            NumericArray::F32(_) => DataType::F32,
            NumericArray::F64(_) => DataType::F64,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_numeric_array!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        dispatch_numeric_array!(self, values => values.get(index).map(|value| value.to_f64()))
    }

    /// Every sample as `f64`, optionally reading signed integers as unsigned.
    pub fn to_f64_vec(&self, unsigned: bool) -> Vec<f64> {
        dispatch_numeric_array!(self, values => values
            .iter()
            .map(|value| if unsigned { value.to_unsigned_f64() } else { value.to_f64() })
            .collect())
    }
}
