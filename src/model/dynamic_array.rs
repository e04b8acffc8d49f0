use super::{CoreError, DataType, NumericArray, Result};

pub const DEFAULT_GRANULARITY: u32 = 4;
pub const MAX_GRANULARITY: u32 = 8;

/// Growable array stored as a list of fixed-size blocks.
///
/// Appending never moves existing samples: a full block stays where it is and
/// a new one is allocated behind it. The block size is `256 << granularity`
/// with the granularity clamped to `0..=8`. Blocks past the logical size are
/// reserved capacity.
#[derive(Debug, Clone)]
pub struct DynamicArray<T> {
    block_size: usize,
    blocks: Vec<Vec<T>>,
    size: usize,
}

impl<T: Clone + Default> Default for DynamicArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default> DynamicArray<T> {
    pub fn new() -> Self {
        Self::with_granularity(DEFAULT_GRANULARITY)
    }

    pub fn with_granularity(granularity: u32) -> Self {
        Self {
            block_size: 1 << (8 + granularity.min(MAX_GRANULARITY)),
            blocks: Vec::new(),
            size: 0,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn clear(&mut self) {
        self.set_size(0);
    }

    fn reserve_blocks(&mut self, size: usize) {
        while self.capacity() < size {
            self.blocks.push(vec![T::default(); self.block_size]);
        }
    }

    pub fn add_single(&mut self, value: T) {
        self.reserve_blocks(self.size + 1);
        let index = self.size;
        self.blocks[index / self.block_size][index % self.block_size] = value;
        self.size += 1;
    }

    /// Appends `values`, spilling over as many new blocks as needed.
    pub fn add(&mut self, values: &[T]) {
        let offset = self.size;
        self.put(offset, values);
    }

    pub fn add_all(&mut self, other: &DynamicArray<T>) {
        let mut remaining = other.size;
        for block in &other.blocks {
            let count = remaining.min(block.len());
            self.add(&block[..count]);
            remaining -= count;
        }
    }

    pub fn get_value(&self, index: usize) -> Option<&T> {
        if index >= self.size {
            return None;
        }
        Some(&self.blocks[index / self.block_size][index % self.block_size])
    }

    /// Copies `out.len()` samples starting at `offset` into `out`.
    pub fn get(&self, offset: usize, out: &mut [T]) -> Result<()> {
        let end = offset.checked_add(out.len());
        if end.is_none_or(|end| end > self.size) {
            return Err(CoreError::IndexOutOfBounds {
                index: end.unwrap_or(usize::MAX),
                len: self.size,
            });
        }
        let mut source = offset;
        let mut written = 0;
        while written < out.len() {
            let block = &self.blocks[source / self.block_size];
            let sub_offset = source % self.block_size;
            let count = (self.block_size - sub_offset).min(out.len() - written);
            out[written..written + count].clone_from_slice(&block[sub_offset..sub_offset + count]);
            source += count;
            written += count;
        }
        Ok(())
    }

    /// Writes `values` at `offset`, growing the array when it ends past the
    /// current size. Samples skipped over by the growth read as default.
    pub fn put(&mut self, offset: usize, values: &[T]) {
        let end = offset + values.len();
        if end > self.size {
            self.set_size(end);
        }
        let block_size = self.block_size;
        let mut target = offset;
        let mut read = 0;
        while read < values.len() {
            let block = &mut self.blocks[target / block_size];
            let sub_offset = target % block_size;
            let count = (block_size - sub_offset).min(values.len() - read);
            block[sub_offset..sub_offset + count].clone_from_slice(&values[read..read + count]);
            target += count;
            read += count;
        }
    }

    /// Grows or shrinks the logical size. Growth appends full blocks, shrink
    /// drops trailing blocks so only the last one is partially used.
    pub fn set_size(&mut self, size: usize) {
        if size == 0 {
            self.blocks.clear();
            self.size = 0;
            return;
        }
        let block_size = self.block_size;
        if size > self.size {
            self.reserve_blocks(size);
            // samples left over from an earlier shrink read as default again
            let mut index = self.size;
            while index < size {
                let block = &mut self.blocks[index / block_size];
                let sub_offset = index % block_size;
                let count = (block_size - sub_offset).min(size - index);
                block[sub_offset..sub_offset + count].fill(T::default());
                index += count;
            }
        }
        self.blocks.truncate(size.div_ceil(block_size));
        self.size = size;
    }

    /// Makes sure `size` samples fit without changing the logical size;
    /// never shrinks.
    pub fn check_capacity(&mut self, size: usize) {
        self.reserve_blocks(size);
    }

    /// Contiguous copy of the logical content.
    pub fn as_array(&self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.size);
        let mut remaining = self.size;
        for block in &self.blocks {
            let count = remaining.min(block.len());
            result.extend_from_slice(&block[..count]);
            remaining -= count;
        }
        result
    }
}

/// Dynamic array whose sample type is chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyDynamicArray {
    U8(DynamicArray<u8>),
    I8(DynamicArray<i8>),
    U16(DynamicArray<u16>),
    I16(DynamicArray<i16>),
    U32(DynamicArray<u32>),
    I32(DynamicArray<i32>),
    U64(DynamicArray<u64>),
    I64(DynamicArray<i64>),
    F32(DynamicArray<f32>),
    F64(DynamicArray<f64>),
}

macro_rules! dispatch_dynamic_array {
    ($array:expr, $inner:ident => $body:expr) => {
        match $array {
            AnyDynamicArray::U8($inner) => $body,
            AnyDynamicArray::I8($inner) => $body,
            AnyDynamicArray::U16($inner) => $body,
            AnyDynamicArray::I16($inner) => $body,
            AnyDynamicArray::U32($inner) => $body,
            AnyDynamicArray::I32($inner) => $body,
            AnyDynamicArray::U64($inner) => $body,
            AnyDynamicArray::I64($inner) => $body,
            AnyDynamicArray::F32($inner) => $body,
            AnyDynamicArray::F64($inner) => $body,
        }
    };
}

impl AnyDynamicArray {
    pub fn create(data_type: DataType, granularity: u32) -> Self {
        match data_type {
            DataType::U8 => AnyDynamicArray::U8(DynamicArray::with_granularity(granularity)),
            DataType::I8 => AnyDynamicArray::I8(DynamicArray::with_granularity(granularity)),
            DataType::U16 => AnyDynamicArray::U16(DynamicArray::with_granularity(granularity)),
            DataType::I16 => AnyDynamicArray::I16(DynamicArray::with_granularity(granularity)),
            DataType::U32 => AnyDynamicArray::U32(DynamicArray::with_granularity(granularity)),
            DataType::I32 => AnyDynamicArray::I32(DynamicArray::with_granularity(granularity)),
            DataType::U64 => AnyDynamicArray::U64(DynamicArray::with_granularity(granularity)),
            DataType::I64 => AnyDynamicArray::I64(DynamicArray::with_granularity(granularity)),
            DataType::F32 => AnyDynamicArray::F32(DynamicArray::with_granularity(granularity)),
            DataType::F64 => AnyDynamicArray::F64(DynamicArray::with_granularity(granularity)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            AnyDynamicArray::U8(_) => DataType::U8,
            AnyDynamicArray::I8(_) => DataType::I8,
            AnyDynamicArray::U16(_) => DataType::U16,
            AnyDynamicArray::I16(_) => DataType::I16,
            AnyDynamicArray::U32(_) => DataType::U32,
            AnyDynamicArray::I32(_) => DataType::I32,
            AnyDynamicArray::U64(_) => DataType::U64,
            AnyDynamicArray::I64(_) => DataType::I64,
            AnyDynamicArray::F32(_) => DataType::F32,
            AnyDynamicArray::F64(_) => DataType::F64,
        }
    }

    pub fn size(&self) -> usize {
        dispatch_dynamic_array!(self, inner => inner.size())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn set_size(&mut self, size: usize) {
        dispatch_dynamic_array!(self, inner => inner.set_size(size))
    }

    pub fn clear(&mut self) {
        self.set_size(0);
    }

    /// Appends a tagged array of the same sample type.
    pub fn add(&mut self, values: &NumericArray) -> Result<()> {
        match (self, values) {
            (AnyDynamicArray::U8(inner), NumericArray::U8(values)) => inner.add(values),
            (AnyDynamicArray::I8(inner), NumericArray::I8(values)) => inner.add(values),
            (AnyDynamicArray::U16(inner), NumericArray::U16(values)) => inner.add(values),
            (AnyDynamicArray::I16(inner), NumericArray::I16(values)) => inner.add(values),
            (AnyDynamicArray::U32(inner), NumericArray::U32(values)) => inner.add(values),
            (AnyDynamicArray::I32(inner), NumericArray::I32(values)) => inner.add(values),
            (AnyDynamicArray::U64(inner), NumericArray::U64(values)) => inner.add(values),
            (AnyDynamicArray::I64(inner), NumericArray::I64(values)) => inner.add(values),
            (AnyDynamicArray::F32(inner), NumericArray::F32(values)) => inner.add(values),
            (AnyDynamicArray::F64(inner), NumericArray::F64(values)) => inner.add(values),
            (array, values) => {
                return Err(CoreError::TypeMismatch {
                    expected: array.data_type(),
                    actual: values.data_type(),
                });
            }
        }
        Ok(())
    }

    pub fn as_array(&self) -> NumericArray {
        match self {
            AnyDynamicArray::U8(inner) => NumericArray::U8(inner.as_array()),
            AnyDynamicArray::I8(inner) => NumericArray::I8(inner.as_array()),
            AnyDynamicArray::U16(inner) => NumericArray::U16(inner.as_array()),
            AnyDynamicArray::I16(inner) => NumericArray::I16(inner.as_array()),
            AnyDynamicArray::U32(inner) => NumericArray::U32(inner.as_array()),
            AnyDynamicArray::I32(inner) => NumericArray::I32(inner.as_array()),
            AnyDynamicArray::U64(inner) => NumericArray::U64(inner.as_array()),
            AnyDynamicArray::I64(inner) => NumericArray::I64(inner.as_array()),
            AnyDynamicArray::F32(inner) => NumericArray::F32(inner.as_array()),
            AnyDynamicArray::F64(inner) => NumericArray::F64(inner.as_array()),
        }
    }
}
