use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionId {
    X,
    Y,
    Z,
    T,
    C,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimension5D {
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub size_t: usize,
    pub size_c: usize,
}

impl Dimension5D {
    pub fn get(&self, dim: DimensionId) -> usize {
        match dim {
            DimensionId::X => self.size_x,
            DimensionId::Y => self.size_y,
            DimensionId::Z => self.size_z,
            DimensionId::T => self.size_t,
            DimensionId::C => self.size_c,
            DimensionId::Null => 0,
        }
    }

    /// Total sample count, `None` on overflow.
    pub fn num_sample(&self) -> Option<u64> {
        [self.size_x, self.size_y, self.size_c, self.size_z, self.size_t]
            .iter()
            .try_fold(1_u64, |acc, size| acc.checked_mul(*size as u64))
    }
}

/// Integer rectangle, used to remember the XY crop of a derived sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u64,
    pub height: u64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: u64, height: u64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
