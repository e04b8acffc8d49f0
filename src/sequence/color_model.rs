use std::sync::{Arc, RwLock};

use crate::model::DataType;
use crate::runtime::sync::{read, write};

use super::Plane;

const DEFAULT_COLORMAPS: [&str; 3] = ["red", "green", "blue"];

/// Per-channel colormap names, shared by every plane of a sequence.
#[derive(Debug)]
pub struct ColorSpace {
    colormaps: RwLock<Vec<String>>,
}

impl ColorSpace {
    pub fn new(size_c: usize) -> Self {
        let colormaps = if size_c == 1 {
            vec!["gray".to_string()]
        } else {
            (0..size_c)
                .map(|c| DEFAULT_COLORMAPS.get(c).copied().unwrap_or("gray").to_string())
                .collect()
        };
        Self {
            colormaps: RwLock::new(colormaps),
        }
    }

    pub fn size_c(&self) -> usize {
        read(&self.colormaps).len()
    }

    pub fn colormap(&self, c: usize) -> Option<String> {
        read(&self.colormaps).get(c).cloned()
    }

    /// Returns `false` when `c` is not a channel of this color space.
    pub fn set_colormap(&self, c: usize, name: impl Into<String>) -> bool {
        match write(&self.colormaps).get_mut(c) {
            Some(slot) => {
                *slot = name.into();
                true
            }
            None => false,
        }
    }
}

/// Sample type, channel count and channel bounds of a sequence.
///
/// A published color model is never mutated; bound updates build a new one.
#[derive(Debug, Clone)]
pub struct ColorModel {
    data_type: DataType,
    size_c: usize,
    abs_bounds: Vec<[f64; 2]>,
    user_bounds: Vec<[f64; 2]>,
    color_space: Arc<ColorSpace>,
}

impl ColorModel {
    pub fn new(data_type: DataType, size_c: usize) -> Self {
        Self {
            data_type,
            size_c,
            abs_bounds: vec![data_type.bounds(); size_c],
            user_bounds: vec![data_type.bounds(); size_c],
            color_space: Arc::new(ColorSpace::new(size_c)),
        }
    }

    /// Color model describing `plane`, with a fresh color space.
    pub fn from_plane(plane: &Plane) -> Self {
        Self {
            data_type: plane.data_type(),
            size_c: plane.size_c(),
            abs_bounds: plane.channels_type_bounds(),
            user_bounds: plane.channels_bounds(),
            color_space: Arc::new(ColorSpace::new(plane.size_c())),
        }
    }

    pub fn with_bounds(&self, abs_bounds: Vec<[f64; 2]>, user_bounds: Vec<[f64; 2]>) -> Self {
        Self {
            abs_bounds,
            user_bounds,
            ..self.clone()
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn size_c(&self) -> usize {
        self.size_c
    }

    pub fn color_space(&self) -> &Arc<ColorSpace> {
        &self.color_space
    }

    pub fn is_compatible(&self, plane: &Plane) -> bool {
        plane.data_type() == self.data_type && plane.size_c() == self.size_c
    }

    pub fn abs_bounds(&self, c: usize) -> [f64; 2] {
        self.abs_bounds.get(c).copied().unwrap_or([0.0, 0.0])
    }

    pub fn user_bounds(&self, c: usize) -> [f64; 2] {
        self.user_bounds.get(c).copied().unwrap_or([0.0, 0.0])
    }

    pub fn all_abs_bounds(&self) -> &[[f64; 2]] {
        &self.abs_bounds
    }

    pub fn all_user_bounds(&self) -> &[[f64; 2]] {
        &self.user_bounds
    }
}
