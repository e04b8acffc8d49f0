use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{CoreError, DimensionId, Result};

const AXES: [DimensionId; 5] = [
    DimensionId::X,
    DimensionId::Y,
    DimensionId::Z,
    DimensionId::T,
    DimensionId::C,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dim {
    pub axis: DimensionId,
    pub size: usize,
    pub spacing: Option<f64>,
    pub unit: Option<String>,
}

impl Dim {
    pub fn new(axis: DimensionId, size: usize) -> Self {
        Self {
            axis,
            size,
            spacing: None,
            unit: None,
        }
    }
}

/// Acquisition time of one plane relative to the sequence start, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneTimeOffset {
    pub t: usize,
    pub z: usize,
    pub c: usize,
    pub offset: f64,
}

/// Narrow OME-shaped metadata surface of a sequence.
///
/// The X/Y/Z spacing is the pixel size in micrometers and the T spacing the
/// time interval in seconds. Sizes are only hints: a sequence holding planes
/// always reports the geometry of its planes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    pub name: Option<String>,
    #[serde(default)]
    pub series: usize,
    pub dims: Vec<Dim>,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub position_t: i64,
    #[serde(default)]
    pub time_offsets: Vec<PlaneTimeOffset>,
    #[serde(default)]
    pub channel_names: Vec<String>,
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl Default for SequenceMetadata {
    fn default() -> Self {
        Self {
            name: None,
            series: 0,
            dims: AXES.iter().map(|axis| Dim::new(*axis, 0)).collect(),
            position: [0.0; 3],
            position_t: 0,
            time_offsets: Vec::new(),
            channel_names: Vec::new(),
            source: None,
            extras: BTreeMap::new(),
        }
    }
}

impl SequenceMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn axis_index(&self, axis: DimensionId) -> Option<usize> {
        self.dims.iter().position(|d| d.axis == axis)
    }

    pub fn dim(&self, axis: DimensionId) -> Option<&Dim> {
        self.dims.iter().find(|d| d.axis == axis)
    }

    fn dim_mut(&mut self, axis: DimensionId) -> &mut Dim {
        let index = match self.axis_index(axis) {
            Some(index) => index,
            None => {
                self.dims.push(Dim::new(axis, 0));
                self.dims.len() - 1
            }
        };
        &mut self.dims[index]
    }

    pub fn size(&self, axis: DimensionId) -> usize {
        self.dim(axis).map(|d| d.size).unwrap_or(0)
    }

    pub fn set_size(&mut self, axis: DimensionId, size: usize) {
        self.dim_mut(axis).size = size;
    }

    pub fn spacing(&self, axis: DimensionId) -> Option<f64> {
        self.dim(axis).and_then(|d| d.spacing)
    }

    pub fn set_spacing(&mut self, axis: DimensionId, value: f64) {
        self.dim_mut(axis).spacing = Some(value);
    }

    pub fn time_offset(&self, t: usize, z: usize, c: usize) -> Option<f64> {
        self.time_offsets
            .iter()
            .find(|entry| entry.t == t && entry.z == z && entry.c == c)
            .map(|entry| entry.offset)
    }

    pub fn set_time_offset(&mut self, t: usize, z: usize, c: usize, offset: f64) {
        match self
            .time_offsets
            .iter_mut()
            .find(|entry| entry.t == t && entry.z == z && entry.c == c)
        {
            Some(entry) => entry.offset = offset,
            None => self.time_offsets.push(PlaneTimeOffset { t, z, c, offset }),
        }
    }

    /// Mean delay between consecutive time points, from the offsets of the
    /// first plane of each time point. Zero when fewer than two are known.
    pub fn time_interval_from_offsets(&self) -> f64 {
        let mut offsets = self
            .time_offsets
            .iter()
            .filter(|entry| entry.z == 0 && entry.c == 0)
            .map(|entry| (entry.t, entry.offset))
            .collect::<Vec<_>>();
        offsets.sort_by_key(|(t, _)| *t);
        match (offsets.first(), offsets.last()) {
            (Some((first_t, first)), Some((last_t, last))) if last_t > first_t => {
                (last - first) / (last_t - first_t) as f64
            }
            _ => 0.0,
        }
    }

    pub fn channel_name(&self, c: usize) -> Option<&str> {
        self.channel_names
            .get(c)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn set_channel_name(&mut self, c: usize, name: impl Into<String>) {
        if self.channel_names.len() <= c {
            self.channel_names.resize(c + 1, String::new());
        }
        self.channel_names[c] = name.into();
    }

    /// Fills undefined pixel sizes and time interval with their defaults.
    pub fn fill_defaults(&mut self) {
        for axis in [DimensionId::X, DimensionId::Y, DimensionId::Z] {
            if self.spacing(axis).is_none() {
                self.set_spacing(axis, 1.0);
            }
        }
        if self.spacing(DimensionId::T).is_none() {
            let interval = self.time_interval_from_offsets();
            self.set_spacing(DimensionId::T, if interval != 0.0 { interval } else { 1.0 });
        }
    }

    pub fn validate(&self) -> Result<()> {
        for dim in &self.dims {
            if let Some(spacing) = dim.spacing {
                if !spacing.is_finite() || spacing < 0.0 {
                    return Err(CoreError::InvalidMetadata(format!(
                        "spacing of axis {:?} must be a finite positive value, got {spacing}",
                        dim.axis
                    )));
                }
            }
        }
        Ok(())
    }
}
