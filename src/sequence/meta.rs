use std::path::PathBuf;

use crate::model::{DimensionId, SequenceMetadata};
use crate::runtime::sync::{lock, read, write};

use super::{OriginInfo, Result, Sequence};

pub const META_NAME: &str = "name";
pub const META_POSITION_X: &str = "positionX";
pub const META_POSITION_Y: &str = "positionY";
pub const META_POSITION_Z: &str = "positionZ";
pub const META_POSITION_T: &str = "positionT";
pub const META_POSITION_T_OFFSET: &str = "positionTOffset";
pub const META_PIXEL_SIZE_X: &str = "pixelSizeX";
pub const META_PIXEL_SIZE_Y: &str = "pixelSizeY";
pub const META_PIXEL_SIZE_Z: &str = "pixelSizeZ";
pub const META_TIME_INTERVAL: &str = "timeInterval";
pub const META_CHANNEL_NAME: &str = "channelName";
pub const META_SERIES: &str = "series";
pub const META_FILENAME: &str = "filename";
pub const META_ORIGIN: &str = "origin";
pub const META_VIRTUAL: &str = "virtual";

const SAVE_ATTEMPTS: usize = 5;

impl Sequence {
    pub fn metadata(&self) -> SequenceMetadata {
        read(&self.metadata).clone()
    }

    /// Replaces the whole metadata; listeners get one generic meta event.
    pub fn set_metadata(&self, mut metadata: SequenceMetadata) -> Result<()> {
        metadata.validate()?;
        metadata.fill_defaults();
        *write(&self.metadata) = metadata;
        self.changed_source(
            super::SequenceEventSource::Meta {
                field: None,
                param: None,
            },
            super::SequenceEventType::Changed,
        );
        Ok(())
    }

    /// Applies `edit` and fires a meta event for `field` when the metadata
    /// actually changed.
    fn edit_metadata(&self, field: &str, param: Option<usize>, edit: impl FnOnce(&mut SequenceMetadata)) {
        let changed = {
            let mut metadata = write(&self.metadata);
            let before = metadata.clone();
            edit(&mut metadata);
            *metadata != before
        };
        if changed {
            match param {
                Some(param) => self.meta_changed_param(field, param),
                None => self.meta_changed(field),
            }
        }
    }

    pub fn name(&self) -> String {
        read(&self.metadata).name.clone().unwrap_or_default()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.edit_metadata(META_NAME, None, |metadata| metadata.name = Some(name));
    }

    pub fn is_default_name(&self) -> bool {
        self.name().starts_with(super::DEFAULT_NAME)
    }

    pub fn pixel_size_x(&self) -> f64 {
        read(&self.metadata).spacing(DimensionId::X).unwrap_or(1.0)
    }

    pub fn pixel_size_y(&self) -> f64 {
        read(&self.metadata).spacing(DimensionId::Y).unwrap_or(1.0)
    }

    pub fn pixel_size_z(&self) -> f64 {
        read(&self.metadata).spacing(DimensionId::Z).unwrap_or(1.0)
    }

    /// Time interval in seconds.
    pub fn time_interval(&self) -> f64 {
        read(&self.metadata).spacing(DimensionId::T).unwrap_or(1.0)
    }

    fn set_spacing(&self, field: &str, axis: DimensionId, value: f64) -> bool {
        if !value.is_finite() || value <= 0.0 {
            return false;
        }
        self.edit_metadata(field, None, |metadata| metadata.set_spacing(axis, value));
        true
    }

    /// Returns `false` and keeps the current value for a non positive size.
    pub fn set_pixel_size_x(&self, value: f64) -> bool {
        self.set_spacing(META_PIXEL_SIZE_X, DimensionId::X, value)
    }

    pub fn set_pixel_size_y(&self, value: f64) -> bool {
        self.set_spacing(META_PIXEL_SIZE_Y, DimensionId::Y, value)
    }

    pub fn set_pixel_size_z(&self, value: f64) -> bool {
        self.set_spacing(META_PIXEL_SIZE_Z, DimensionId::Z, value)
    }

    pub fn set_time_interval(&self, value: f64) -> bool {
        self.set_spacing(META_TIME_INTERVAL, DimensionId::T, value)
    }

    pub fn position_x(&self) -> f64 {
        read(&self.metadata).position[0]
    }

    pub fn position_y(&self) -> f64 {
        read(&self.metadata).position[1]
    }

    pub fn position_z(&self) -> f64 {
        read(&self.metadata).position[2]
    }

    pub fn position_t(&self) -> i64 {
        read(&self.metadata).position_t
    }

    pub fn set_position_x(&self, value: f64) {
        self.edit_metadata(META_POSITION_X, None, |metadata| metadata.position[0] = value);
    }

    pub fn set_position_y(&self, value: f64) {
        self.edit_metadata(META_POSITION_Y, None, |metadata| metadata.position[1] = value);
    }

    pub fn set_position_z(&self, value: f64) {
        self.edit_metadata(META_POSITION_Z, None, |metadata| metadata.position[2] = value);
    }

    pub fn set_position_t(&self, value: i64) {
        self.edit_metadata(META_POSITION_T, None, |metadata| metadata.position_t = value);
    }

    /// Time offset in seconds of plane `(t, z, c)` from the sequence start.
    /// Falls back to `t × time_interval` when not recorded.
    pub fn position_t_offset(&self, t: usize, z: usize, c: usize) -> f64 {
        let metadata = read(&self.metadata);
        metadata.time_offset(t, z, c).unwrap_or_else(|| {
            t as f64 * metadata.spacing(DimensionId::T).unwrap_or(1.0)
        })
    }

    pub fn set_position_t_offset(&self, t: usize, z: usize, c: usize, offset: f64) {
        self.edit_metadata(META_POSITION_T_OFFSET, None, |metadata| {
            metadata.set_time_offset(t, z, c, offset)
        });
    }

    pub fn channel_name(&self, c: usize) -> String {
        read(&self.metadata)
            .channel_name(c)
            .map(str::to_string)
            .unwrap_or_else(|| default_channel_name(c))
    }

    pub fn set_channel_name(&self, c: usize, name: impl Into<String>) {
        let name = name.into();
        self.edit_metadata(META_CHANNEL_NAME, Some(c), |metadata| {
            metadata.set_channel_name(c, name)
        });
    }

    pub fn is_default_channel_name(&self, c: usize) -> bool {
        self.channel_name(c) == default_channel_name(c)
    }

    pub fn series(&self) -> usize {
        read(&self.metadata).series
    }

    pub fn set_series(&self, series: usize) {
        self.edit_metadata(META_SERIES, None, |metadata| metadata.series = series);
    }

    pub fn filename(&self) -> Option<PathBuf> {
        read(&self.metadata).source.clone()
    }

    pub fn set_filename(&self, filename: Option<PathBuf>) {
        self.edit_metadata(META_FILENAME, None, |metadata| metadata.source = filename);
    }

    pub fn origin_info(&self) -> OriginInfo {
        lock(&self.origin).clone()
    }

    pub fn set_origin_info(&self, origin: OriginInfo) {
        let changed = {
            let mut current = lock(&self.origin);
            std::mem::replace(&mut *current, origin) != *current
        };
        if changed {
            self.meta_changed(META_ORIGIN);
        }
    }

    pub fn is_persistence_enabled(&self) -> bool {
        self.persistence.is_some()
    }

    /// Writes the metadata through the persistence backend, retrying a few
    /// times. Returns `false` when there is no backend or every attempt
    /// failed.
    pub fn save_metadata(&self) -> bool {
        let Some(persistence) = &self.persistence else {
            return false;
        };
        let metadata = self.metadata();
        let mut last_error = None;
        for attempt in 1..=SAVE_ATTEMPTS {
            match persistence.save(self.id, &metadata) {
                Ok(()) => return true,
                Err(error) => {
                    log::debug!(
                        "sequence {}: metadata save attempt {attempt} failed: {error}",
                        self.id
                    );
                    last_error = Some(error);
                }
            }
        }
        if let Some(error) = last_error {
            log::error!("sequence {}: cannot save metadata: {error}", self.id);
        }
        false
    }

    /// Replaces the metadata with the persisted copy, if any. Returns whether
    /// a persisted copy was found.
    pub fn load_metadata(&self) -> Result<bool> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        let current = self.metadata();
        match persistence.load(self.id, &current)? {
            Some(stored) => {
                self.set_metadata(stored)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn default_channel_name(c: usize) -> String {
    format!("ch {c}")
}
