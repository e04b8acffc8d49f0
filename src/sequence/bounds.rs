use std::sync::Arc;
use std::sync::atomic::Ordering;

use rayon::prelude::*;

use crate::runtime::sync::{lock, read, write};

use super::{ChannelBoundsState, ColorModel, Sequence, SequenceEventSource, SequenceEventType};

fn union(acc: Option<Vec<[f64; 2]>>, bounds: Vec<[f64; 2]>) -> Option<Vec<[f64; 2]>> {
    match acc {
        None => Some(bounds),
        Some(mut acc) => {
            for (current, next) in acc.iter_mut().zip(bounds) {
                current[0] = current[0].min(next[0]);
                current[1] = current[1].max(next[1]);
            }
            Some(acc)
        }
    }
}

impl Sequence {
    pub fn color_model(&self) -> Option<Arc<ColorModel>> {
        read(&self.color_model).clone()
    }

    pub(super) fn set_color_model(&self, model: Option<ColorModel>) {
        *write(&self.color_model) = model.map(Arc::new);
        self.type_changed();
        self.changed_source(
            SequenceEventSource::ComponentBounds(None),
            SequenceEventType::Changed,
        );
        self.changed_source(SequenceEventSource::Colormap(None), SequenceEventType::Changed);
    }

    pub fn colormap(&self, c: usize) -> Option<String> {
        self.color_model()?.color_space().colormap(c)
    }

    pub fn set_colormap(&self, c: usize, name: impl Into<String>) -> bool {
        let Some(model) = self.color_model() else {
            return false;
        };
        if !model.color_space().set_colormap(c, name) {
            return false;
        }
        self.changed_source(SequenceEventSource::Colormap(Some(c)), SequenceEventType::Changed);
        true
    }

    pub fn auto_update_channel_bounds(&self) -> bool {
        self.auto_update_channel_bounds.load(Ordering::Acquire)
    }

    /// When enabled (the default) channel bounds follow every data change.
    /// Enabling it refreshes the bounds right away.
    pub fn set_auto_update_channel_bounds(&self, value: bool) {
        if self.auto_update_channel_bounds.swap(value, Ordering::AcqRel) == value {
            return;
        }
        let _scope = self.update_scope();
        for plane in self.all_images() {
            plane.set_auto_update_channel_bounds(value);
        }
        if value {
            self.update_channels_bounds(false);
        }
    }

    pub fn channel_bounds_state(&self) -> ChannelBoundsState {
        *lock(&self.bounds_state)
    }

    /// Refreshes the sequence channel bounds from the plane bounds; with
    /// `force` every plane recomputes its own bounds first.
    pub fn update_channels_bounds(&self, force: bool) {
        if force {
            self.recalculate_all_plane_bounds();
        }
        self.internal_update_channels_bounds();
    }

    pub(super) fn recalculate_all_plane_bounds(&self) {
        if self.color_model().is_none() {
            return;
        }
        let _scope = self.update_scope();
        self.all_images().par_iter().for_each(|plane| {
            if let Err(error) = plane.update_channels_bounds() {
                log::debug!("sequence {}: plane bounds not updated: {error}", self.id);
            }
        });
    }

    /// Publishes a color model whose absolute bounds cover the type bounds of
    /// every plane and whose user bounds cover their data bounds.
    pub(super) fn internal_update_channels_bounds(&self) {
        *lock(&self.bounds_state) = ChannelBoundsState::Valid;
        let Some(model) = self.color_model() else {
            return;
        };
        let planes = self.all_images();
        if planes.is_empty() {
            return;
        }
        let (abs_bounds, user_bounds) = planes.iter().fold((None, None), |(abs, user), plane| {
            (
                union(abs, plane.channels_type_bounds()),
                union(user, plane.channels_bounds()),
            )
        });
        let abs_bounds = abs_bounds.unwrap_or_default();
        let user_bounds = user_bounds.unwrap_or_default();
        if model.all_abs_bounds() == abs_bounds.as_slice()
            && model.all_user_bounds() == user_bounds.as_slice()
        {
            return;
        }
        let updated = Arc::new(model.with_bounds(abs_bounds, user_bounds));
        {
            let mut current = write(&self.color_model);
            // replaced concurrently; the replacement fired its own events
            if !current.as_ref().is_some_and(|current| Arc::ptr_eq(current, &model)) {
                return;
            }
            *current = Some(updated);
        }
        self.changed_source(
            SequenceEventSource::ComponentBounds(None),
            SequenceEventType::Changed,
        );
    }

    fn valid_color_model(&self) -> Option<Arc<ColorModel>> {
        let invalid = self.channel_bounds_state() == ChannelBoundsState::Invalid;
        if invalid && !self.is_updating() {
            self.internal_update_channels_bounds();
        }
        self.color_model()
    }

    /// Data bounds of channel `c` over the whole sequence.
    pub fn channel_bounds(&self, c: usize) -> [f64; 2] {
        self.valid_color_model()
            .map_or([0.0, 0.0], |model| model.user_bounds(c))
    }

    pub fn channels_bounds(&self) -> Vec<[f64; 2]> {
        self.valid_color_model()
            .map(|model| model.all_user_bounds().to_vec())
            .unwrap_or_default()
    }

    /// Bounds over all channels.
    pub fn channels_global_bounds(&self) -> [f64; 2] {
        let bounds = self.channels_bounds();
        if bounds.is_empty() {
            return [0.0, 0.0];
        }
        bounds
            .iter()
            .fold([f64::MAX, -f64::MAX], |acc, [min, max]| {
                [acc[0].min(*min), acc[1].max(*max)]
            })
    }

    pub fn channel_type_bounds(&self, c: usize) -> [f64; 2] {
        self.valid_color_model()
            .map_or([0.0, 0.0], |model| model.abs_bounds(c))
    }

    pub fn channels_type_bounds(&self) -> Vec<[f64; 2]> {
        self.valid_color_model()
            .map(|model| model.all_abs_bounds().to_vec())
            .unwrap_or_default()
    }

    pub fn channel_min(&self, c: usize) -> f64 {
        self.channel_bounds(c)[0]
    }

    pub fn channel_max(&self, c: usize) -> f64 {
        self.channel_bounds(c)[1]
    }
}
