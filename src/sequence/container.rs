use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::model::{DataType, Dimension5D, DimensionId, Rect, SequenceMetadata};
use crate::runtime::AppContext;
use crate::runtime::sync::{lock, read};

use super::updater::UpdateCoalescer;
use super::{
    ColorModel, ImageProvider, MetadataPersistence, Overlay, Plane, PlaneChange, PlaneListener,
    Prefetcher, Result, Roi, SequenceError, SequenceEvent, SequenceEventSource, SequenceEventType,
    SequenceListener, SequenceModelListener, UndoHistory, VolumetricImage,
};

pub const DEFAULT_NAME: &str = "no name";

/// Where a derived sequence comes from inside its parent: resolution level,
/// XY crop, Z and T ranges, and extracted channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OriginInfo {
    pub resolution: usize,
    pub xy_region: Option<Rect>,
    pub z_range: Option<(usize, usize)>,
    pub t_range: Option<(usize, usize)>,
    pub channel: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelBoundsState {
    Valid,
    /// Planes changed inside a batched update; recomputed when the outermost
    /// update ends or on the next bounds query.
    Invalid,
}

pub(super) struct ListenerEntry {
    listener: Weak<dyn SequenceListener>,
    legacy: bool,
}

/// 5D image (X, Y, C, Z, T) made of planes stored per time point.
///
/// All planes share the data type, channel count and XY size described by
/// the color model. Every mutation is reported as a [`SequenceEvent`]; inside
/// a [`begin_update`](Self::begin_update) / [`end_update`](Self::end_update)
/// bracket events are merged and dispatched once. Listeners are always called
/// with no internal lock held, so they may call back into the sequence.
pub struct Sequence {
    pub(super) id: u64,
    pub(super) self_ref: Weak<Sequence>,
    pub(super) metadata: RwLock<SequenceMetadata>,
    pub(super) origin: Mutex<OriginInfo>,
    pub(super) volumetric_images: Mutex<BTreeMap<usize, VolumetricImage>>,
    pub(super) rois: Mutex<Vec<Roi>>,
    pub(super) overlays: Mutex<Vec<Overlay>>,
    pub(super) color_model: RwLock<Option<Arc<ColorModel>>>,
    pub(super) bounds_state: Mutex<ChannelBoundsState>,
    pub(super) auto_update_channel_bounds: AtomicBool,
    pub(super) updater: UpdateCoalescer<SequenceEvent>,
    pub(super) listeners: Mutex<Vec<ListenerEntry>>,
    pub(super) model_listeners: Mutex<Vec<Weak<dyn SequenceModelListener>>>,
    pub(super) history: Mutex<UndoHistory>,
    pub(super) provider: Mutex<Option<Arc<dyn ImageProvider>>>,
    pub(super) persistence: Option<Arc<dyn MetadataPersistence>>,
    pub(super) prefetcher: Arc<Prefetcher>,
    pub(super) closed: AtomicBool,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Sequence")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("dimension", &self.dimension_5d())
            .field("data_type", &self.data_type())
            .finish()
    }
}

/// Keeps a batched update open until dropped.
#[must_use = "the update ends as soon as the scope is dropped"]
pub struct UpdateScope<'a> {
    sequence: &'a Sequence,
}

impl Drop for UpdateScope<'_> {
    fn drop(&mut self) {
        self.sequence.end_update();
    }
}

fn first_plane(volumes: &BTreeMap<usize, VolumetricImage>) -> Option<Plane> {
    volumes
        .values()
        .find_map(|volume| volume.first_image().cloned())
}

fn live<L: ?Sized>(listeners: &mut Vec<Weak<L>>) -> Vec<Arc<L>> {
    listeners.retain(|listener| listener.strong_count() > 0);
    listeners.iter().filter_map(Weak::upgrade).collect()
}

impl Sequence {
    pub fn new(ctx: &AppContext) -> Arc<Self> {
        Self::build(ctx, SequenceMetadata::default())
    }

    pub fn with_metadata(ctx: &AppContext, metadata: SequenceMetadata) -> Result<Arc<Self>> {
        metadata.validate()?;
        Ok(Self::build(ctx, metadata))
    }

    /// Sequence holding `plane` at `(t = 0, z = 0)`.
    pub fn from_plane(ctx: &AppContext, plane: Plane) -> Result<Arc<Self>> {
        let sequence = Self::new(ctx);
        sequence.set_image(0, 0, plane)?;
        Ok(sequence)
    }

    fn build(ctx: &AppContext, mut metadata: SequenceMetadata) -> Arc<Self> {
        let id = ctx.ids().next_id();
        if metadata.name.as_deref().is_none_or(str::is_empty) {
            metadata.name = Some(format!("{DEFAULT_NAME} {id:03}"));
        }
        metadata.fill_defaults();
        let settings = ctx.settings();

        Arc::new_cyclic(|self_ref| Self {
            id,
            self_ref: self_ref.clone(),
            metadata: RwLock::new(metadata),
            origin: Mutex::new(OriginInfo::default()),
            volumetric_images: Mutex::new(BTreeMap::new()),
            rois: Mutex::new(Vec::new()),
            overlays: Mutex::new(Vec::new()),
            color_model: RwLock::new(None),
            bounds_state: Mutex::new(ChannelBoundsState::Valid),
            auto_update_channel_bounds: AtomicBool::new(settings.auto_update_channel_bounds),
            updater: UpdateCoalescer::new(),
            listeners: Mutex::new(Vec::new()),
            model_listeners: Mutex::new(Vec::new()),
            history: Mutex::new(UndoHistory::new(settings.history_size)),
            provider: Mutex::new(None),
            persistence: ctx.persistence().cloned(),
            prefetcher: Arc::clone(ctx.prefetcher()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn image_provider(&self) -> Option<Arc<dyn ImageProvider>> {
        lock(&self.provider).clone()
    }

    /// Provider closed when the sequence is dropped.
    pub fn set_image_provider(&self, provider: Option<Arc<dyn ImageProvider>>) {
        *lock(&self.provider) = provider;
    }

    fn plane_listener(&self) -> Weak<dyn PlaneListener> {
        self.self_ref.clone()
    }

    // ---- listeners and events ----

    pub fn add_listener(&self, listener: Weak<dyn SequenceListener>) {
        self.register_listener(listener, false);
    }

    /// Registers a listener that also receives every overlay event a second
    /// time as a `Painter` event.
    pub fn add_legacy_listener(&self, listener: Weak<dyn SequenceListener>) {
        self.register_listener(listener, true);
    }

    fn register_listener(&self, listener: Weak<dyn SequenceListener>, legacy: bool) {
        let mut listeners = lock(&self.listeners);
        if !listeners
            .iter()
            .any(|entry| Weak::ptr_eq(&entry.listener, &listener))
        {
            listeners.push(ListenerEntry { listener, legacy });
        }
    }

    pub fn remove_listener(&self, listener: &Weak<dyn SequenceListener>) {
        lock(&self.listeners).retain(|entry| !Weak::ptr_eq(&entry.listener, listener));
    }

    pub fn add_model_listener(&self, listener: Weak<dyn SequenceModelListener>) {
        let mut listeners = lock(&self.model_listeners);
        if !listeners.iter().any(|known| Weak::ptr_eq(known, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_model_listener(&self, listener: &Weak<dyn SequenceModelListener>) {
        lock(&self.model_listeners).retain(|known| !Weak::ptr_eq(known, listener));
    }

    fn sequence_listeners(&self) -> Vec<(Arc<dyn SequenceListener>, bool)> {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|entry| entry.listener.strong_count() > 0);
        listeners
            .iter()
            .filter_map(|entry| entry.listener.upgrade().map(|listener| (listener, entry.legacy)))
            .collect()
    }

    fn fire_changed(&self, event: &SequenceEvent) {
        let painter = event.as_painter();
        for (listener, legacy) in self.sequence_listeners() {
            listener.sequence_changed(event);
            if let (true, Some(painter)) = (legacy, &painter) {
                listener.sequence_changed(painter);
            }
        }
    }

    fn fire_model_image_changed(&self) {
        let listeners = live(&mut *lock(&self.model_listeners));
        for listener in listeners {
            listener.image_changed();
        }
    }

    fn fire_model_dimension_changed(&self) {
        let listeners = live(&mut *lock(&self.model_listeners));
        for listener in listeners {
            listener.dimension_changed();
        }
    }

    /// Routes `event` through the update bracket.
    pub(super) fn changed(&self, event: SequenceEvent) {
        if let Some(event) = self.updater.changed(event) {
            self.on_changed(event);
        }
    }

    pub(super) fn changed_source(&self, source: SequenceEventSource, kind: SequenceEventType) {
        self.changed(SequenceEvent::new(self.id, source, kind));
    }

    fn on_changed(&self, event: SequenceEvent) {
        match &event.source {
            SequenceEventSource::Data(source) => {
                if self.auto_update_channel_bounds() {
                    if source.is_none() {
                        self.recalculate_all_plane_bounds();
                    }
                    self.internal_update_channels_bounds();
                }
                self.fire_model_image_changed();
            }
            SequenceEventSource::Type => self.fire_model_dimension_changed(),
            _ => {}
        }
        self.fire_changed(&event);
    }

    pub fn begin_update(&self) {
        self.updater.begin_update();
    }

    /// Closes one update level. Closing the outermost level dispatches the
    /// merged events and recomputes invalidated channel bounds.
    pub fn end_update(&self) {
        for event in self.updater.end_update() {
            self.on_changed(event);
        }
        if !self.updater.is_updating() {
            let invalid = {
                let mut state = lock(&self.bounds_state);
                std::mem::replace(&mut *state, ChannelBoundsState::Valid)
                    == ChannelBoundsState::Invalid
            };
            if invalid {
                self.internal_update_channels_bounds();
            }
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updater.is_updating()
    }

    /// Opens an update level closed when the returned scope is dropped.
    pub fn update_scope(&self) -> UpdateScope<'_> {
        self.begin_update();
        UpdateScope { sequence: self }
    }

    /// Generic data change: every plane bounds is recomputed.
    pub fn data_changed(&self) {
        self.changed_source(SequenceEventSource::Data(None), SequenceEventType::Changed);
    }

    pub(super) fn plane_changed_event(&self, plane: &Plane, kind: SequenceEventType) {
        if self.is_updating() && self.auto_update_channel_bounds() {
            *lock(&self.bounds_state) = ChannelBoundsState::Invalid;
        }
        self.changed_source(SequenceEventSource::Data(Some(plane.clone())), kind);
    }

    pub(super) fn type_changed(&self) {
        self.changed_source(SequenceEventSource::Type, SequenceEventType::Changed);
    }

    pub fn meta_changed(&self, field: &str) {
        self.changed_source(
            SequenceEventSource::Meta {
                field: Some(field.to_string()),
                param: None,
            },
            SequenceEventType::Changed,
        );
    }

    pub fn meta_changed_param(&self, field: &str, param: usize) {
        self.changed_source(
            SequenceEventSource::Meta {
                field: Some(field.to_string()),
                param: Some(param),
            },
            SequenceEventType::Changed,
        );
    }

    // ---- images ----

    pub fn is_compatible(&self, plane: &Plane) -> bool {
        let volumes = lock(&self.volumetric_images);
        self.is_compatible_with(&volumes, plane)
    }

    fn is_compatible_with(&self, volumes: &BTreeMap<usize, VolumetricImage>, plane: &Plane) -> bool {
        let Some(model) = self.color_model() else {
            return true;
        };
        match first_plane(volumes) {
            None => true,
            Some(first) => {
                first.width() == plane.width()
                    && first.height() == plane.height()
                    && model.is_compatible(plane)
            }
        }
    }

    /// Stores `plane` at `(t, z)`.
    ///
    /// The plane must be compatible with the sequence unless the insertion is
    /// a type change: no color model yet, an empty sequence, or the sole
    /// plane being replaced.
    pub fn set_image(&self, t: usize, z: usize, plane: Plane) -> Result<()> {
        plane.set_auto_update_channel_bounds(self.auto_update_channel_bounds());
        let (replaced, type_change) = {
            let mut volumes = lock(&self.volumetric_images);
            let existing = volumes.get(&t).and_then(|volume| volume.image(z)).cloned();
            if existing.as_ref() == Some(&plane) {
                return Ok(());
            }
            let num_image: usize = volumes.values().map(VolumetricImage::num_image).sum();
            let model = self.color_model();
            let type_change =
                model.is_none() || num_image == 0 || (num_image == 1 && existing.is_some());
            if !type_change && !self.is_compatible_with(&volumes, &plane) {
                return Err(SequenceError::IncompatibleData(format!(
                    "{}x{} plane with {} channel(s) of {} does not fit sequence {}",
                    plane.width(),
                    plane.height(),
                    plane.size_c(),
                    plane.data_type(),
                    self.id
                )));
            }
            if let Some(model) = model.filter(|model| model.is_compatible(&plane)) {
                plane.set_color_space(Arc::clone(model.color_space()));
            }
            let replaced = volumes.entry(t).or_default().set_image(z, plane.clone());
            (replaced, type_change)
        };

        match replaced {
            Some(old) => self.on_image_replaced(&old, &plane),
            None => self.on_image_added(&plane),
        }
        if type_change {
            self.meta_changed(super::META_VIRTUAL);
        }
        Ok(())
    }

    /// Appends `plane` after the last Z of the last time point.
    pub fn add_image(&self, plane: Plane) -> Result<()> {
        let t = self.size_t().saturating_sub(1);
        self.set_image(t, self.size_z_at(t), plane)
    }

    pub fn add_image_at(&self, t: usize, plane: Plane) -> Result<()> {
        self.set_image(t, self.size_z_at(t), plane)
    }

    pub fn add_volumetric_image(&self, t: usize, volume: &VolumetricImage) -> Result<()> {
        let _scope = self.update_scope();
        for (z, plane) in volume.images() {
            self.set_image(t, z, plane.clone())?;
        }
        Ok(())
    }

    fn adopt_color_model(&self, plane: &Plane) {
        let model = ColorModel::from_plane(plane);
        plane.set_color_space(Arc::clone(model.color_space()));
        self.set_color_model(Some(model));
    }

    fn on_image_added(&self, plane: &Plane) {
        if self.color_model().is_none() {
            self.adopt_color_model(plane);
        }
        plane.add_listener(self.plane_listener());
        self.plane_changed_event(plane, SequenceEventType::Added);
    }

    fn on_image_replaced(&self, old: &Plane, new: &Plane) {
        let _scope = self.update_scope();
        if self.num_image() == 1 {
            match self.color_model() {
                Some(model) if model.is_compatible(new) => {
                    if old.width() != new.width() || old.height() != new.height() {
                        self.type_changed();
                    }
                }
                _ => self.adopt_color_model(new),
            }
        }
        old.remove_listener(&self.plane_listener());
        self.plane_changed_event(old, SequenceEventType::Removed);
        new.add_listener(self.plane_listener());
        self.plane_changed_event(new, SequenceEventType::Added);
    }

    fn on_image_removed(&self, plane: &Plane) {
        if self.is_empty() && self.color_model().is_some() {
            self.set_color_model(None);
        }
        plane.remove_listener(&self.plane_listener());
        self.plane_changed_event(plane, SequenceEventType::Removed);
    }

    pub fn remove_image(&self, t: usize, z: usize) -> bool {
        let _scope = self.update_scope();
        let (removed, emptied) = {
            let mut volumes = lock(&self.volumetric_images);
            let Some(volume) = volumes.get_mut(&t) else {
                return false;
            };
            let removed = volume.remove_image(z);
            (removed, volume.is_empty())
        };
        if let Some(plane) = &removed {
            self.on_image_removed(plane);
        }
        if emptied {
            self.remove_all_images_at(t);
        }
        removed.is_some()
    }

    pub fn remove_all_images_at(&self, t: usize) -> bool {
        let _scope = self.update_scope();
        let removed = lock(&self.volumetric_images).remove(&t);
        match removed {
            Some(mut volume) => {
                for plane in volume.clear() {
                    self.on_image_removed(&plane);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove_all_images(&self) {
        let _scope = self.update_scope();
        let volumes = std::mem::take(&mut *lock(&self.volumetric_images));
        for (_, mut volume) in volumes {
            for plane in volume.clear() {
                self.on_image_removed(&plane);
            }
        }
    }

    /// Removes Z gaps in every time point and drops empty time points.
    pub fn pack_image_list(&self) {
        let _scope = self.update_scope();
        let changed = {
            let mut volumes = lock(&self.volumetric_images);
            let mut changed = false;
            for volume in volumes.values_mut() {
                changed |= volume.pack();
            }
            let before = volumes.len();
            volumes.retain(|_, volume| !volume.is_empty());
            changed || volumes.len() != before
        };
        if changed {
            self.data_changed();
        }
    }

    pub(crate) fn image_no_prefetch(&self, t: usize, z: usize) -> Option<Plane> {
        lock(&self.volumetric_images)
            .get(&t)
            .and_then(|volume| volume.image(z))
            .cloned()
    }

    /// Plane at `(t, z)`. Unloaded neighbors in T, and in Z when `z > 0`,
    /// are queued for background loading even when `(t, z)` is empty.
    pub fn image(&self, t: usize, z: usize) -> Option<Plane> {
        self.schedule_prefetch(t, z);
        self.image_no_prefetch(t, z)
    }

    pub fn image_channel(&self, t: usize, z: usize, c: usize) -> Result<Option<Plane>> {
        self.image(t, z)
            .map(|plane| plane.extract_channel(c))
            .transpose()
    }

    fn schedule_prefetch(&self, t: usize, z: usize) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let mut targets = Vec::with_capacity(8);
        for delta in [-2_isize, -1, 1, 2] {
            if let Some(nt) = t.checked_add_signed(delta) {
                targets.push((nt, z));
            }
            if z == 0 {
                continue;
            }
            if let Some(nz) = z.checked_add_signed(delta) {
                targets.push((t, nz));
            }
        }
        for (t, z) in targets {
            if let Some(plane) = self.image_no_prefetch(t, z) {
                if !plane.is_data_loaded() {
                    self.prefetcher.prefetch(&this, t, z);
                }
            }
        }
    }

    pub(crate) fn prefetch_load(&self, t: usize, z: usize) -> Result<()> {
        match self.image_no_prefetch(t, z) {
            Some(plane) => plane.load_data(),
            None => Ok(()),
        }
    }

    pub fn volumetric_image(&self, t: usize) -> Option<VolumetricImage> {
        lock(&self.volumetric_images).get(&t).cloned()
    }

    pub fn volumetric_images(&self) -> BTreeMap<usize, VolumetricImage> {
        lock(&self.volumetric_images).clone()
    }

    pub fn images(&self, t: usize) -> Vec<Plane> {
        lock(&self.volumetric_images)
            .get(&t)
            .map(VolumetricImage::all_images)
            .unwrap_or_default()
    }

    /// Every plane in T then Z order.
    pub fn all_images(&self) -> Vec<Plane> {
        lock(&self.volumetric_images)
            .values()
            .flat_map(VolumetricImage::all_images)
            .collect()
    }

    pub(super) fn positioned_images(&self) -> Vec<(usize, usize, Plane)> {
        lock(&self.volumetric_images)
            .iter()
            .flat_map(|(t, volume)| {
                volume
                    .images()
                    .map(|(z, plane)| (*t, z, plane.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn first_image(&self) -> Option<Plane> {
        lock(&self.volumetric_images)
            .values()
            .next()
            .and_then(|volume| volume.first_image().cloned())
    }

    pub fn last_image(&self) -> Option<Plane> {
        lock(&self.volumetric_images)
            .values()
            .next_back()
            .and_then(|volume| volume.last_image().cloned())
    }

    pub fn first_non_null_image(&self) -> Option<Plane> {
        first_plane(&lock(&self.volumetric_images))
    }

    pub fn is_data_loaded(&self, t: usize, z: usize) -> bool {
        self.image_no_prefetch(t, z)
            .is_some_and(|plane| plane.is_data_loaded())
    }

    pub fn load_all_data(&self) -> Result<()> {
        for plane in self.all_images() {
            plane.load_data()?;
        }
        Ok(())
    }

    // ---- sizes ----

    pub fn size_x(&self) -> usize {
        match self.first_non_null_image() {
            Some(plane) => plane.width(),
            None => read(&self.metadata).size(DimensionId::X),
        }
    }

    pub fn size_y(&self) -> usize {
        match self.first_non_null_image() {
            Some(plane) => plane.height(),
            None => read(&self.metadata).size(DimensionId::Y),
        }
    }

    pub fn size_c(&self) -> usize {
        match self.color_model() {
            Some(model) => model.size_c(),
            None => read(&self.metadata).size(DimensionId::C),
        }
    }

    /// Largest Z size over all time points.
    pub fn size_z(&self) -> usize {
        lock(&self.volumetric_images)
            .values()
            .map(VolumetricImage::size)
            .max()
            .unwrap_or(0)
    }

    pub fn size_z_at(&self, t: usize) -> usize {
        lock(&self.volumetric_images)
            .get(&t)
            .map_or(0, VolumetricImage::size)
    }

    pub fn size_t(&self) -> usize {
        lock(&self.volumetric_images)
            .keys()
            .next_back()
            .map_or(0, |t| t + 1)
    }

    pub fn num_image(&self) -> usize {
        lock(&self.volumetric_images)
            .values()
            .map(VolumetricImage::num_image)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.volumetric_images)
            .values()
            .all(VolumetricImage::is_empty)
    }

    pub fn dimension_5d(&self) -> Dimension5D {
        Dimension5D {
            size_x: self.size_x(),
            size_y: self.size_y(),
            size_z: self.size_z(),
            size_t: self.size_t(),
            size_c: self.size_c(),
        }
    }

    /// Total sample count, saturating at `u64::MAX`.
    pub fn num_sample(&self) -> u64 {
        self.dimension_5d().num_sample().unwrap_or(u64::MAX)
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.color_model().map(|model| model.data_type())
    }

    // ---- volatile ----

    pub fn is_volatile(&self) -> bool {
        self.first_non_null_image()
            .is_some_and(|plane| plane.is_volatile())
    }

    /// Switches every plane to or from volatile storage. On failure the planes
    /// already switched are restored before the error is returned.
    pub fn set_volatile(&self, value: bool) -> Result<()> {
        let was = self.is_volatile();
        let planes = self.all_images();
        for (index, plane) in planes.iter().enumerate() {
            if let Err(error) = plane.set_volatile(value) {
                for done in &planes[..index] {
                    if let Err(rollback) = done.set_volatile(!value) {
                        log::warn!(
                            "sequence {}: cannot restore plane volatile state: {rollback}",
                            self.id
                        );
                    }
                }
                return Err(error);
            }
        }
        if was != value {
            self.meta_changed(super::META_VIRTUAL);
        }
        Ok(())
    }

    // ---- lifecycle ----

    /// Stops prefetching, persists the metadata when persistence is enabled
    /// and tells listeners the sequence is closed.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.prefetcher.cancel(self.id);
        if self.persistence.is_some() {
            self.save_metadata();
        }
        for (listener, _) in self.sequence_listeners() {
            listener.sequence_closed(self);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl PlaneListener for Sequence {
    fn plane_changed(&self, plane: &Plane, change: PlaneChange) {
        match change {
            PlaneChange::Bounds => {
                if !self.auto_update_channel_bounds() {
                    return;
                }
                if self.is_updating() {
                    *lock(&self.bounds_state) = ChannelBoundsState::Invalid;
                } else {
                    self.internal_update_channels_bounds();
                }
            }
            PlaneChange::Data => self.plane_changed_event(plane, SequenceEventType::Changed),
        }
    }
}

impl Drop for Sequence {
    fn drop(&mut self) {
        self.prefetcher.cancel(self.id);
        let provider = self
            .provider
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(provider) = provider {
            if let Err(error) = provider.close() {
                log::warn!("sequence {}: image provider close failed: {error}", self.id);
            }
        }
    }
}
