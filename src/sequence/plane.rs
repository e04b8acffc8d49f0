use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use ndarray::ArcArray2;

use crate::model::{DataType, Element, PlaneData};
use crate::runtime::sync::{lock, read, write};

use super::{ColorSpace, ImageProvider, Result, SequenceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneChange {
    Bounds,
    Data,
}

pub trait PlaneListener: Send + Sync {
    fn plane_changed(&self, plane: &Plane, change: PlaneChange);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    width: usize,
    height: usize,
    size_c: usize,
    data_type: DataType,
}

impl Geometry {
    fn of(data: &PlaneData) -> Self {
        let (width, height) = data.dims();
        Self {
            width,
            height,
            size_c: data.size_c(),
            data_type: data.data_type(),
        }
    }

    fn byte_len(&self) -> usize {
        self.width * self.height * self.size_c * self.data_type.size_in_bytes()
    }
}

struct PlaneSource {
    provider: Arc<dyn ImageProvider>,
    t: usize,
    z: usize,
}

enum Storage {
    Unloaded,
    Memory(PlaneData),
    Offloaded(File),
}

#[derive(Debug, Clone, PartialEq)]
struct ChannelBounds {
    type_bounds: Vec<[f64; 2]>,
    data_bounds: Vec<[f64; 2]>,
}

struct PlaneInner {
    geometry: Geometry,
    storage: Mutex<Storage>,
    volatile: AtomicBool,
    bounds: RwLock<ChannelBounds>,
    source: Option<PlaneSource>,
    color_space: RwLock<Arc<ColorSpace>>,
    auto_update_bounds: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn PlaneListener>>>,
}

/// One 2D multi-channel image: `width × height` samples for each of `size_c`
/// channels, all of the same sample type.
///
/// `Plane` is a shared handle; clones designate the same plane and equality is
/// identity. The pixel data can be loaded lazily from an [`ImageProvider`] and
/// can be moved to an anonymous temporary file while the plane is volatile.
/// Listeners are notified after every internal lock has been released.
#[derive(Clone)]
pub struct Plane {
    inner: Arc<PlaneInner>,
}

impl PartialEq for Plane {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Plane {}

impl fmt::Debug for Plane {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Plane")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("size_c", &self.size_c())
            .field("data_type", &self.data_type())
            .field("loaded", &self.is_data_loaded())
            .field("volatile", &self.is_volatile())
            .finish()
    }
}

/// Smallest `2^n - 1` style range holding `data`, clipped to the type range.
/// Float types use the data range itself.
fn type_bounds_for(data_type: DataType, data: [f64; 2]) -> [f64; 2] {
    if data_type.is_float() {
        return data;
    }
    let [type_min, type_max] = data_type.bounds();
    let mut bits = 1_i32;
    loop {
        let high = 2_f64.powi(bits) - 1.0;
        let low = if data[0] < 0.0 { -(2_f64.powi(bits)) } else { 0.0 };
        if (high >= data[1] && low <= data[0]) || bits >= 64 {
            return [low.max(type_min), high.min(type_max)];
        }
        bits += 1;
    }
}

fn compute_bounds(data: &PlaneData) -> ChannelBounds {
    let data_type = data.data_type();
    let data_bounds = (0..data.size_c())
        .map(|c| data.channel_bounds(c).unwrap_or([0.0, 0.0]))
        .collect::<Vec<_>>();
    let type_bounds = data_bounds
        .iter()
        .map(|bounds| type_bounds_for(data_type, *bounds))
        .collect();
    ChannelBounds {
        type_bounds,
        data_bounds,
    }
}

fn reserve_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len).map_err(|error| {
        SequenceError::ResourceExhausted(format!("cannot allocate {len} bytes: {error}"))
    })?;
    Ok(bytes)
}

fn offload(data: &PlaneData) -> Result<File> {
    let mut bytes = reserve_bytes(data.byte_len())?;
    data.write_le(&mut bytes);
    let mut file = tempfile::tempfile()?;
    file.write_all(&bytes)?;
    Ok(file)
}

fn read_offloaded(file: &mut File, geometry: Geometry) -> Result<PlaneData> {
    let mut bytes = reserve_bytes(geometry.byte_len())?;
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;
    Ok(PlaneData::read_le(
        geometry.data_type,
        geometry.width,
        geometry.height,
        geometry.size_c,
        &bytes,
    )?)
}

impl Plane {
    fn build(geometry: Geometry, storage: Storage, source: Option<PlaneSource>) -> Self {
        let bounds = match &storage {
            Storage::Memory(data) => compute_bounds(data),
            _ => ChannelBounds {
                type_bounds: vec![geometry.data_type.bounds(); geometry.size_c],
                data_bounds: vec![geometry.data_type.bounds(); geometry.size_c],
            },
        };
        Self {
            inner: Arc::new(PlaneInner {
                geometry,
                storage: Mutex::new(storage),
                volatile: AtomicBool::new(false),
                bounds: RwLock::new(bounds),
                source,
                color_space: RwLock::new(Arc::new(ColorSpace::new(geometry.size_c))),
                auto_update_bounds: AtomicBool::new(true),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn new(data: PlaneData) -> Self {
        Self::build(Geometry::of(&data), Storage::Memory(data), None)
    }

    pub fn zeros(data_type: DataType, width: usize, height: usize, size_c: usize) -> Self {
        Self::new(PlaneData::zeros(data_type, width, height, size_c))
    }

    pub fn from_channels<T: Element>(
        width: usize,
        height: usize,
        channels: Vec<Vec<T>>,
    ) -> Result<Self> {
        Ok(Self::new(PlaneData::from_channels(width, height, channels)?))
    }

    /// Plane whose data is read from `provider` on first access.
    pub fn lazy(
        provider: Arc<dyn ImageProvider>,
        t: usize,
        z: usize,
        width: usize,
        height: usize,
        size_c: usize,
        data_type: DataType,
    ) -> Self {
        Self::build(
            Geometry {
                width,
                height,
                size_c,
                data_type,
            },
            Storage::Unloaded,
            Some(PlaneSource { provider, t, z }),
        )
    }

    pub fn width(&self) -> usize {
        self.inner.geometry.width
    }

    pub fn height(&self) -> usize {
        self.inner.geometry.height
    }

    pub fn size_c(&self) -> usize {
        self.inner.geometry.size_c
    }

    pub fn data_type(&self) -> DataType {
        self.inner.geometry.data_type
    }

    pub fn sample_count(&self) -> usize {
        self.width() * self.height() * self.size_c()
    }

    pub fn is_data_loaded(&self) -> bool {
        !matches!(*lock(&self.inner.storage), Storage::Unloaded)
    }

    pub fn is_volatile(&self) -> bool {
        self.inner.volatile.load(Ordering::Acquire)
    }

    pub fn color_space(&self) -> Arc<ColorSpace> {
        Arc::clone(&read(&self.inner.color_space))
    }

    pub fn set_color_space(&self, color_space: Arc<ColorSpace>) {
        *write(&self.inner.color_space) = color_space;
    }

    pub fn auto_update_channel_bounds(&self) -> bool {
        self.inner.auto_update_bounds.load(Ordering::Acquire)
    }

    /// Enabling the automatic update refreshes the bounds of loaded data.
    pub fn set_auto_update_channel_bounds(&self, value: bool) {
        let was = self.inner.auto_update_bounds.swap(value, Ordering::AcqRel);
        if value && !was {
            if let Err(error) = self.update_channels_bounds() {
                log::debug!("plane bounds not refreshed: {error}");
            }
        }
    }

    pub fn add_listener(&self, listener: Weak<dyn PlaneListener>) {
        let mut listeners = lock(&self.inner.listeners);
        if !listeners.iter().any(|known| Weak::ptr_eq(known, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_listener(&self, listener: &Weak<dyn PlaneListener>) {
        lock(&self.inner.listeners).retain(|known| !Weak::ptr_eq(known, listener));
    }

    fn fire(&self, change: PlaneChange) {
        let listeners = {
            let mut listeners = lock(&self.inner.listeners);
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners
                .iter()
                .filter_map(Weak::upgrade)
                .collect::<Vec<_>>()
        };
        for listener in listeners {
            listener.plane_changed(self, change);
        }
    }

    fn load_from_source(&self) -> Result<PlaneData> {
        let source = self.inner.source.as_ref().ok_or_else(|| {
            SequenceError::Provider("plane has neither data nor provider".to_string())
        })?;
        let data = source.provider.load_plane(source.t, source.z)?;
        if Geometry::of(&data) != self.inner.geometry {
            return Err(SequenceError::IncompatibleData(format!(
                "provider returned {:?} for plane (t={}, z={}), expected {:?}",
                Geometry::of(&data),
                source.t,
                source.z,
                self.inner.geometry
            )));
        }
        Ok(data)
    }

    fn store(&self, storage: &mut Storage, data: PlaneData) -> Result<()> {
        *storage = if self.is_volatile() {
            Storage::Offloaded(offload(&data)?)
        } else {
            Storage::Memory(data)
        };
        Ok(())
    }

    /// Replaces the cached bounds; true when they changed.
    fn refresh_bounds(&self, data: &PlaneData) -> bool {
        let bounds = compute_bounds(data);
        let mut current = write(&self.inner.bounds);
        if *current == bounds {
            false
        } else {
            *current = bounds;
            true
        }
    }

    /// Pixel data of the plane. Memory-resident data is shared, volatile data
    /// is read back from its temporary file.
    pub fn data(&self) -> Result<PlaneData> {
        let (data, loaded) = {
            let mut storage = lock(&self.inner.storage);
            match &mut *storage {
                Storage::Memory(data) => (data.clone(), false),
                Storage::Offloaded(file) => (read_offloaded(file, self.inner.geometry)?, false),
                Storage::Unloaded => {
                    let data = self.load_from_source()?;
                    self.store(&mut storage, data.clone())?;
                    (data, true)
                }
            }
        };
        if loaded && self.refresh_bounds(&data) {
            self.fire(PlaneChange::Bounds);
        }
        Ok(data)
    }

    pub fn load_data(&self) -> Result<()> {
        self.data().map(|_| ())
    }

    pub fn channels<T: Element>(&self) -> Result<Vec<ArcArray2<T>>> {
        let data = self.data()?;
        T::channels(&data)
            .map(<[ArcArray2<T>]>::to_vec)
            .ok_or(SequenceError::TypeMismatch {
                expected: self.data_type(),
                actual: T::DATA_TYPE,
            })
    }

    pub fn channel<T: Element>(&self, c: usize) -> Result<ArcArray2<T>> {
        let size_c = self.size_c();
        self.channels::<T>()?
            .into_iter()
            .nth(c)
            .ok_or_else(|| SequenceError::OutOfBounds(format!("channel {c} of {size_c}")))
    }

    pub fn value(&self, x: usize, y: usize, c: usize) -> Result<f64> {
        self.data()?.value(c, x, y).ok_or_else(|| {
            SequenceError::OutOfBounds(format!(
                "({x}, {y}, c={c}) outside {}x{}x{}",
                self.width(),
                self.height(),
                self.size_c()
            ))
        })
    }

    /// Bilinear interpolation at a fractional position; zero outside the
    /// plane. Neighbors past the last row or column are clamped to the edge.
    pub fn data_interpolated(&self, x: f64, y: f64, c: usize) -> Result<f64> {
        let (width, height) = (self.width(), self.height());
        if x < 0.0 || y < 0.0 || x >= width as f64 || y >= height as f64 || c >= self.size_c() {
            return Ok(0.0);
        }
        let data = self.data()?;
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let rx = x - x0 as f64;
        let ry = y - y0 as f64;
        let sample = |x: usize, y: usize| data.value(c, x, y).unwrap_or(0.0);

        let top = sample(x0, y0) * (1.0 - rx) + sample(x1, y0) * rx;
        let bottom = sample(x0, y1) * (1.0 - rx) + sample(x1, y1) * rx;
        Ok(top * (1.0 - ry) + bottom * ry)
    }

    /// Runs `edit` on the pixel data then publishes the change.
    pub fn modify<R>(&self, edit: impl FnOnce(&mut PlaneData) -> R) -> Result<R> {
        let (result, data) = {
            let mut storage = lock(&self.inner.storage);
            match &mut *storage {
                Storage::Memory(data) => {
                    let result = edit(data);
                    (result, data.clone())
                }
                Storage::Offloaded(file) => {
                    let mut data = read_offloaded(file, self.inner.geometry)?;
                    let result = edit(&mut data);
                    *file = offload(&data)?;
                    (result, data)
                }
                Storage::Unloaded => {
                    let mut data = self.load_from_source()?;
                    let result = edit(&mut data);
                    self.store(&mut storage, data.clone())?;
                    (result, data)
                }
            }
        };
        self.publish_data_change(&data);
        Ok(result)
    }

    fn publish_data_change(&self, data: &PlaneData) {
        if self.auto_update_channel_bounds() && self.refresh_bounds(data) {
            self.fire(PlaneChange::Bounds);
        }
        self.fire(PlaneChange::Data);
    }

    pub fn set_data(&self, data: PlaneData) -> Result<()> {
        if Geometry::of(&data) != self.inner.geometry {
            return Err(SequenceError::IncompatibleData(format!(
                "cannot store {:?} into a {:?} plane",
                Geometry::of(&data),
                self.inner.geometry
            )));
        }
        {
            let mut storage = lock(&self.inner.storage);
            self.store(&mut storage, data.clone())?;
        }
        self.publish_data_change(&data);
        Ok(())
    }

    pub fn set_value(&self, x: usize, y: usize, c: usize, value: f64) -> Result<()> {
        if self.modify(|data| data.set_value(c, x, y, value))? {
            Ok(())
        } else {
            Err(SequenceError::OutOfBounds(format!(
                "({x}, {y}, c={c}) outside {}x{}x{}",
                self.width(),
                self.height(),
                self.size_c()
            )))
        }
    }

    /// Replaces one channel with row-major `values`.
    pub fn set_channel_data<T: Element>(&self, c: usize, values: &[T]) -> Result<()> {
        if T::DATA_TYPE != self.data_type() {
            return Err(SequenceError::TypeMismatch {
                expected: self.data_type(),
                actual: T::DATA_TYPE,
            });
        }
        if c >= self.size_c() {
            return Err(SequenceError::OutOfBounds(format!(
                "channel {c} of {}",
                self.size_c()
            )));
        }
        let expected = self.width() * self.height();
        if values.len() != expected {
            return Err(SequenceError::IncompatibleData(format!(
                "channel needs {expected} samples, got {}",
                values.len()
            )));
        }
        let array = ArcArray2::from_shape_vec((self.height(), self.width()), values.to_vec())
            .map_err(|error| SequenceError::IncompatibleData(error.to_string()))?;
        self.modify(|data| {
            if let Some(channels) = T::channels_mut(data) {
                channels[c] = array;
            }
        })
    }

    /// Notifies listeners that the data was changed through a shared channel.
    pub fn data_changed(&self) -> Result<()> {
        let data = self.data()?;
        self.publish_data_change(&data);
        Ok(())
    }

    /// Recomputes the channel bounds of loaded data.
    pub fn update_channels_bounds(&self) -> Result<()> {
        if !self.is_data_loaded() {
            return Ok(());
        }
        let data = self.data()?;
        if self.refresh_bounds(&data) {
            self.fire(PlaneChange::Bounds);
        }
        Ok(())
    }

    pub fn channel_bounds(&self, c: usize) -> [f64; 2] {
        read(&self.inner.bounds)
            .data_bounds
            .get(c)
            .copied()
            .unwrap_or([0.0, 0.0])
    }

    pub fn channels_bounds(&self) -> Vec<[f64; 2]> {
        read(&self.inner.bounds).data_bounds.clone()
    }

    pub fn channel_type_bounds(&self, c: usize) -> [f64; 2] {
        read(&self.inner.bounds)
            .type_bounds
            .get(c)
            .copied()
            .unwrap_or([0.0, 0.0])
    }

    pub fn channels_type_bounds(&self) -> Vec<[f64; 2]> {
        read(&self.inner.bounds).type_bounds.clone()
    }

    /// Moves the data to an anonymous temporary file (`true`) or back into
    /// memory (`false`). Fails with `ResourceExhausted` when the buffer
    /// cannot be allocated, leaving the plane unchanged.
    pub fn set_volatile(&self, value: bool) -> Result<()> {
        let mut storage = lock(&self.inner.storage);
        if self.is_volatile() == value {
            return Ok(());
        }
        let next = match &mut *storage {
            Storage::Memory(data) if value => Some(Storage::Offloaded(offload(data)?)),
            Storage::Offloaded(file) if !value => Some(Storage::Memory(read_offloaded(
                file,
                self.inner.geometry,
            )?)),
            _ => None,
        };
        if let Some(next) = next {
            *storage = next;
        }
        self.inner.volatile.store(value, Ordering::Release);
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn truncate_offloaded(&self) -> Result<()> {
        if let Storage::Offloaded(file) = &*lock(&self.inner.storage) {
            file.set_len(0)?;
        }
        Ok(())
    }

    /// Independent in-memory copy of this plane.
    pub fn copy(&self) -> Result<Plane> {
        let copy = Plane::new(self.data()?.deep_copy());
        copy.set_auto_update_channel_bounds(self.auto_update_channel_bounds());
        Ok(copy)
    }

    /// Single-channel plane sharing the storage of channel `c`.
    pub fn extract_channel(&self, c: usize) -> Result<Plane> {
        if c >= self.size_c() {
            return Err(SequenceError::OutOfBounds(format!(
                "channel {c} of {}",
                self.size_c()
            )));
        }
        let data = self.data()?;
        let single = crate::model::dispatch_plane_data!(&data, channels => {
            Element::wrap_channels(vec![channels[c].clone()])
        });
        Ok(Plane::new(single))
    }
}
