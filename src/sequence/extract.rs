use ndarray::ArcArray2;

use crate::model::Element;

use super::{Plane, Result, Sequence, SequenceError};

/// Which channels of each plane are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelSelect {
    All,
    One(usize),
}

/// `Planar` writes one full XY block per channel, `Interleaved` writes the
/// channels of each pixel next to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelLayout {
    Planar,
    Interleaved,
}

impl Sequence {
    fn check_element<T: Element>(&self) -> Result<()> {
        match self.data_type() {
            Some(expected) if expected != T::DATA_TYPE => Err(SequenceError::TypeMismatch {
                expected,
                actual: T::DATA_TYPE,
            }),
            _ => Ok(()),
        }
    }

    fn check_channel(&self, c: usize) -> Result<()> {
        let size_c = self.size_c();
        if c < size_c {
            Ok(())
        } else {
            Err(SequenceError::OutOfBounds(format!("channel {c} of {size_c}")))
        }
    }

    fn zt_positions(&self, t: usize) -> Vec<(usize, usize)> {
        (0..self.size_z_at(t)).map(|z| (t, z)).collect()
    }

    fn all_positions(&self) -> Vec<(usize, usize)> {
        let size_z = self.size_z();
        (0..self.size_t())
            .flat_map(|t| (0..size_z).map(move |z| (t, z)))
            .collect()
    }

    /// Copies the selected channels of the planes at `positions`, one block
    /// per position, into `out` starting at `offset`. `out` grows when too
    /// short; blocks of missing planes are left untouched. Returns the number
    /// of elements the request covers.
    fn copy_planes<T: Element>(
        &self,
        positions: &[(usize, usize)],
        channels: ChannelSelect,
        layout: ChannelLayout,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        self.check_element::<T>()?;
        if let ChannelSelect::One(c) = channels {
            self.check_channel(c)?;
        }
        let plane_len = self.size_x() as u64 * self.size_y() as u64;
        let size_c = match channels {
            ChannelSelect::All => self.size_c() as u64,
            ChannelSelect::One(_) => 1,
        };
        let requested = plane_len
            .checked_mul(size_c)
            .and_then(|len| len.checked_mul(positions.len() as u64))
            .unwrap_or(u64::MAX);
        if requested >= i32::MAX as u64 {
            return Err(SequenceError::CapacityExceeded { requested });
        }
        let plane_len = plane_len as usize;
        let size_c = size_c as usize;
        let total = requested as usize;
        let end = offset.checked_add(total).ok_or(SequenceError::CapacityExceeded {
            requested: requested.saturating_add(offset as u64),
        })?;
        if out.len() < end {
            out.resize(end, T::default());
        }

        for (index, (t, z)) in positions.iter().enumerate() {
            let Some(plane) = self.image(*t, *z) else {
                continue;
            };
            let plane_channels = plane.channels::<T>()?;
            let selected: Vec<&ArcArray2<T>> = match channels {
                ChannelSelect::All => plane_channels.iter().collect(),
                ChannelSelect::One(c) => plane_channels.get(c).into_iter().collect(),
            };
            let base = offset + index * plane_len * size_c;
            for (k, channel) in selected.into_iter().enumerate() {
                match layout {
                    ChannelLayout::Planar => {
                        let start = base + k * plane_len;
                        for (slot, value) in out[start..start + plane_len].iter_mut().zip(channel.iter()) {
                            *slot = *value;
                        }
                    }
                    ChannelLayout::Interleaved => {
                        for (pixel, value) in channel.iter().enumerate() {
                            out[base + pixel * size_c + k] = *value;
                        }
                    }
                }
            }
        }
        Ok(total)
    }

    fn copy_into_new<T: Element>(
        &self,
        positions: &[(usize, usize)],
        channels: ChannelSelect,
        layout: ChannelLayout,
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        self.copy_planes(positions, channels, layout, &mut out, 0)?;
        Ok(out)
    }

    // Shared references. Channel arrays are copy-on-write: writing through
    // them detaches the copy from the sequence.

    pub fn data_xy<T: Element>(&self, t: usize, z: usize, c: usize) -> Result<Option<ArcArray2<T>>> {
        self.check_element::<T>()?;
        self.image(t, z)
            .map(|plane| plane.channel::<T>(c))
            .transpose()
    }

    pub fn data_xyc<T: Element>(&self, t: usize, z: usize) -> Result<Option<Vec<ArcArray2<T>>>> {
        self.check_element::<T>()?;
        self.image(t, z)
            .map(|plane| plane.channels::<T>())
            .transpose()
    }

    /// `[z][c]` channel arrays of time point `t`.
    pub fn data_xycz<T: Element>(&self, t: usize) -> Result<Vec<Option<Vec<ArcArray2<T>>>>> {
        (0..self.size_z_at(t))
            .map(|z| self.data_xyc::<T>(t, z))
            .collect()
    }

    /// `[t][z][c]` channel arrays of the whole sequence.
    pub fn data_xyczt<T: Element>(&self) -> Result<Vec<Vec<Option<Vec<ArcArray2<T>>>>>> {
        (0..self.size_t()).map(|t| self.data_xycz::<T>(t)).collect()
    }

    pub fn data_xyz<T: Element>(&self, t: usize, c: usize) -> Result<Vec<Option<ArcArray2<T>>>> {
        (0..self.size_z_at(t))
            .map(|z| self.data_xy::<T>(t, z, c))
            .collect()
    }

    pub fn data_xyzt<T: Element>(&self, c: usize) -> Result<Vec<Vec<Option<ArcArray2<T>>>>> {
        (0..self.size_t()).map(|t| self.data_xyz::<T>(t, c)).collect()
    }

    // Copies.

    pub fn data_copy_xy<T: Element>(&self, t: usize, z: usize, c: usize) -> Result<Vec<T>> {
        self.copy_into_new(&[(t, z)], ChannelSelect::One(c), ChannelLayout::Planar)
    }

    pub fn data_copy_xy_into<T: Element>(
        &self,
        t: usize,
        z: usize,
        c: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        self.copy_planes(&[(t, z)], ChannelSelect::One(c), ChannelLayout::Planar, out, offset)
    }

    /// `[c][xy]` samples of plane `(t, z)`.
    pub fn data_copy_xyc<T: Element>(&self, t: usize, z: usize) -> Result<Vec<T>> {
        self.copy_into_new(&[(t, z)], ChannelSelect::All, ChannelLayout::Planar)
    }

    pub fn data_copy_xyc_into<T: Element>(
        &self,
        t: usize,
        z: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        self.copy_planes(&[(t, z)], ChannelSelect::All, ChannelLayout::Planar, out, offset)
    }

    /// `[z][c][xy]` samples of time point `t`.
    pub fn data_copy_xycz<T: Element>(&self, t: usize) -> Result<Vec<T>> {
        self.copy_into_new(&self.zt_positions(t), ChannelSelect::All, ChannelLayout::Planar)
    }

    pub fn data_copy_xycz_into<T: Element>(
        &self,
        t: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        let positions = self.zt_positions(t);
        self.copy_planes(&positions, ChannelSelect::All, ChannelLayout::Planar, out, offset)
    }

    /// `[t][z][c][xy]` samples of the whole sequence.
    pub fn data_copy_xyczt<T: Element>(&self) -> Result<Vec<T>> {
        self.copy_into_new(&self.all_positions(), ChannelSelect::All, ChannelLayout::Planar)
    }

    pub fn data_copy_xyczt_into<T: Element>(&self, out: &mut Vec<T>, offset: usize) -> Result<usize> {
        let positions = self.all_positions();
        self.copy_planes(&positions, ChannelSelect::All, ChannelLayout::Planar, out, offset)
    }

    /// `[xy][c]` interleaved samples of plane `(t, z)`.
    pub fn data_copy_cxy<T: Element>(&self, t: usize, z: usize) -> Result<Vec<T>> {
        self.copy_into_new(&[(t, z)], ChannelSelect::All, ChannelLayout::Interleaved)
    }

    pub fn data_copy_cxy_into<T: Element>(
        &self,
        t: usize,
        z: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        self.copy_planes(&[(t, z)], ChannelSelect::All, ChannelLayout::Interleaved, out, offset)
    }

    pub fn data_copy_cxyz<T: Element>(&self, t: usize) -> Result<Vec<T>> {
        self.copy_into_new(&self.zt_positions(t), ChannelSelect::All, ChannelLayout::Interleaved)
    }

    pub fn data_copy_cxyz_into<T: Element>(
        &self,
        t: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        let positions = self.zt_positions(t);
        self.copy_planes(&positions, ChannelSelect::All, ChannelLayout::Interleaved, out, offset)
    }

    pub fn data_copy_cxyzt<T: Element>(&self) -> Result<Vec<T>> {
        self.copy_into_new(&self.all_positions(), ChannelSelect::All, ChannelLayout::Interleaved)
    }

    pub fn data_copy_cxyzt_into<T: Element>(&self, out: &mut Vec<T>, offset: usize) -> Result<usize> {
        let positions = self.all_positions();
        self.copy_planes(&positions, ChannelSelect::All, ChannelLayout::Interleaved, out, offset)
    }

    /// Every channel of pixel `(x, y)` in plane `(t, z)`.
    pub fn data_copy_c<T: Element>(&self, t: usize, z: usize, x: usize, y: usize) -> Result<Vec<T>> {
        let mut out = Vec::new();
        self.data_copy_c_into(t, z, x, y, &mut out, 0)?;
        Ok(out)
    }

    pub fn data_copy_c_into<T: Element>(
        &self,
        t: usize,
        z: usize,
        x: usize,
        y: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        self.check_element::<T>()?;
        if x >= self.size_x() || y >= self.size_y() {
            return Err(SequenceError::OutOfBounds(format!(
                "({x}, {y}) outside {}x{}",
                self.size_x(),
                self.size_y()
            )));
        }
        let size_c = self.size_c();
        let end = offset.checked_add(size_c).ok_or_else(|| {
            SequenceError::OutOfBounds(format!("offset {offset} past the addressable range"))
        })?;
        if out.len() < end {
            out.resize(end, T::default());
        }
        if let Some(plane) = self.image(t, z) {
            for (c, channel) in plane.channels::<T>()?.iter().enumerate() {
                let value = channel.get((y, x)).ok_or_else(|| {
                    SequenceError::OutOfBounds(format!(
                        "({x}, {y}) outside {}x{}",
                        plane.width(),
                        plane.height()
                    ))
                })?;
                out[offset + c] = *value;
            }
        }
        Ok(size_c)
    }

    /// `[z][xy]` samples of channel `c` at time point `t`.
    pub fn data_copy_xyz<T: Element>(&self, t: usize, c: usize) -> Result<Vec<T>> {
        self.copy_into_new(&self.zt_positions(t), ChannelSelect::One(c), ChannelLayout::Planar)
    }

    pub fn data_copy_xyz_into<T: Element>(
        &self,
        t: usize,
        c: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        let positions = self.zt_positions(t);
        self.copy_planes(&positions, ChannelSelect::One(c), ChannelLayout::Planar, out, offset)
    }

    /// `[t][z][xy]` samples of channel `c`.
    pub fn data_copy_xyzt<T: Element>(&self, c: usize) -> Result<Vec<T>> {
        self.copy_into_new(&self.all_positions(), ChannelSelect::One(c), ChannelLayout::Planar)
    }

    pub fn data_copy_xyzt_into<T: Element>(
        &self,
        c: usize,
        out: &mut Vec<T>,
        offset: usize,
    ) -> Result<usize> {
        let positions = self.all_positions();
        self.copy_planes(&positions, ChannelSelect::One(c), ChannelLayout::Planar, out, offset)
    }

    // Single values.

    /// Sample at `(t, z, c, y, x)`, zero when the plane is missing.
    pub fn data(&self, t: usize, z: usize, c: usize, y: usize, x: usize) -> Result<f64> {
        match self.image(t, z) {
            Some(plane) => plane.value(x, y, c),
            None => Ok(0.0),
        }
    }

    /// Linear interpolation along Z between the bilinear XY interpolations
    /// of the two surrounding planes. Missing planes contribute zero.
    pub fn data_interpolated(&self, t: usize, z: f64, c: usize, y: f64, x: f64) -> Result<f64> {
        if z.is_nan() || z < 0.0 || z >= self.size_z_at(t) as f64 {
            return Ok(0.0);
        }
        let zi = z.floor() as usize;
        let ratio_next = z - zi as f64;
        let ratio_current = 1.0 - ratio_next;
        let sample = |plane: Option<Plane>, ratio: f64| -> Result<f64> {
            match plane {
                Some(plane) if ratio > 0.0 => Ok(plane.data_interpolated(x, y, c)? * ratio),
                _ => Ok(0.0),
            }
        };
        Ok(sample(self.image(t, zi), ratio_current)?
            + sample(zi.checked_add(1).and_then(|next| self.image(t, next)), ratio_next)?)
    }

    /// Replaces channel `c` of plane `(t, z)` with row-major `values`.
    pub fn set_data_xy<T: Element>(&self, t: usize, z: usize, c: usize, values: &[T]) -> Result<()> {
        let plane = self.image(t, z).ok_or_else(|| {
            SequenceError::OutOfBounds(format!("no plane at (t={t}, z={z})"))
        })?;
        plane.set_channel_data(c, values)
    }
}
