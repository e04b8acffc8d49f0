use std::collections::BTreeMap;

use super::Plane;

/// Z-indexed stack of planes for one time point. Gaps are allowed.
#[derive(Debug, Clone, Default)]
pub struct VolumetricImage {
    images: BTreeMap<usize, Plane>,
}

impl VolumetricImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self, z: usize) -> Option<&Plane> {
        self.images.get(&z)
    }

    /// Stores `plane` at `z` and returns the plane it replaced.
    pub fn set_image(&mut self, z: usize, plane: Plane) -> Option<Plane> {
        self.images.insert(z, plane)
    }

    pub fn remove_image(&mut self, z: usize) -> Option<Plane> {
        self.images.remove(&z)
    }

    /// Last occupied Z index plus one.
    pub fn size(&self) -> usize {
        self.images.keys().next_back().map_or(0, |z| z + 1)
    }

    pub fn num_image(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn first_image(&self) -> Option<&Plane> {
        self.images.values().next()
    }

    pub fn last_image(&self) -> Option<&Plane> {
        self.images.values().next_back()
    }

    pub fn all_images(&self) -> Vec<Plane> {
        self.images.values().cloned().collect()
    }

    pub fn images(&self) -> impl Iterator<Item = (usize, &Plane)> {
        self.images.iter().map(|(z, plane)| (*z, plane))
    }

    /// Renumbers the planes to `0..num_image` keeping their order.
    /// Returns whether any plane moved.
    pub fn pack(&mut self) -> bool {
        if self.images.keys().enumerate().all(|(index, z)| index == *z) {
            return false;
        }
        let images = std::mem::take(&mut self.images);
        self.images = images.into_values().enumerate().collect();
        true
    }

    pub fn clear(&mut self) -> Vec<Plane> {
        std::mem::take(&mut self.images).into_values().collect()
    }
}
