use std::collections::HashMap;

use crate::runtime::sync::lock;

use super::{DataSnapshot, Plane, Result, Sequence, SequenceEdit};

impl Sequence {
    /// Shared copy of the pixel data of every plane, loading lazy planes.
    pub fn snapshot_data(&self) -> Result<DataSnapshot> {
        let planes = self
            .positioned_images()
            .into_iter()
            .map(|(t, z, plane)| Ok((t, z, plane.data()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataSnapshot { planes })
    }

    /// Restores `snapshot`: planes present in both keep their identity and
    /// receive the stored data, other planes are added or removed.
    fn restore_data(&self, snapshot: DataSnapshot) -> Result<()> {
        let _scope = self.update_scope();
        let mut stored: HashMap<(usize, usize), _> = snapshot
            .planes
            .into_iter()
            .map(|(t, z, data)| ((t, z), data))
            .collect();
        for (t, z, plane) in self.positioned_images() {
            match stored.remove(&(t, z)) {
                Some(data) if plane_fits(&plane, &data) => plane.set_data(data)?,
                Some(data) => self.set_image(t, z, Plane::new(data))?,
                None => {
                    self.remove_image(t, z);
                }
            }
        }
        let mut missing: Vec<_> = stored.into_iter().collect();
        missing.sort_by_key(|(position, _)| *position);
        for ((t, z), data) in missing {
            self.set_image(t, z, Plane::new(data))?;
        }
        Ok(())
    }

    pub(super) fn record_edit(&self, edit: SequenceEdit) {
        lock(&self.history).push(edit);
    }

    /// Records the current data and metadata as one undo step.
    pub fn create_undo_point(&self, name: impl Into<String>) -> Result<()> {
        let edit = SequenceEdit::Full {
            name: name.into(),
            data: self.snapshot_data()?,
            metadata: self.metadata(),
        };
        self.record_edit(edit);
        Ok(())
    }

    pub fn create_undo_data_point(&self, name: impl Into<String>) -> Result<()> {
        let edit = SequenceEdit::Data {
            name: name.into(),
            data: self.snapshot_data()?,
        };
        self.record_edit(edit);
        Ok(())
    }

    pub fn create_undo_metadata_point(&self, name: impl Into<String>) {
        self.record_edit(SequenceEdit::Metadata {
            name: name.into(),
            metadata: self.metadata(),
        });
    }

    /// Applies `edit` and returns the edit restoring the state it replaced.
    fn apply_edit(&self, edit: SequenceEdit) -> Result<SequenceEdit> {
        match edit {
            SequenceEdit::Full {
                name,
                data,
                metadata,
            } => {
                let inverse = SequenceEdit::Full {
                    name,
                    data: self.snapshot_data()?,
                    metadata: self.metadata(),
                };
                self.restore_data(data)?;
                self.set_metadata(metadata)?;
                Ok(inverse)
            }
            SequenceEdit::Data { name, data } => {
                let inverse = SequenceEdit::Data {
                    name,
                    data: self.snapshot_data()?,
                };
                self.restore_data(data)?;
                Ok(inverse)
            }
            SequenceEdit::Metadata { name, metadata } => {
                let inverse = SequenceEdit::Metadata {
                    name,
                    metadata: self.metadata(),
                };
                self.set_metadata(metadata)?;
                Ok(inverse)
            }
            SequenceEdit::RoiAdd(rois) => Ok(SequenceEdit::RoiRemove(self.take_rois(&rois))),
            SequenceEdit::RoiRemove(rois) => Ok(SequenceEdit::RoiAdd(self.insert_rois(&rois))),
        }
    }

    /// Reverts the last recorded edit. Returns `false` when there is nothing
    /// to undo. A failed edit stays on the undo stack.
    pub fn undo(&self) -> Result<bool> {
        let Some(edit) = lock(&self.history).pop_undo() else {
            return Ok(false);
        };
        match self.apply_edit(edit.clone()) {
            Ok(inverse) => {
                lock(&self.history).push_redo(inverse);
                Ok(true)
            }
            Err(error) => {
                lock(&self.history).push_undo_keep_redo(edit);
                Err(error)
            }
        }
    }

    pub fn redo(&self) -> Result<bool> {
        let Some(edit) = lock(&self.history).pop_redo() else {
            return Ok(false);
        };
        match self.apply_edit(edit.clone()) {
            Ok(inverse) => {
                lock(&self.history).push_undo_keep_redo(inverse);
                Ok(true)
            }
            Err(error) => {
                lock(&self.history).push_redo(edit);
                Err(error)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        lock(&self.history).can_undo()
    }

    pub fn can_redo(&self) -> bool {
        lock(&self.history).can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        lock(&self.history).undo_description()
    }

    pub fn clear_undo_history(&self) {
        lock(&self.history).clear();
    }

    /// Replaces every plane with an independent copy of the planes of
    /// `source`.
    pub fn copy_data_from(&self, source: &Sequence) -> Result<()> {
        if std::ptr::eq(self, source) {
            return Ok(());
        }
        let copies = source
            .positioned_images()
            .into_iter()
            .map(|(t, z, plane)| Ok((t, z, plane.copy()?)))
            .collect::<Result<Vec<_>>>()?;
        let _scope = self.update_scope();
        self.remove_all_images();
        for (t, z, plane) in copies {
            self.set_image(t, z, plane)?;
        }
        Ok(())
    }

    pub fn copy_metadata_from(&self, source: &Sequence, copy_name: bool) -> Result<()> {
        if std::ptr::eq(self, source) {
            return Ok(());
        }
        let mut metadata = source.metadata();
        if !copy_name {
            metadata.name = Some(self.name());
        }
        self.set_metadata(metadata)
    }

    pub fn copy_from(&self, source: &Sequence, copy_name: bool) -> Result<()> {
        let _scope = self.update_scope();
        self.copy_data_from(source)?;
        self.copy_metadata_from(source, copy_name)
    }
}

fn plane_fits(plane: &Plane, data: &crate::model::PlaneData) -> bool {
    let (width, height) = data.dims();
    plane.width() == width
        && plane.height() == height
        && plane.size_c() == data.size_c()
        && plane.data_type() == data.data_type()
}
