use std::collections::VecDeque;

use crate::model::{PlaneData, SequenceMetadata};

use super::Roi;

/// Pixel data of every plane of a sequence, keyed by `(t, z)`.
///
/// Channel arrays are shared copy-on-write, so a snapshot costs one
/// reference per channel until the sequence writes to the plane again.
#[derive(Debug, Clone, Default)]
pub struct DataSnapshot {
    pub planes: Vec<(usize, usize, PlaneData)>,
}

impl DataSnapshot {
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

/// One undoable step. Each edit holds the state to restore; applying it
/// yields the opposite edit.
#[derive(Debug, Clone)]
pub enum SequenceEdit {
    Full {
        name: String,
        data: DataSnapshot,
        metadata: SequenceMetadata,
    },
    Data {
        name: String,
        data: DataSnapshot,
    },
    Metadata {
        name: String,
        metadata: SequenceMetadata,
    },
    /// ROIs that were added; undoing removes them.
    RoiAdd(Vec<Roi>),
    /// ROIs that were removed; undoing adds them back.
    RoiRemove(Vec<Roi>),
}

impl SequenceEdit {
    pub fn description(&self) -> String {
        match self {
            SequenceEdit::Full { name, .. }
            | SequenceEdit::Data { name, .. }
            | SequenceEdit::Metadata { name, .. } => name.clone(),
            SequenceEdit::RoiAdd(rois) if rois.len() == 1 => "ROI added".to_string(),
            SequenceEdit::RoiAdd(rois) => format!("{} ROIs added", rois.len()),
            SequenceEdit::RoiRemove(rois) if rois.len() == 1 => "ROI removed".to_string(),
            SequenceEdit::RoiRemove(rois) => format!("{} ROIs removed", rois.len()),
        }
    }
}

/// Bounded undo/redo stacks; the oldest edit is dropped past the limit.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    undo: VecDeque<SequenceEdit>,
    redo: Vec<SequenceEdit>,
    limit: usize,
}

impl UndoHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Records a new edit, which invalidates the redo stack.
    pub fn push(&mut self, edit: SequenceEdit) {
        self.redo.clear();
        self.push_undo_keep_redo(edit);
    }

    pub(crate) fn push_undo_keep_redo(&mut self, edit: SequenceEdit) {
        if self.limit == 0 {
            return;
        }
        log::debug!("undo point '{}'", edit.description());
        self.undo.push_back(edit);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    pub(crate) fn pop_undo(&mut self) -> Option<SequenceEdit> {
        self.undo.pop_back()
    }

    pub(crate) fn push_redo(&mut self, edit: SequenceEdit) {
        self.redo.push(edit);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<SequenceEdit> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo.back().map(SequenceEdit::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo.last().map(SequenceEdit::description)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        log::debug!("undo history cleared");
    }
}
