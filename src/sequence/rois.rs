use std::sync::Weak;

use crate::runtime::sync::lock;

use super::{
    Overlay, OverlayListener, Roi, RoiListener, Sequence, SequenceEdit, SequenceEventSource,
    SequenceEventType,
};

impl Sequence {
    fn roi_listener(&self) -> Weak<dyn RoiListener> {
        self.self_ref.clone()
    }

    fn overlay_listener(&self) -> Weak<dyn OverlayListener> {
        self.self_ref.clone()
    }

    fn roi_event(&self, roi: &Roi, kind: SequenceEventType) {
        self.changed_source(SequenceEventSource::Roi(roi.clone()), kind);
    }

    fn overlay_event(&self, overlay: &Overlay, kind: SequenceEventType) {
        self.changed_source(SequenceEventSource::Overlay(overlay.clone()), kind);
    }

    /// Adds the ROIs not already present; returns those actually added.
    pub(super) fn insert_rois(&self, rois: &[Roi]) -> Vec<Roi> {
        let added: Vec<Roi> = {
            let mut current = lock(&self.rois);
            let mut added = Vec::new();
            for roi in rois {
                if !current.contains(roi) && !added.contains(roi) {
                    current.push(roi.clone());
                    added.push(roi.clone());
                }
            }
            added
        };
        if added.is_empty() {
            return added;
        }
        let _scope = self.update_scope();
        for roi in &added {
            roi.add_listener(self.roi_listener());
            self.add_overlay(roi.overlay().clone());
            self.roi_event(roi, SequenceEventType::Added);
        }
        added
    }

    /// Removes the ROIs present; returns those actually removed.
    pub(super) fn take_rois(&self, rois: &[Roi]) -> Vec<Roi> {
        let removed: Vec<Roi> = {
            let mut current = lock(&self.rois);
            let before = current.clone();
            current.retain(|roi| !rois.contains(roi));
            before.into_iter().filter(|roi| !current.contains(roi)).collect()
        };
        if removed.is_empty() {
            return removed;
        }
        let _scope = self.update_scope();
        for roi in &removed {
            roi.remove_listener(&self.roi_listener());
            self.remove_overlay(roi.overlay());
            self.roi_event(roi, SequenceEventType::Removed);
        }
        removed
    }

    pub fn add_roi(&self, roi: Roi) -> bool {
        self.add_rois(std::slice::from_ref(&roi))
    }

    /// Adds a batch of ROIs recorded as a single undo step.
    pub fn add_rois(&self, rois: &[Roi]) -> bool {
        let added = self.insert_rois(rois);
        if added.is_empty() {
            return false;
        }
        self.record_edit(SequenceEdit::RoiAdd(added));
        true
    }

    pub fn remove_roi(&self, roi: &Roi) -> bool {
        self.remove_rois(std::slice::from_ref(roi))
    }

    /// Removes a batch of ROIs recorded as a single undo step.
    pub fn remove_rois(&self, rois: &[Roi]) -> bool {
        let removed = self.take_rois(rois);
        if removed.is_empty() {
            return false;
        }
        self.record_edit(SequenceEdit::RoiRemove(removed));
        true
    }

    pub fn remove_selected_rois(&self, remove_read_only: bool) -> bool {
        let selected: Vec<Roi> = self
            .selected_rois()
            .into_iter()
            .filter(|roi| remove_read_only || !roi.is_read_only())
            .collect();
        self.remove_rois(&selected)
    }

    pub fn remove_all_rois(&self) -> bool {
        let rois = self.rois();
        self.remove_rois(&rois)
    }

    pub fn contains_roi(&self, roi: &Roi) -> bool {
        lock(&self.rois).contains(roi)
    }

    pub fn rois(&self) -> Vec<Roi> {
        lock(&self.rois).clone()
    }

    pub fn selected_rois(&self) -> Vec<Roi> {
        lock(&self.rois)
            .iter()
            .filter(|roi| roi.is_selected())
            .cloned()
            .collect()
    }

    pub fn selected_roi(&self) -> Option<Roi> {
        lock(&self.rois).iter().find(|roi| roi.is_selected()).cloned()
    }

    /// Selects only `roi`. Every other ROI is deselected first, so `None` or
    /// a ROI that does not belong to the sequence clears the selection and
    /// returns `false`.
    pub fn set_selected_roi(&self, roi: Option<&Roi>) -> bool {
        let _scope = self.update_scope();
        for current in self.rois() {
            if roi != Some(&current) {
                current.set_selected(false);
            }
        }
        match roi {
            Some(roi) if self.contains_roi(roi) => {
                roi.set_selected(true);
                true
            }
            _ => false,
        }
    }

    /// Selects exactly the given ROIs of the sequence.
    pub fn set_selected_rois(&self, selected: &[Roi]) {
        let _scope = self.update_scope();
        for roi in self.rois() {
            roi.set_selected(selected.contains(&roi));
        }
    }

    pub fn focused_roi(&self) -> Option<Roi> {
        lock(&self.rois).iter().find(|roi| roi.is_focused()).cloned()
    }

    pub fn set_focused_roi(&self, roi: Option<&Roi>) -> bool {
        if roi.is_some_and(|roi| !self.contains_roi(roi)) {
            return false;
        }
        let _scope = self.update_scope();
        for current in self.rois() {
            current.set_focused(roi == Some(&current));
        }
        true
    }

    /// Notifies listeners that `roi` changed, when it belongs to the sequence.
    pub fn roi_changed(&self, roi: &Roi) {
        if self.contains_roi(roi) {
            self.roi_event(roi, SequenceEventType::Changed);
        }
    }

    pub fn add_overlay(&self, overlay: Overlay) -> bool {
        {
            let mut overlays = lock(&self.overlays);
            if overlays.contains(&overlay) {
                return false;
            }
            overlays.push(overlay.clone());
        }
        overlay.add_listener(self.overlay_listener());
        self.overlay_event(&overlay, SequenceEventType::Added);
        true
    }

    pub fn remove_overlay(&self, overlay: &Overlay) -> bool {
        let removed = {
            let mut overlays = lock(&self.overlays);
            let before = overlays.len();
            overlays.retain(|known| known != overlay);
            overlays.len() != before
        };
        if removed {
            overlay.remove_listener(&self.overlay_listener());
            self.overlay_event(overlay, SequenceEventType::Removed);
        }
        removed
    }

    pub fn overlays(&self) -> Vec<Overlay> {
        lock(&self.overlays).clone()
    }

    pub fn contains_overlay(&self, overlay: &Overlay) -> bool {
        lock(&self.overlays).contains(overlay)
    }

    pub fn overlay_changed(&self, overlay: &Overlay) {
        if self.contains_overlay(overlay) {
            self.overlay_event(overlay, SequenceEventType::Changed);
        }
    }
}

impl RoiListener for Sequence {
    fn roi_changed(&self, roi: &Roi) {
        self.roi_event(roi, SequenceEventType::Changed);
    }
}

impl OverlayListener for Sequence {
    fn overlay_changed(&self, overlay: &Overlay) {
        self.overlay_event(overlay, SequenceEventType::Changed);
    }
}
